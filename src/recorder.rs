// src/recorder.rs
//
// Microphone recording.
//
// A MediaRecorder produces encoded chunks while recording. The playlist
// turns them into a growing track through a throttled pipeline: one peak
// request in flight at a time, with chunks that arrive meanwhile folded into
// the next decode.

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, warn};

use crate::audio_buffer::AudioData;
use crate::error::LoadError;

/// Recorder lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecorderState {
    #[default]
    Inactive,
    Recording,
    Paused,
}

/// Events raised by a recorder, drained by the playlist.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Start,
    DataAvailable(Arc<Vec<u8>>),
    Stop,
}

/// Contract for a capture device.
pub trait MediaRecorder: Send {
    fn state(&self) -> RecorderState;

    /// Start capturing, emitting a chunk every `timeslice_ms`.
    fn start(&mut self, timeslice_ms: u32);

    fn pause(&mut self);

    fn resume(&mut self);

    fn stop(&mut self);

    /// Next pending event, if any.
    fn poll_event(&mut self) -> Option<RecorderEvent>;
}

//
// ===============================
// MARK: Host recorder
// ===============================
//

/// Sending side of a `HostRecorder`, held by whatever captures audio.
#[derive(Debug, Clone)]
pub struct RecorderFeed {
    tx: Sender<Arc<Vec<u8>>>,
}

impl RecorderFeed {
    /// Deliver one encoded chunk. Returns false once the recorder is gone.
    pub fn push(&self, chunk: Vec<u8>) -> bool {
        self.tx.send(Arc::new(chunk)).is_ok()
    }
}

/// Recorder whose audio is captured by the host and fed in as chunks.
///
/// Chunks pushed while not recording are discarded.
#[derive(Debug)]
pub struct HostRecorder {
    state: RecorderState,
    timeslice_ms: u32,
    rx: Receiver<Arc<Vec<u8>>>,
    pending: Vec<RecorderEvent>,
}

impl HostRecorder {
    pub fn new() -> (Self, RecorderFeed) {
        let (tx, rx) = unbounded();
        let recorder = Self {
            state: RecorderState::Inactive,
            timeslice_ms: 0,
            rx,
            pending: Vec::new(),
        };
        (recorder, RecorderFeed { tx })
    }

    pub fn timeslice_ms(&self) -> u32 {
        self.timeslice_ms
    }
}

impl MediaRecorder for HostRecorder {
    fn state(&self) -> RecorderState {
        self.state
    }

    fn start(&mut self, timeslice_ms: u32) {
        if self.state != RecorderState::Inactive {
            return;
        }
        // stale chunks from a previous session
        while self.rx.try_recv().is_ok() {}
        self.timeslice_ms = timeslice_ms;
        self.state = RecorderState::Recording;
        self.pending.push(RecorderEvent::Start);
    }

    fn pause(&mut self) {
        if self.state == RecorderState::Recording {
            self.state = RecorderState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state == RecorderState::Paused {
            self.state = RecorderState::Recording;
        }
    }

    fn stop(&mut self) {
        if self.state == RecorderState::Inactive {
            return;
        }
        self.drain_feed();
        self.state = RecorderState::Inactive;
        self.pending.push(RecorderEvent::Stop);
    }

    fn poll_event(&mut self) -> Option<RecorderEvent> {
        self.drain_feed();
        if self.pending.is_empty() {
            None
        } else {
            Some(self.pending.remove(0))
        }
    }
}

impl HostRecorder {
    fn drain_feed(&mut self) {
        while let Ok(chunk) = self.rx.try_recv() {
            if self.state == RecorderState::Recording {
                self.pending.push(RecorderEvent::DataAvailable(chunk));
            }
        }
    }
}

//
// ===============================
// MARK: Chunk pipeline
// ===============================
//

/// Throttled decode state for one recording session.
#[derive(Debug, Default)]
pub struct RecordingPipeline {
    chunks: Vec<Arc<Vec<u8>>>,

    /// A peak request is in flight.
    working: bool,

    /// Chunks arrived while working.
    dirty: bool,

    in_flight: Option<u64>,
}

impl RecordingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_working(&self) -> bool {
        self.working
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Add a chunk. Returns true when a decode should start now.
    pub fn push_chunk(&mut self, chunk: Arc<Vec<u8>>) -> bool {
        self.chunks.push(chunk);
        if self.working {
            self.dirty = true;
            false
        } else {
            true
        }
    }

    /// Decode every chunk so far into one buffer. Chunks that fail to
    /// decode are dropped so later decodes see only usable audio; the call
    /// fails only when nothing decodes.
    pub fn decode<F>(&mut self, decode: F) -> Result<AudioData, LoadError>
    where
        F: Fn(&str, &[u8]) -> Result<AudioData, LoadError>,
    {
        let mut out: Option<AudioData> = None;
        let mut failure = None;
        let mut index = 0;
        self.chunks.retain(|chunk| {
            index += 1;
            match decode(&format!("recording chunk {}", index - 1), chunk.as_slice()) {
                Ok(part) => {
                    match out.as_mut() {
                        Some(acc) => acc.append(&part),
                        None => out = Some(part),
                    }
                    true
                }
                Err(e) => {
                    warn!("dropping recording chunk {}: {}", index - 1, e);
                    failure = Some(e);
                    false
                }
            }
        });
        match (out, failure) {
            (Some(data), _) => Ok(data),
            (None, Some(e)) => Err(e),
            (None, None) => Err(LoadError::Unsupported("empty recording".to_string())),
        }
    }

    /// A decode succeeded and its peak request `id` was posted.
    pub fn begin(&mut self, id: u64) {
        self.working = true;
        self.dirty = false;
        self.in_flight = Some(id);
    }

    /// A decode failed. The next chunk gets a fresh attempt.
    pub fn fail(&mut self) {
        self.working = false;
        self.in_flight = None;
    }

    /// Whether `id` is the request this pipeline is waiting on.
    pub fn is_waiting_on(&self, id: u64) -> bool {
        self.in_flight == Some(id)
    }

    /// The in-flight request finished. Returns true when chunks arrived in
    /// the meantime and a catch-up decode should run.
    pub fn finish(&mut self, id: u64) -> bool {
        if self.in_flight != Some(id) {
            return false;
        }
        self.working = false;
        self.in_flight = None;
        let catch_up = std::mem::take(&mut self.dirty);
        if catch_up {
            debug!("recording pipeline catching up on {} chunks", self.chunks.len());
        }
        catch_up
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::decode_wav;
    use crate::worker::encode_wav;

    fn chunk(frames: usize) -> Arc<Vec<u8>> {
        let data = AudioData::new(8_000.0, vec![vec![0.25; frames]]);
        Arc::new(encode_wav(&data).unwrap())
    }

    #[test]
    fn test_host_recorder_lifecycle() {
        let (mut rec, feed) = HostRecorder::new();
        feed.push(vec![1]);
        rec.start(300);
        assert_eq!(rec.poll_event(), Some(RecorderEvent::Start));
        // pushed before start
        assert_eq!(rec.poll_event(), None);

        feed.push(vec![2]);
        assert_eq!(
            rec.poll_event(),
            Some(RecorderEvent::DataAvailable(Arc::new(vec![2])))
        );

        rec.pause();
        feed.push(vec![3]);
        assert_eq!(rec.poll_event(), None);
        rec.resume();
        assert_eq!(rec.state(), RecorderState::Recording);

        rec.stop();
        assert_eq!(rec.poll_event(), Some(RecorderEvent::Stop));
        assert_eq!(rec.state(), RecorderState::Inactive);
    }

    #[test]
    fn test_pipeline_throttles_and_catches_up() {
        let mut p = RecordingPipeline::new();
        assert!(p.push_chunk(chunk(10)));
        p.begin(1);

        // arrives while working: folded into the next decode
        assert!(!p.push_chunk(chunk(10)));
        assert!(!p.push_chunk(chunk(5)));

        assert!(!p.finish(99));
        assert!(p.finish(1));
        assert!(!p.is_working());

        let data = p.decode(decode_wav).unwrap();
        assert_eq!(data.frames(), 25);
    }

    #[test]
    fn test_decode_failure_releases_throttle() {
        let mut p = RecordingPipeline::new();
        p.push_chunk(Arc::new(b"garbage".to_vec()));
        assert!(p.decode(decode_wav).is_err());
        assert_eq!(p.chunk_count(), 0);
        p.fail();
        assert!(p.push_chunk(chunk(4)));
        assert_eq!(p.decode(decode_wav).unwrap().frames(), 4);
    }

    #[test]
    fn test_bad_chunk_is_dropped_from_later_decodes() {
        let mut p = RecordingPipeline::new();
        p.push_chunk(chunk(10));
        p.push_chunk(Arc::new(b"garbage".to_vec()));
        p.push_chunk(chunk(6));

        assert_eq!(p.decode(decode_wav).unwrap().frames(), 16);
        assert_eq!(p.chunk_count(), 2);
    }
}
