// src/playlist/record.rs
//
// Recording into a new track.
//
// The recorder raises events that the playlist drains in `poll_recorder`.
// Each data chunk goes through the throttled pipeline: decode everything
// captured so far, swap it into the recording track, and ask the peak worker
// for an envelope. Only one peak request is in flight; chunks that arrive
// meanwhile are folded into a catch-up decode when it completes.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::audio_buffer::AudioData;
use crate::error::RecordError;
use crate::gesture::InteractionMode;
use crate::loader::TrackSource;
use crate::playout::Playout;
use crate::recorder::{MediaRecorder, RecorderEvent, RecorderState};
use crate::track::{Track, TrackId};
use crate::worker::PeakWorker;

use super::Playlist;

/// Gap left after a finished recording before the cursor.
const RECORD_CURSOR_GAP: f64 = 0.3;

pub const RECORDING_TRACK_NAME: &str = "Recording";

impl Playlist {
    pub fn set_recorder(&mut self, recorder: Box<dyn MediaRecorder>) {
        self.recorder = Some(recorder);
    }

    pub fn recorder_state(&self) -> RecorderState {
        self.recorder.as_ref().map_or(RecorderState::Inactive, |r| r.state())
    }

    pub fn is_recording(&self) -> bool {
        self.recorder_state() == RecorderState::Recording
    }

    /// Track currently receiving recorded audio.
    pub fn recording_track(&self) -> Option<TrackId> {
        self.recording_track
    }

    /// Start or resume recording. Existing tracks play along from the
    /// cursor so the take can be recorded against them.
    pub fn record(&mut self) -> Result<(), RecordError> {
        let now = self.context.current_time();
        if self.is_playing_at(now) {
            return Err(RecordError::Busy);
        }
        let timeslice = self.config.record_timeslice_ms;
        let recorder = self.recorder.as_mut().ok_or(RecordError::NoRecorder)?;

        match recorder.state() {
            RecorderState::Recording => Ok(()),
            RecorderState::Paused => {
                recorder.resume();
                debug!("recording resumed");
                Ok(())
            }
            RecorderState::Inactive => {
                recorder.start(timeslice);
                self.poll_recorder();
                let start = self.transport.cursor;
                self.start_playback(now, start, None, InteractionMode::None);
                Ok(())
            }
        }
    }

    /// Drain and apply pending recorder events.
    pub(crate) fn poll_recorder(&mut self) {
        while let Some(event) = self.recorder.as_mut().and_then(|r| r.poll_event()) {
            match event {
                RecorderEvent::Start => self.begin_recording_track(),
                RecorderEvent::DataAvailable(chunk) => {
                    if self.pipeline.push_chunk(chunk) {
                        self.decode_recording(false);
                    }
                }
                RecorderEvent::Stop => self.finish_recording(),
            }
        }
    }

    fn begin_recording_track(&mut self) {
        self.pipeline.reset();
        let id = self.allocate_id();
        let buffer = Arc::new(AudioData::silent(1, 0, self.config.sample_rate));
        let mut track = Track::new(
            id,
            RECORDING_TRACK_NAME,
            TrackSource::Buffer(Arc::clone(&buffer)),
            Arc::clone(&buffer),
        );
        track.set_start_time(self.transport.cursor);
        track.set_state(InteractionMode::None);
        track.set_playout(Playout::new(self.context.clone(), buffer));
        track.set_master_gain_level(self.master_gain);
        self.tracks.push(track);
        self.recording_track = Some(id);
        info!("recording into track {}", id);
    }

    /// Decode every chunk so far into the recording track. With
    /// `inline_peaks` the envelope is computed here instead of on the worker.
    fn decode_recording(&mut self, inline_peaks: bool) {
        let Some(id) = self.recording_track else {
            return;
        };
        let loader = &self.loader;
        let decoded = self.pipeline.decode(|name, bytes| {
            loader.load(&TrackSource::Bytes {
                name: name.to_string(),
                data: Arc::new(bytes.to_vec()),
            })
        });
        let data = match decoded {
            Ok(data) => self.conform_rate(data),
            Err(e) => {
                warn!("recording chunk decode failed: {}", e);
                self.pipeline.fail();
                return;
            }
        };

        let buffer = Arc::new(data);
        let (spp, mono) = (self.samples_per_pixel, self.config.mono);
        match self.track_mut(id) {
            Ok(track) => track.set_buffer(Arc::clone(&buffer)),
            Err(e) => {
                warn!("recording track lost: {}", e);
                self.pipeline.fail();
                return;
            }
        }
        self.adjust_duration();

        let request = if inline_peaks {
            None
        } else {
            self.peak_worker()
                .and_then(|w| w.request(Arc::clone(&buffer), spp, mono))
        };
        match request {
            Some(request) => self.pipeline.begin(request),
            None => self.refresh_recording_peaks(),
        }
    }

    fn refresh_recording_peaks(&mut self) {
        let (spp, mono) = (self.samples_per_pixel, self.config.mono);
        let Some(id) = self.recording_track else {
            return;
        };
        if let Ok(track) = self.track_mut(id) {
            track.calculate_peaks(spp, mono);
        }
    }

    fn peak_worker(&mut self) -> Option<&mut PeakWorker> {
        if self.peak_worker.is_none() && self.threads_available {
            match PeakWorker::spawn() {
                Ok(worker) => self.peak_worker = Some(worker),
                Err(e) => {
                    warn!("peak worker unavailable, computing peaks inline: {}", e);
                    self.threads_available = false;
                }
            }
        }
        self.peak_worker.as_mut()
    }

    /// Apply finished peak requests. If the worker dies, the waiting
    /// request is released and the envelope is computed here.
    pub(crate) fn poll_peaks(&mut self) {
        while let Some(worker) = self.peak_worker.as_ref() {
            let response = match worker.try_recv() {
                Ok(Some(response)) => response,
                Ok(None) => return,
                Err(_) => {
                    self.peak_worker = None;
                    if self.pipeline.is_working() {
                        self.pipeline.fail();
                        self.refresh_recording_peaks();
                    }
                    return;
                }
            };
            if !self.pipeline.is_waiting_on(response.id) {
                debug!("stale peak response {}", response.id);
                continue;
            }
            if let Some(id) = self.recording_track {
                if let Ok(track) = self.track_mut(id) {
                    track.set_peaks(response.peaks);
                }
            }
            if self.pipeline.finish(response.id) {
                self.decode_recording(false);
            }
        }
    }

    /// Fold in any chunks still pending, then close the session.
    fn finish_recording(&mut self) {
        if self.pipeline.chunk_count() > 0 {
            self.decode_recording(true);
        }
        self.pipeline.reset();
        if let Some(id) = self.recording_track.take() {
            info!("recording finished in track {}", id);
        }
        self.transport.cursor = self.duration + RECORD_CURSOR_GAP;
    }
}
