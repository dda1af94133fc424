// src/worker.rs
//
// Background workers for peak extraction and WAV encoding.
//
// Each worker is a named thread fed by a request channel and answering on a
// response channel. Requests are fire-and-forget; the playlist drains the
// response side from its own loop (`Playlist::poll_workers`), so results
// arrive as messages instead of callbacks poking at shared state.

use std::io::Cursor;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvError, Sender, TryRecvError, unbounded};
use log::{debug, info, warn};

use crate::audio_buffer::AudioData;
use crate::peaks::{Peaks, extract_peaks};

/// Encode a buffer as 32-bit float WAV.
pub fn encode_wav(data: &AudioData) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: data.num_channels() as u16,
        sample_rate: data.sample_rate().round() as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut bytes = Vec::new();
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
    for s in data.to_interleaved() {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(bytes)
}

/// Encode planar channels as 16-bit PCM WAV.
pub fn encode_wav_pcm16(channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    let spec = hound::WavSpec {
        channels: channels.len().max(1) as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)?;
    for i in 0..frames {
        for ch in channels {
            let s = ch.get(i).copied().unwrap_or(0.0).clamp(-1.0, 1.0);
            let v = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
            writer.write_sample(v as i16)?;
        }
    }
    writer.finalize()?;
    Ok(bytes)
}

fn next_reply<T>(rx: &Receiver<T>, worker: &str) -> Result<Option<T>, RecvError> {
    match rx.try_recv() {
        Ok(reply) => Ok(Some(reply)),
        Err(TryRecvError::Empty) => Ok(None),
        Err(TryRecvError::Disconnected) => {
            warn!("{} worker disconnected", worker);
            Err(RecvError)
        }
    }
}

//
// ===============================
// MARK: Peak worker
// ===============================
//

/// Request for a peak envelope.
#[derive(Debug, Clone)]
pub struct PeakRequest {
    pub id: u64,
    pub data: Arc<AudioData>,
    pub samples_per_pixel: usize,
    pub mono: bool,
}

/// Envelope computed for the request with the same `id`.
#[derive(Debug, Clone)]
pub struct PeakResponse {
    pub id: u64,
    pub peaks: Peaks,
}

pub struct PeakWorker {
    request_tx: Option<Sender<PeakRequest>>,
    response_rx: Receiver<PeakResponse>,
    thread: Option<JoinHandle<()>>,
    next_id: u64,
}

impl PeakWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (request_tx, request_rx) = unbounded::<PeakRequest>();
        let (response_tx, response_rx) = unbounded::<PeakResponse>();

        let thread = thread::Builder::new()
            .name("waveline-peaks".into())
            .spawn(move || {
                for req in request_rx {
                    let frames = req.data.frames();
                    let peaks =
                        extract_peaks(&req.data, req.samples_per_pixel, req.mono, 0, frames);
                    if response_tx.send(PeakResponse { id: req.id, peaks }).is_err() {
                        break;
                    }
                }
                debug!("peak worker exiting");
            })?;

        Ok(Self {
            request_tx: Some(request_tx),
            response_rx,
            thread: Some(thread),
            next_id: 1,
        })
    }

    /// Queue a request. Returns its id, or `None` if the worker is gone.
    pub fn request(
        &mut self,
        data: Arc<AudioData>,
        samples_per_pixel: usize,
        mono: bool,
    ) -> Option<u64> {
        let id = self.next_id;
        self.next_id += 1;
        let tx = self.request_tx.as_ref()?;
        tx.send(PeakRequest {
            id,
            data,
            samples_per_pixel,
            mono,
        })
        .ok()?;
        Some(id)
    }

    /// Next finished response, if any. Fails once the worker thread is gone.
    pub fn try_recv(&self) -> Result<Option<PeakResponse>, RecvError> {
        next_reply(&self.response_rx, "peak")
    }

    /// Block until a response arrives or `timeout` passes.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<PeakResponse> {
        self.response_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for PeakWorker {
    fn drop(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

//
// ===============================
// MARK: Encoder worker
// ===============================
//

/// Messages understood by the encoder.
#[derive(Debug, Clone)]
pub enum EncoderCommand {
    /// Reset and set the output sample rate.
    Init { sample_rate: u32 },

    /// Append a stereo block.
    Record { buffer: [Vec<f32>; 2] },

    /// Encode everything recorded so far. Answered by exactly one
    /// `EncodedWav`.
    ExportWav { mime: String },

    /// Drop everything recorded.
    Clear,
}

/// Reply to `ExportWav`.
#[derive(Debug, Clone)]
pub struct EncodedWav {
    pub mime: String,
    pub result: Result<Vec<u8>, String>,
}

#[derive(Debug, Default)]
struct EncoderState {
    sample_rate: u32,
    channels: [Vec<f32>; 2],
}

impl EncoderState {
    fn handle(&mut self, command: EncoderCommand) -> Option<EncodedWav> {
        match command {
            EncoderCommand::Init { sample_rate } => {
                self.sample_rate = sample_rate;
                self.channels = Default::default();
                None
            }
            EncoderCommand::Record { buffer } => {
                let [l, r] = buffer;
                self.channels[0].extend(l);
                self.channels[1].extend(r);
                None
            }
            EncoderCommand::ExportWav { mime } => {
                let result = encode_wav_pcm16(&self.channels, self.sample_rate.max(1))
                    .map_err(|e| e.to_string());
                Some(EncodedWav { mime, result })
            }
            EncoderCommand::Clear => {
                self.channels = Default::default();
                None
            }
        }
    }
}

pub struct EncoderWorker {
    command_tx: Option<Sender<EncoderCommand>>,
    response_rx: Receiver<EncodedWav>,
    thread: Option<JoinHandle<()>>,
}

impl EncoderWorker {
    pub fn spawn() -> std::io::Result<Self> {
        let (command_tx, command_rx) = unbounded::<EncoderCommand>();
        let (response_tx, response_rx) = unbounded::<EncodedWav>();

        let thread = thread::Builder::new()
            .name("waveline-encoder".into())
            .spawn(move || {
                let mut state = EncoderState::default();
                for command in command_rx {
                    if let Some(reply) = state.handle(command) {
                        if response_tx.send(reply).is_err() {
                            break;
                        }
                    }
                }
                debug!("encoder worker exiting");
            })?;

        info!("encoder worker started");
        Ok(Self {
            command_tx: Some(command_tx),
            response_rx,
            thread: Some(thread),
        })
    }

    /// Post a command. Returns false if the worker is gone.
    pub fn post(&self, command: EncoderCommand) -> bool {
        self.command_tx
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok())
    }

    /// Next reply, if any. Fails once the worker thread is gone.
    pub fn try_recv(&self) -> Result<Option<EncodedWav>, RecvError> {
        next_reply(&self.response_rx, "encoder")
    }

    /// Encoder whose thread dies on the first export without answering.
    #[cfg(test)]
    pub(crate) fn spawn_failing() -> std::io::Result<Self> {
        let (command_tx, command_rx) = unbounded::<EncoderCommand>();
        let (response_tx, response_rx) = unbounded::<EncodedWav>();
        let thread = thread::Builder::new().spawn(move || {
            let _reply_side = response_tx;
            for command in command_rx {
                if matches!(command, EncoderCommand::ExportWav { .. }) {
                    break;
                }
            }
        })?;
        Ok(Self {
            command_tx: Some(command_tx),
            response_rx,
            thread: Some(thread),
        })
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EncodedWav> {
        self.response_rx.recv_timeout(timeout).ok()
    }
}

impl Drop for EncoderWorker {
    fn drop(&mut self) {
        self.command_tx.take();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::decode_wav;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_peak_worker_answers_with_request_id() {
        let mut worker = PeakWorker::spawn().unwrap();
        let data = Arc::new(AudioData::new(100.0, vec![vec![0.5; 100]]));
        let a = worker.request(Arc::clone(&data), 10, true).unwrap();
        let b = worker.request(data, 50, true).unwrap();

        let first = worker.recv_timeout(WAIT).unwrap();
        let second = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(first.id, a);
        assert_eq!(first.peaks.length, 10);
        assert_eq!(second.id, b);
        assert_eq!(second.peaks.length, 2);
    }

    #[test]
    fn test_encoder_exports_recorded_blocks() {
        let worker = EncoderWorker::spawn().unwrap();
        assert!(worker.post(EncoderCommand::Init { sample_rate: 8_000 }));
        worker.post(EncoderCommand::Record {
            buffer: [vec![0.5; 4], vec![-0.5; 4]],
        });
        worker.post(EncoderCommand::Record {
            buffer: [vec![0.0; 2], vec![0.0; 2]],
        });
        worker.post(EncoderCommand::ExportWav {
            mime: "audio/wav".into(),
        });

        let reply = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(reply.mime, "audio/wav");
        let decoded = decode_wav("mix", &reply.result.unwrap()).unwrap();
        assert_eq!(decoded.num_channels(), 2);
        assert_eq!(decoded.frames(), 6);
        assert!((decoded.sample(0, 0) - 0.5).abs() < 1e-3);

        worker.post(EncoderCommand::Clear);
        worker.post(EncoderCommand::ExportWav { mime: "audio/wav".into() });
        let empty = worker.recv_timeout(WAIT).unwrap();
        let decoded = decode_wav("empty", &empty.result.unwrap()).unwrap();
        assert_eq!(decoded.frames(), 0);
    }

    #[test]
    fn test_float_wav_preserves_samples() {
        let data = AudioData::new(44_100.0, vec![vec![0.123, -0.75]]);
        let decoded = decode_wav("x", &encode_wav(&data).unwrap()).unwrap();
        assert_eq!(decoded, data);
    }
}
