// src/playlist/render.rs
//
// Offline mixdown.
//
// A render builds its own offline context, binds a second playout per track
// to it and pulls the whole timeline through in fixed blocks. Live playback
// state is left alone. WAV output goes through the encoder worker and is
// reported when `poll_workers` sees the reply; every other format reports
// the raw buffer right away.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::audio_buffer::AudioData;
use crate::clock::{AudioContext, seconds_to_frames};
use crate::error::RenderError;
use crate::playout::{MasterBus, Playout};
use crate::state::{Notification, RenderFormat, RenderOutput};
use crate::track::PlayOptions;
use crate::worker::{EncodedWav, EncoderCommand, EncoderWorker, encode_wav_pcm16};

use super::Playlist;

/// Frames rendered per pull.
const RENDER_BLOCK: usize = 128;

const WAV_MIME: &str = "audio/wav";

impl Playlist {
    pub fn is_rendering(&self) -> bool {
        self.is_rendering
    }

    /// Offline contexts created so far.
    pub fn offline_contexts(&self) -> usize {
        self.offline_contexts
    }

    /// Render the timeline offline. Returns `Ok(false)` without doing
    /// anything when a render is already in flight.
    ///
    /// Failures are also reported as `AudioRenderingFailed`, and always
    /// release the in-progress flag.
    pub fn start_offline_render(&mut self, format: RenderFormat) -> Result<bool, RenderError> {
        if self.is_rendering {
            debug!("render already in progress");
            return Ok(false);
        }
        self.is_rendering = true;

        match self.render_offline(format) {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("offline render failed: {}", e);
                self.is_rendering = false;
                self.pending_render = None;
                self.emit(Notification::AudioRenderingFailed {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn render_offline(&mut self, format: RenderFormat) -> Result<(), RenderError> {
        if self.duration <= 0.0 {
            return Err(RenderError::EmptyTimeline);
        }
        let sample_rate = self.config.render_sample_rate;
        let length = seconds_to_frames(self.duration, sample_rate).max(1);
        let context = AudioContext::offline(2, length, sample_rate);
        self.offline_contexts += 1;
        info!(
            "rendering {:.3}s at {} Hz as {:?}",
            self.duration, sample_rate, format
        );
        self.emit(Notification::AudioRenderingStarting);

        let audible = self.audibility();
        for (track, should_play) in self.tracks.iter_mut().zip(audible) {
            track.set_offline_playout(Playout::new(context.clone(), Arc::clone(track.buffer())));
            let options = PlayOptions {
                should_play,
                master_gain: 1.0,
                is_offline: true,
            };
            track.schedule_play(0.0, 0.0, None, options);
        }

        let mut master = MasterBus::new(sample_rate, self.master.effects().clone());
        let mut left = vec![0.0f32; length];
        let mut right = vec![0.0f32; length];
        let mut frame = 0;
        while frame < length {
            let end = (frame + RENDER_BLOCK).min(length);
            let (l, r) = (&mut left[frame..end], &mut right[frame..end]);
            for track in &mut self.tracks {
                if let Some(playout) = track.offline_playout_mut() {
                    playout.render(frame as u64, l, r);
                }
            }
            master.process(l, r);
            context.advance(end - frame);
            frame = end;
        }
        for track in &mut self.tracks {
            track.take_offline_playout();
        }

        if format.is_encoded_here() {
            self.encode_rendered(format, left, right, sample_rate)
        } else {
            let buffer = AudioData::new(sample_rate, vec![left, right]);
            self.finish_render(format, RenderOutput::Buffer(Arc::new(buffer)));
            Ok(())
        }
    }

    fn encode_rendered(
        &mut self,
        format: RenderFormat,
        left: Vec<f32>,
        right: Vec<f32>,
        sample_rate: f64,
    ) -> Result<(), RenderError> {
        let rate = sample_rate.round() as u32;
        let Some(encoder) = self.encoder() else {
            let bytes = encode_wav_pcm16(&[left, right], rate)
                .map_err(|e| RenderError::Encoder(e.to_string()))?;
            self.finish_render(
                format,
                RenderOutput::Encoded {
                    mime: WAV_MIME.to_string(),
                    bytes,
                },
            );
            return Ok(());
        };

        let posted = encoder.post(EncoderCommand::Init { sample_rate: rate })
            && encoder.post(EncoderCommand::Record {
                buffer: [left, right],
            })
            && encoder.post(EncoderCommand::ExportWav {
                mime: WAV_MIME.to_string(),
            });
        if !posted {
            self.encoder = None;
            return Err(RenderError::WorkerGone);
        }
        self.pending_render = Some(format);
        Ok(())
    }

    fn encoder(&mut self) -> Option<&EncoderWorker> {
        if self.encoder.is_none() && self.threads_available {
            match EncoderWorker::spawn() {
                Ok(worker) => self.encoder = Some(worker),
                Err(e) => {
                    warn!("encoder worker unavailable, encoding inline: {}", e);
                    self.threads_available = false;
                }
            }
        }
        self.encoder.as_ref()
    }

    /// Apply an encoder reply to the render waiting on it. A dead encoder
    /// fails the waiting render.
    pub(crate) fn poll_encoder(&mut self) {
        while let Some(encoder) = self.encoder.as_ref() {
            match encoder.try_recv() {
                Ok(Some(reply)) => self.apply_encoded(reply),
                Ok(None) => return,
                Err(_) => {
                    self.encoder = None;
                    if let Some(format) = self.pending_render.take() {
                        self.fail_render(format, RenderError::WorkerGone.to_string());
                    }
                    return;
                }
            }
        }
    }

    fn apply_encoded(&mut self, reply: EncodedWav) {
        let Some(format) = self.pending_render.take() else {
            debug!("encoder reply with no render waiting");
            return;
        };
        if let Some(encoder) = self.encoder.as_ref() {
            encoder.post(EncoderCommand::Clear);
        }
        match reply.result {
            Ok(bytes) => self.finish_render(
                format,
                RenderOutput::Encoded {
                    mime: reply.mime,
                    bytes,
                },
            ),
            Err(message) => self.fail_render(format, message),
        }
    }

    fn fail_render(&mut self, format: RenderFormat, message: String) {
        warn!("render failed ({:?}): {}", format, message);
        self.is_rendering = false;
        self.emit(Notification::AudioRenderingFailed { message });
    }

    fn finish_render(&mut self, format: RenderFormat, output: RenderOutput) {
        self.is_rendering = false;
        info!("render finished ({:?})", format);
        self.emit(Notification::AudioRenderingFinished { format, output });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::super::testing::*;
    use super::*;
    use crate::loader::{TrackSpec, decode_wav};

    fn rendered(rx: &crossbeam_channel::Receiver<Notification>) -> Option<RenderOutput> {
        drain(rx).into_iter().find_map(|n| match n {
            Notification::AudioRenderingFinished { output, .. } => Some(output),
            _ => None,
        })
    }

    #[test]
    fn test_buffer_render_mixes_timeline() {
        let (mut playlist, rx, _clock) = playlist();
        let ids = playlist
            .load(vec![TrackSpec::url("b.wav"), TrackSpec::url("d.wav").starting_at(4.0)])
            .unwrap();
        playlist.mute_track(ids[1]).unwrap();
        drain(&rx);

        assert!(playlist.start_offline_render(RenderFormat::Buffer).unwrap());
        assert!(!playlist.is_rendering());
        assert_eq!(playlist.offline_contexts(), 1);

        let Some(RenderOutput::Buffer(buffer)) = rendered(&rx) else {
            panic!("expected a rendered buffer");
        };
        assert_eq!(buffer.frames(), 600);
        assert!(buffer.sample(0, 100) > 0.1);
        // muted track contributes nothing past the end of b.wav
        assert_eq!(buffer.sample(0, 550), 0.0);
        assert!(playlist.tracks().iter().all(|t| !t.is_playing()));
    }

    #[test]
    fn test_empty_timeline_fails_and_releases_flag() {
        let (mut playlist, rx, _clock) = playlist();
        let err = playlist.start_offline_render(RenderFormat::Buffer).unwrap_err();
        assert!(matches!(err, RenderError::EmptyTimeline));
        assert!(!playlist.is_rendering());
        assert_eq!(names(&rx), vec!["audiorenderingfailed"]);
    }

    #[test]
    fn test_second_render_while_encoding_is_a_no_op() {
        let (mut playlist, rx, _clock) = playlist();
        playlist.load(vec![TrackSpec::url("c.wav")]).unwrap();
        drain(&rx);

        assert!(playlist.start_offline_render(RenderFormat::Wav).unwrap());
        assert!(playlist.is_rendering());
        assert!(!playlist.start_offline_render(RenderFormat::Wav).unwrap());
        assert_eq!(playlist.offline_contexts(), 1);

        assert!(playlist.wait_for_workers(Duration::from_secs(5)));
        assert!(!playlist.is_rendering());
        let Some(RenderOutput::Encoded { mime, bytes }) = rendered(&rx) else {
            panic!("expected encoded output");
        };
        assert_eq!(mime, "audio/wav");
        let decoded = decode_wav("mix", &bytes).unwrap();
        assert_eq!(decoded.num_channels(), 2);
        assert_eq!(decoded.frames(), 300);
    }

    #[test]
    fn test_dead_encoder_releases_render() {
        let (mut playlist, rx, _clock) = playlist();
        playlist.load(vec![TrackSpec::url("c.wav")]).unwrap();
        playlist.encoder = Some(EncoderWorker::spawn_failing().unwrap());
        drain(&rx);

        assert!(playlist.start_offline_render(RenderFormat::Wav).unwrap());
        assert!(playlist.is_rendering());
        assert!(playlist.wait_for_workers(Duration::from_secs(5)));

        assert!(!playlist.is_rendering());
        assert!(playlist.encoder.is_none());
        assert_eq!(names(&rx), vec!["audiorenderingstarting", "audiorenderingfailed"]);

        // a fresh encoder serves the next render
        assert!(playlist.start_offline_render(RenderFormat::Wav).unwrap());
        assert!(playlist.wait_for_workers(Duration::from_secs(5)));
        assert!(matches!(rendered(&rx), Some(RenderOutput::Encoded { .. })));
    }

    #[test]
    fn test_encoder_error_releases_render() {
        let (mut playlist, rx, _clock) = playlist();
        playlist.is_rendering = true;
        playlist.pending_render = Some(RenderFormat::Wav);

        playlist.apply_encoded(EncodedWav {
            mime: WAV_MIME.to_string(),
            result: Err("disk full".to_string()),
        });
        assert!(!playlist.is_rendering());
        assert!(matches!(
            &drain(&rx)[..],
            [Notification::AudioRenderingFailed { message }] if message == "disk full"
        ));
    }

    #[test]
    fn test_render_leaves_live_playback_alone() {
        let (mut playlist, rx, _clock) = playlist();
        playlist.load(vec![TrackSpec::url("a.wav")]).unwrap();
        playlist.play(None, None);
        drain(&rx);

        playlist.start_offline_render(RenderFormat::Mp3).unwrap();
        assert!(playlist.is_playing());
        assert!(matches!(rendered(&rx), Some(RenderOutput::Buffer(_))));
    }
}
