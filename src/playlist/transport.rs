// src/playlist/transport.rs
//
// Play, pause, stop, seek and the per-frame animation tick.
//
// Every operation captures the clock once and schedules all tracks against
// that snapshot, so tracks stay phase-aligned however long the loop takes.

use log::{debug, info};

use crate::gesture::InteractionMode;
use crate::playout::PlayoutTicket;
use crate::recorder::RecorderState;
use crate::state::{Notification, SeekStyle};
use crate::track::{PlayOptions, TrackId};

use super::Playlist;

/// Completion handle for one `play` call. Settles once every track's
/// schedule has.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayHandle {
    tickets: Vec<PlayoutTicket>,
}

impl PlayHandle {
    pub fn tickets(&self) -> &[PlayoutTicket] {
        &self.tickets
    }

    /// Clock time at which the last track falls silent.
    pub fn ends_at(&self) -> f64 {
        self.tickets.iter().map(|t| t.ends_at).fold(0.0, f64::max)
    }

    pub fn is_settled(&self, now: f64) -> bool {
        self.tickets.iter().all(|t| t.is_settled(now))
    }
}

impl Playlist {
    // -------------------------------
    // MARK: Play
    // -------------------------------

    /// Start playback. While already playing this restarts from the new
    /// position instead of layering a second schedule.
    pub fn play(&mut self, start: Option<f64>, end: Option<f64>) -> PlayHandle {
        let now = self.context.current_time();
        let start = self.transport.resolve_start(start);
        let end = self.transport.resolve_end(start, end, &self.selection);

        if self.is_playing_at(now) {
            self.restart_from(now, start, end)
        } else {
            self.start_playback(now, start, end, InteractionMode::Cursor)
        }
    }

    fn restart_from(&mut self, now: f64, start: f64, end: Option<f64>) -> PlayHandle {
        debug!("restarting playback from {:.3}", start);
        self.stop_animation();
        for track in &mut self.tracks {
            track.schedule_stop();
        }
        self.start_playback(now, start, end, InteractionMode::Cursor)
    }

    /// Schedule every track at `now` and arm the animation loop.
    pub(crate) fn start_playback(
        &mut self,
        now: f64,
        start: f64,
        end: Option<f64>,
        state: InteractionMode,
    ) -> PlayHandle {
        let master_gain = self.master_gain;
        let audible = self.audibility();
        let mut tickets = Vec::with_capacity(self.tracks.len());

        for (track, should_play) in self.tracks.iter_mut().zip(audible) {
            track.set_state(state);
            let options = PlayOptions {
                should_play,
                master_gain,
                is_offline: false,
            };
            tickets.extend(track.schedule_play(now, start, end, options));
        }

        self.transport.last_play = now;
        self.transport.play_start = Some(start);
        self.tickets = tickets.clone();
        self.start_animation(now);
        info!("playing from {:.3}s ({} tracks)", start, self.tracks.len());
        PlayHandle { tickets }
    }

    // -------------------------------
    // MARK: Pause / stop
    // -------------------------------

    /// Pause the recorder if one is capturing (resume it if paused),
    /// otherwise pause playback at the current position.
    pub fn pause(&mut self) {
        let now = self.context.current_time();
        let recorder_state = self.recorder.as_ref().map(|r| r.state());

        match recorder_state {
            Some(RecorderState::Recording) => {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.pause();
                }
                self.transport.paused_at = Some(self.transport.current_time(now));
                self.playback_reset();
            }
            Some(RecorderState::Paused) => {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.resume();
                }
                self.playback_reset();
            }
            _ => {
                if !self.is_playing_at(now) {
                    return;
                }
                self.transport.paused_at = Some(self.transport.current_time(now));
                self.playback_reset();
            }
        }
    }

    /// Stop the recorder and playback, forgetting the paused position.
    pub fn stop(&mut self) {
        let recording = self
            .recorder
            .as_ref()
            .is_some_and(|r| r.state() != RecorderState::Inactive);
        if recording {
            if let Some(recorder) = self.recorder.as_mut() {
                recorder.stop();
            }
            self.poll_recorder();
        }

        self.transport.paused_at = None;
        self.transport.playback_seconds = 0.0;
        self.playback_reset();
    }

    fn playback_reset(&mut self) {
        self.transport.last_seeked = None;
        self.transport.play_start = None;
        self.stop_animation();
        for track in &mut self.tracks {
            track.schedule_stop();
        }
        self.tickets.clear();
        self.restore_track_states();
    }

    pub fn rewind(&mut self) {
        self.stop();
        self.scroll_left = 0.0;
        self.select_from_playlist(0.0);
    }

    pub fn fast_forward(&mut self) {
        self.stop();
        self.scroll_left = if self.view_duration < self.duration {
            self.duration - self.view_duration
        } else {
            0.0
        };
        self.select_from_playlist(self.duration);
    }

    fn select_from_playlist(&mut self, at: f64) {
        self.seek(at, Some(at), None);
        self.emit(Notification::Select {
            start: at,
            end: at,
            track: None,
        });
    }

    // -------------------------------
    // MARK: Seek
    // -------------------------------

    /// Move the selection. While playing this is a live scrub that restarts
    /// playback from `start`.
    pub fn seek(&mut self, start: f64, end: Option<f64>, track: Option<TrackId>) {
        let now = self.context.current_time();
        let start = start.max(0.0);

        if self.is_playing_at(now) {
            self.transport.last_seeked = Some(start);
            self.transport.paused_at = None;
            let end = self.transport.resolve_end(start, None, &self.selection);
            self.restart_from(now, start, end);
            return;
        }

        self.active_track = track
            .filter(|id| self.track(*id).is_some())
            .or_else(|| self.tracks.first().map(|t| t.id()));
        self.transport.paused_at = Some(start);
        self.set_time_selection(start, end.unwrap_or(start).max(0.0));
        if self.config.seek_style == SeekStyle::Fill {
            self.transport.playback_seconds = start;
        }
        self.emit(Notification::TimeUpdate {
            playback_seconds: start,
        });
    }

    // -------------------------------
    // MARK: Animation
    // -------------------------------

    pub fn is_animating(&self) -> bool {
        self.animating
    }

    fn start_animation(&mut self, now: f64) {
        self.animating = true;
        self.transport.last_draw = Some(now);
    }

    /// Cancel the animation loop. `tick` does nothing until playback starts
    /// again.
    pub fn stop_animation(&mut self) {
        self.animating = false;
        self.transport.last_draw = None;
    }

    /// One animation frame. Returns true while the loop stays armed.
    pub fn tick(&mut self) -> bool {
        if !self.animating {
            return false;
        }
        let now = self.context.current_time();
        let playback = self.transport.current_time(now);

        // a capture runs until the recorder stops, past the end of the tracks
        if self.is_playing_at(now) || self.is_recording() {
            self.transport.playback_seconds = playback;
            self.transport.last_draw = Some(now);
            self.follow_playhead(playback);
            self.emit(Notification::TimeUpdate {
                playback_seconds: playback,
            });
            return true;
        }

        let end = if self.selection.is_segment() {
            self.selection.end
        } else {
            self.duration
        };
        if playback + 1e-9 >= end {
            info!("playback finished at {:.3}s", playback);
            self.emit(Notification::Finished);
        }

        self.stop_animation();
        self.transport.clear_positions();
        self.transport.playback_seconds = 0.0;
        self.tickets.clear();
        self.restore_track_states();
        false
    }

    /// Keep the playhead in view when automatic scrolling is on.
    fn follow_playhead(&mut self, playback: f64) {
        if !self.is_automatic_scroll || self.view_duration <= 0.0 {
            return;
        }
        let view_end = self.scroll_left + self.view_duration;
        if playback < self.scroll_left || playback >= view_end {
            self.scroll_left = playback;
        }
    }

    // -------------------------------
    // MARK: Realtime output
    // -------------------------------

    /// Render one output block from every live playout plus the master bus,
    /// then advance the realtime clock by the block length.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        let (left, right) = (&mut left[..frames], &mut right[..frames]);
        left.fill(0.0);
        right.fill(0.0);

        let block_start = self.context.current_frame();
        for track in &mut self.tracks {
            if let Some(playout) = track.playout_mut() {
                playout.render(block_start, left, right);
            }
        }
        self.master.process(left, right);
        self.context.advance(frames);
    }
}
