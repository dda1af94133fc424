// src/transport.rs
//
// Playlist transport state.
//
// Everything here is plain data plus time math. The clock itself lives in
// `clock.rs`; callers capture one clock snapshot per operation and pass it in,
// so no method here ever reads the clock on its own.

use serde::{Deserialize, Serialize};

/// A time selection in seconds. `start == end` is a cursor, not a range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSelection {
    pub start: f64,
    pub end: f64,
}

impl TimeSelection {
    /// Build a selection, ordering the endpoints.
    pub fn new(start: f64, end: f64) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn cursor(at: f64) -> Self {
        Self { start: at, end: at }
    }

    /// True when the selection spans a range rather than a single point.
    #[inline]
    pub fn is_segment(&self) -> bool {
        self.start != self.end
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Transport positions owned by the playlist.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    /// Cursor position (seconds). Moves with the time selection.
    pub cursor: f64,

    /// Where playback was paused, if it was.
    pub paused_at: Option<f64>,

    /// Position of the last live scrub.
    pub last_seeked: Option<f64>,

    /// Clock time at which the current playback was scheduled.
    pub last_play: f64,

    /// Timeline position the current playback was scheduled from.
    pub play_start: Option<f64>,

    /// Playhead position shown by the view.
    pub playback_seconds: f64,

    /// Clock time of the last animation frame.
    pub last_draw: Option<f64>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds of clock time since playback was scheduled.
    #[inline]
    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.last_play
    }

    /// Position the playback was (re)started from.
    #[inline]
    pub fn anchor(&self) -> f64 {
        self.play_start
            .or(self.last_seeked)
            .or(self.paused_at)
            .unwrap_or(self.cursor)
    }

    /// Current playlist time in seconds.
    #[inline]
    pub fn current_time(&self, now: f64) -> f64 {
        self.anchor() + self.elapsed(now)
    }

    /// Effective start for `play`: explicit start (0 included), then the
    /// paused position, then the cursor.
    pub fn resolve_start(&self, explicit: Option<f64>) -> f64 {
        explicit.or(self.paused_at).unwrap_or(self.cursor)
    }

    /// Effective end for `play`: explicit end, else the end of an active
    /// range selection that lies after `start`.
    pub fn resolve_end(
        &self,
        start: f64,
        explicit: Option<f64>,
        selection: &TimeSelection,
    ) -> Option<f64> {
        match explicit {
            Some(end) => Some(end),
            None if selection.is_segment() && selection.end > start => Some(selection.end),
            None => None,
        }
    }

    /// Clear paused and seek positions (used when playback fully stops).
    pub fn clear_positions(&mut self) {
        self.paused_at = None;
        self.last_seeked = None;
        self.play_start = None;
    }
}
