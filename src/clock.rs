// src/clock.rs
//
// Audio contexts and time conversions.
//
// An AudioContext is the hardware (or offline) clock that every Playout
// schedules against. The realtime clock is a shared atomic frame counter:
// the audio side advances it through a ClockHandle, the UI side only reads it.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an audio context.
pub type ContextId = u64;

//
// ===============================
// MARK: Audio context
// ===============================
//

/// What kind of rendering the context performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// Driven by the host audio callback.
    Realtime,

    /// Non-real-time render of a fixed number of frames.
    Offline { length: usize },
}

/// A clock plus the format every Playout bound to it renders in.
///
/// Cloning is cheap and yields a handle to the same clock.
#[derive(Debug, Clone)]
pub struct AudioContext {
    id: ContextId,
    kind: ContextKind,
    sample_rate: f64,
    channels: usize,
    frames: Arc<AtomicU64>,
}

impl AudioContext {
    /// Create a realtime context and the handle the audio side advances.
    pub fn realtime(sample_rate: f64) -> (Self, ClockHandle) {
        let ctx = Self::with_kind(ContextKind::Realtime, 2, sample_rate);
        let handle = ClockHandle {
            frames: Arc::clone(&ctx.frames),
            sample_rate,
        };
        (ctx, handle)
    }

    /// Create an offline context rendering `length` frames.
    pub fn offline(channels: usize, length: usize, sample_rate: f64) -> Self {
        Self::with_kind(ContextKind::Offline { length }, channels, sample_rate)
    }

    fn with_kind(kind: ContextKind, channels: usize, sample_rate: f64) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            sample_rate,
            channels,
            frames: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    pub fn id(&self) -> ContextId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    #[inline]
    pub fn is_offline(&self) -> bool {
        matches!(self.kind, ContextKind::Offline { .. })
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Current clock position in frames.
    #[inline]
    pub fn current_frame(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    /// Current clock time in seconds.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_frame() as f64 / self.sample_rate
    }

    /// Advance the clock after a block has been rendered.
    pub(crate) fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }
}

/// Write side of a realtime clock.
///
/// Owned by whatever drives audio output (an AudioWorklet, a cpal callback,
/// or a test).
#[derive(Debug, Clone)]
pub struct ClockHandle {
    frames: Arc<AtomicU64>,
    sample_rate: f64,
}

impl ClockHandle {
    /// Advance the clock by a rendered block.
    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::AcqRel);
    }

    /// Advance the clock by a duration in seconds.
    pub fn advance_seconds(&self, seconds: f64) {
        self.advance(seconds_to_frames(seconds, self.sample_rate));
    }

    /// Jump the clock to an absolute time.
    pub fn set_time(&self, seconds: f64) {
        self.frames
            .store(seconds_to_frames(seconds, self.sample_rate) as u64, Ordering::Release);
    }
}

//
// ===============================
// MARK: Conversions
// ===============================
//

#[inline]
pub fn samples_to_seconds(samples: usize, sample_rate: f64) -> f64 {
    samples as f64 / sample_rate
}

/// Seconds to a whole number of samples, rounding up.
#[inline]
pub fn seconds_to_samples(seconds: f64, sample_rate: f64) -> usize {
    (seconds * sample_rate).ceil().max(0.0) as usize
}

/// Seconds to the nearest frame.
#[inline]
pub fn seconds_to_frames(seconds: f64, sample_rate: f64) -> usize {
    (seconds * sample_rate).round().max(0.0) as usize
}

#[inline]
pub fn pixels_to_seconds(pixels: f64, samples_per_pixel: usize, sample_rate: f64) -> f64 {
    pixels * samples_per_pixel as f64 / sample_rate
}

/// Seconds to pixel columns, rounding up so a partial column is drawn.
#[inline]
pub fn seconds_to_pixels(seconds: f64, samples_per_pixel: usize, sample_rate: f64) -> usize {
    (seconds * sample_rate / samples_per_pixel as f64).ceil().max(0.0) as usize
}
