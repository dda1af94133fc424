// src/gesture.rs
//
// Pointer gesture state machines.
//
// Every track is in one interaction mode at a time. Each mode owns a small
// per-pointer-session machine (`Idle -> Active -> Idle`) that turns pixel
// positions into timeline gestures. Leaving the element completes a gesture
// exactly like a release, so no machine is ever left dangling in `Active`.

use serde::{Deserialize, Serialize};

use crate::clock::pixels_to_seconds;

/// Interaction mode of a track (and the playlist default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    #[default]
    Cursor,
    Select,
    Shift,
    FadeIn,
    FadeOut,
    None,
}

impl InteractionMode {
    /// CSS-style class name used by the render tree.
    pub fn class_name(&self) -> &'static str {
        match self {
            InteractionMode::Cursor => "state-cursor",
            InteractionMode::Select => "state-select",
            InteractionMode::Shift => "state-shift",
            InteractionMode::FadeIn => "state-fadein",
            InteractionMode::FadeOut => "state-fadeout",
            InteractionMode::None => "state-none",
        }
    }
}

/// Modes a track allows. Disabled modes fall back to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledStates {
    pub cursor: bool,
    pub fadein: bool,
    pub fadeout: bool,
    pub select: bool,
    pub shift: bool,
}

impl Default for EnabledStates {
    fn default() -> Self {
        Self {
            cursor: true,
            fadein: true,
            fadeout: true,
            select: true,
            shift: true,
        }
    }
}

impl EnabledStates {
    pub fn allows(&self, mode: InteractionMode) -> bool {
        match mode {
            InteractionMode::Cursor => self.cursor,
            InteractionMode::Select => self.select,
            InteractionMode::Shift => self.shift,
            InteractionMode::FadeIn => self.fadein,
            InteractionMode::FadeOut => self.fadeout,
            InteractionMode::None => true,
        }
    }
}

/// Pointer input, in pixels relative to the timeline origin.
///
/// Touch events may arrive without a usable position, hence the `Option`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Option<f64>),
    Move(Option<f64>),
    Up(Option<f64>),
    Leave(Option<f64>),
}

/// Timeline gesture produced by a machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Select `[start, end]` seconds (`start == end` places the cursor).
    Select { start: f64, end: f64 },

    /// Move the track by `delta` seconds.
    Shift { delta: f64 },

    /// Set a fade-in of `duration` seconds.
    FadeIn { duration: f64 },

    /// Set a fade-out of `duration` seconds.
    FadeOut { duration: f64 },
}

/// Session state shared by every machine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum GestureState {
    #[default]
    Idle,

    /// Pointer held; `anchor` is the press position (select) or the last
    /// move position (shift), in pixels.
    Active { anchor: f64 },
}

/// Zoom context needed to map pixels to seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelScale {
    pub samples_per_pixel: usize,
    pub sample_rate: f64,
}

impl PixelScale {
    #[inline]
    pub fn seconds(&self, pixels: f64) -> f64 {
        pixels_to_seconds(pixels, self.samples_per_pixel, self.sample_rate)
    }

    /// Fractional pixel offset of a time.
    #[inline]
    pub fn pixels(&self, seconds: f64) -> f64 {
        seconds * self.sample_rate / self.samples_per_pixel.max(1) as f64
    }
}

/// Timeline span of the track a gesture is bound to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSpan {
    pub start: f64,
    pub end: f64,
}

// ═══════════════════════════════════════════════════════════════════
// Select
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct SelectGesture {
    state: GestureState,
    last_x: f64,
}

impl SelectGesture {
    pub fn state(&self) -> GestureState {
        self.state
    }

    fn selection(anchor: f64, x: f64, scale: PixelScale) -> Gesture {
        Gesture::Select {
            start: scale.seconds(anchor.min(x)),
            end: scale.seconds(anchor.max(x)),
        }
    }

    pub fn handle(&mut self, event: PointerEvent, scale: PixelScale) -> Option<Gesture> {
        match (self.state, event) {
            (GestureState::Idle, PointerEvent::Down(Some(x))) => {
                self.state = GestureState::Active { anchor: x };
                self.last_x = x;
                let t = scale.seconds(x);
                Some(Gesture::Select { start: t, end: t })
            }
            (GestureState::Active { anchor }, PointerEvent::Move(Some(x))) => {
                self.last_x = x;
                Some(Self::selection(anchor, x, scale))
            }
            (GestureState::Active { anchor }, PointerEvent::Up(x) | PointerEvent::Leave(x)) => {
                self.state = GestureState::Idle;
                Some(Self::selection(anchor, x.unwrap_or(self.last_x), scale))
            }
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Shift
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ShiftGesture {
    state: GestureState,
}

impl ShiftGesture {
    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn handle(&mut self, event: PointerEvent, scale: PixelScale) -> Option<Gesture> {
        match (self.state, event) {
            (GestureState::Idle, PointerEvent::Down(Some(x))) => {
                self.state = GestureState::Active { anchor: x };
                None
            }
            (GestureState::Active { anchor }, PointerEvent::Move(Some(x))) => {
                // deltas are relative to the previous move
                self.state = GestureState::Active { anchor: x };
                Some(Gesture::Shift {
                    delta: scale.seconds(x - anchor),
                })
            }
            (GestureState::Active { anchor }, PointerEvent::Up(x) | PointerEvent::Leave(x)) => {
                self.state = GestureState::Idle;
                let x = x.unwrap_or(anchor);
                Some(Gesture::Shift {
                    delta: scale.seconds(x - anchor),
                })
            }
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Per-track machine
// ═══════════════════════════════════════════════════════════════════

/// Gesture machine for a track's current mode.
#[derive(Debug, Clone, Default)]
pub enum TrackGesture {
    Cursor,
    Select(SelectGesture),
    Shift(ShiftGesture),
    FadeIn,
    FadeOut,
    #[default]
    Inert,
}

impl TrackGesture {
    pub fn for_mode(mode: InteractionMode) -> Self {
        match mode {
            InteractionMode::Cursor => TrackGesture::Cursor,
            InteractionMode::Select => TrackGesture::Select(SelectGesture::default()),
            InteractionMode::Shift => TrackGesture::Shift(ShiftGesture::default()),
            InteractionMode::FadeIn => TrackGesture::FadeIn,
            InteractionMode::FadeOut => TrackGesture::FadeOut,
            InteractionMode::None => TrackGesture::Inert,
        }
    }

    /// Whether a pointer session is in progress.
    pub fn is_active(&self) -> bool {
        match self {
            TrackGesture::Select(g) => g.state() != GestureState::Idle,
            TrackGesture::Shift(g) => g.state() != GestureState::Idle,
            _ => false,
        }
    }

    pub fn handle(
        &mut self,
        event: PointerEvent,
        scale: PixelScale,
        span: TrackSpan,
    ) -> Option<Gesture> {
        match self {
            TrackGesture::Select(g) => g.handle(event, scale),
            TrackGesture::Shift(g) => g.handle(event, scale),
            TrackGesture::Cursor => match event {
                PointerEvent::Down(Some(x)) => {
                    let t = scale.seconds(x);
                    Some(Gesture::Select { start: t, end: t })
                }
                _ => None,
            },
            TrackGesture::FadeIn => match event {
                PointerEvent::Down(Some(x)) => {
                    let t = scale.seconds(x);
                    (t > span.start && t < span.end).then(|| Gesture::FadeIn {
                        duration: t - span.start,
                    })
                }
                _ => None,
            },
            TrackGesture::FadeOut => match event {
                PointerEvent::Down(Some(x)) => {
                    let t = scale.seconds(x);
                    (t > span.start && t < span.end).then(|| Gesture::FadeOut {
                        duration: span.end - t,
                    })
                }
                _ => None,
            },
            TrackGesture::Inert => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 100 pixels per second
    const SCALE: PixelScale = PixelScale {
        samples_per_pixel: 480,
        sample_rate: 48_000.0,
    };
    const SPAN: TrackSpan = TrackSpan { start: 1.0, end: 5.0 };

    #[test]
    fn test_select_press_emits_zero_width() {
        let mut g = SelectGesture::default();
        let out = g.handle(PointerEvent::Down(Some(200.0)), SCALE);
        assert_eq!(out, Some(Gesture::Select { start: 2.0, end: 2.0 }));
        assert_eq!(g.state(), GestureState::Active { anchor: 200.0 });
    }

    #[test]
    fn test_select_drag_left_orders_range() {
        let mut g = SelectGesture::default();
        g.handle(PointerEvent::Down(Some(300.0)), SCALE);
        let out = g.handle(PointerEvent::Move(Some(100.0)), SCALE);
        assert_eq!(out, Some(Gesture::Select { start: 1.0, end: 3.0 }));

        let out = g.handle(PointerEvent::Up(Some(400.0)), SCALE);
        assert_eq!(out, Some(Gesture::Select { start: 3.0, end: 4.0 }));
        assert_eq!(g.state(), GestureState::Idle);
    }

    #[test]
    fn test_select_leave_completes_like_release() {
        let mut g = SelectGesture::default();
        g.handle(PointerEvent::Down(Some(100.0)), SCALE);
        g.handle(PointerEvent::Move(Some(250.0)), SCALE);
        let out = g.handle(PointerEvent::Leave(None), SCALE);
        assert_eq!(out, Some(Gesture::Select { start: 1.0, end: 2.5 }));
        assert_eq!(g.state(), GestureState::Idle);

        // moves after completion are ignored
        assert_eq!(g.handle(PointerEvent::Move(Some(10.0)), SCALE), None);
    }

    #[test]
    fn test_shift_deltas_are_relative_to_last_move() {
        let mut g = ShiftGesture::default();
        assert_eq!(g.handle(PointerEvent::Down(Some(100.0)), SCALE), None);

        let a = g.handle(PointerEvent::Move(Some(150.0)), SCALE);
        let b = g.handle(PointerEvent::Move(Some(175.0)), SCALE);
        assert_eq!(a, Some(Gesture::Shift { delta: 0.5 }));
        assert_eq!(b, Some(Gesture::Shift { delta: 0.25 }));

        let c = g.handle(PointerEvent::Up(Some(175.0)), SCALE);
        assert_eq!(c, Some(Gesture::Shift { delta: 0.0 }));
        assert_eq!(g.state(), GestureState::Idle);
    }

    #[test]
    fn test_shift_leave_completes() {
        let mut g = ShiftGesture::default();
        g.handle(PointerEvent::Down(Some(100.0)), SCALE);
        let out = g.handle(PointerEvent::Leave(Some(50.0)), SCALE);
        assert_eq!(out, Some(Gesture::Shift { delta: -0.5 }));
        assert_eq!(g.state(), GestureState::Idle);
    }

    #[test]
    fn test_touch_without_position_does_not_activate() {
        let mut g = TrackGesture::for_mode(InteractionMode::Select);
        assert_eq!(g.handle(PointerEvent::Down(None), SCALE, SPAN), None);
        assert!(!g.is_active());
    }

    #[test]
    fn test_fade_gestures_measure_from_track_edges() {
        let mut fin = TrackGesture::for_mode(InteractionMode::FadeIn);
        let out = fin.handle(PointerEvent::Down(Some(150.0)), SCALE, SPAN);
        assert_eq!(out, Some(Gesture::FadeIn { duration: 0.5 }));

        let mut fout = TrackGesture::for_mode(InteractionMode::FadeOut);
        let out = fout.handle(PointerEvent::Down(Some(400.0)), SCALE, SPAN);
        assert_eq!(out, Some(Gesture::FadeOut { duration: 1.0 }));

        // outside the track
        assert_eq!(fout.handle(PointerEvent::Down(Some(600.0)), SCALE, SPAN), None);
    }

    #[test]
    fn test_enabled_states_gate_modes() {
        let states = EnabledStates {
            shift: false,
            ..Default::default()
        };
        assert!(!states.allows(InteractionMode::Shift));
        assert!(states.allows(InteractionMode::Select));
    }
}
