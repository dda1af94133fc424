// src/fade.rs
//
// Fade shapes and gain curves.

use serde::{Deserialize, Serialize};

/// Which edge of a track a fade sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeEdge {
    In,
    Out,
}

/// Fade curve shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FadeShape {
    #[serde(rename = "linear")]
    Linear,
    #[serde(rename = "exponential")]
    Exponential,
    #[serde(rename = "sCurve")]
    SCurve,
    #[default]
    #[serde(rename = "logarithmic")]
    Logarithmic,
}

impl FadeShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeShape::Linear => "linear",
            FadeShape::Exponential => "exponential",
            FadeShape::SCurve => "sCurve",
            FadeShape::Logarithmic => "logarithmic",
        }
    }

    /// Rising gain for `x` in `[0, 1]`.
    fn rising(&self, x: f64) -> f64 {
        let x = x.clamp(0.0, 1.0);
        match self {
            FadeShape::Linear => x,
            FadeShape::Exponential => (2.0 * x - 1.0).exp() / std::f64::consts::E,
            FadeShape::SCurve => {
                (std::f64::consts::PI * x - std::f64::consts::FRAC_PI_2).sin() / 2.0 + 0.5
            }
            FadeShape::Logarithmic => {
                const BASE: f64 = 10.0;
                (1.0 + BASE * x).ln() / (1.0 + BASE).ln()
            }
        }
    }
}

/// A fade on one edge of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fade {
    pub edge: FadeEdge,
    /// Length in seconds.
    pub duration: f64,
    pub shape: FadeShape,
}

impl Fade {
    pub fn fade_in(duration: f64, shape: FadeShape) -> Self {
        Self {
            edge: FadeEdge::In,
            duration,
            shape,
        }
    }

    pub fn fade_out(duration: f64, shape: FadeShape) -> Self {
        Self {
            edge: FadeEdge::Out,
            duration,
            shape,
        }
    }

    /// Gain of this fade at `position` seconds into a region `length` long.
    ///
    /// Outside the fade the gain is 1.
    pub fn gain_at(&self, position: f64, length: f64) -> f32 {
        let duration = self.duration.min(length);
        if duration <= 0.0 {
            return 1.0;
        }
        let gain = match self.edge {
            FadeEdge::In if position < duration => self.shape.rising(position / duration),
            FadeEdge::Out if position > length - duration => {
                self.shape.rising((length - position) / duration)
            }
            _ => 1.0,
        };
        gain as f32
    }
}

/// Product of every fade's gain at a position.
pub fn fades_gain_at(fades: &[Fade], position: f64, length: f64) -> f32 {
    fades.iter().map(|f| f.gain_at(position, length)).product()
}
