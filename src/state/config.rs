// src/state/config.rs
//
// Playlist construction options.
//
// Every field has a default, so hosts can pass a partial JSON object.
// Validation runs once at construction; an invalid config never produces a
// playlist.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fade::FadeShape;
use crate::gesture::InteractionMode;

/// How a stopped seek is drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekStyle {
    /// A line at the cursor.
    #[default]
    Line,
    /// Progress filled up to the cursor.
    Fill,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controls {
    pub show: bool,
    pub width: u32,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            show: false,
            width: 150,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Colors {
    pub wave_outline_color: String,
    pub time_color: String,
    pub fade_color: String,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            wave_outline_color: "white".to_string(),
            time_color: "grey".to_string(),
            fade_color: "black".to_string(),
        }
    }
}

/// A labelled time range drawn above the tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub lines: Vec<String>,
    #[serde(default)]
    pub lang: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnotationOptions {
    pub annotations: Vec<Annotation>,
    pub editable: bool,
    pub link_endpoints: bool,
    pub is_continuous_play: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlaylistConfig {
    /// Initial zoom; must be one of `zoom_levels`.
    pub samples_per_pixel: usize,
    pub zoom_levels: Vec<usize>,
    pub sample_rate: f64,
    /// Draw one merged envelope per track instead of one per channel.
    pub mono: bool,
    pub fade_type: FadeShape,
    /// Soloing a track un-solos every other one.
    pub excl_solo: bool,
    pub timescale: bool,
    pub seek_style: SeekStyle,
    pub wave_height: u32,
    pub collapsed_wave_height: u32,
    pub bar_width: u32,
    pub bar_gap: u32,
    pub state: InteractionMode,
    pub controls: Controls,
    pub colors: Colors,
    pub annotations: AnnotationOptions,
    pub is_automatic_scroll: bool,
    pub duration_format: String,
    /// Sample rate of offline renders.
    pub render_sample_rate: f64,
    /// Chunk interval requested from the recorder.
    pub record_timeslice_ms: u32,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            samples_per_pixel: 4096,
            zoom_levels: vec![512, 1024, 2048, 4096],
            sample_rate: 48_000.0,
            mono: true,
            fade_type: FadeShape::Logarithmic,
            excl_solo: false,
            timescale: false,
            seek_style: SeekStyle::Line,
            wave_height: 128,
            collapsed_wave_height: 30,
            bar_width: 1,
            bar_gap: 0,
            state: InteractionMode::Cursor,
            controls: Controls::default(),
            colors: Colors::default(),
            annotations: AnnotationOptions::default(),
            is_automatic_scroll: false,
            duration_format: "hh:mm:ss.uuu".to_string(),
            render_sample_rate: 48_000.0,
            record_timeslice_ms: 300,
        }
    }
}

impl PlaylistConfig {
    /// Parse options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zoom_levels.is_empty() {
            return Err(ConfigError::EmptyZoomLevels);
        }
        if self.zoom_levels.contains(&0) {
            return Err(ConfigError::InvalidZoom(0));
        }
        if !self.zoom_levels.contains(&self.samples_per_pixel) {
            return Err(ConfigError::InvalidZoom(self.samples_per_pixel));
        }
        for rate in [self.sample_rate, self.render_sample_rate] {
            if !(rate > 0.0 && rate.is_finite()) {
                return Err(ConfigError::InvalidSampleRate(rate));
            }
        }
        Ok(())
    }

    /// Index of a zoom level in the configured list.
    pub fn zoom_index(&self, samples_per_pixel: usize) -> Option<usize> {
        self.zoom_levels.iter().position(|z| *z == samples_per_pixel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlaylistConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.zoom_index(4096), Some(3));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = PlaylistConfig::from_json(
            r#"{"samplesPerPixel": 1024, "exclSolo": true, "seekStyle": "fill"}"#,
        )
        .unwrap();
        assert_eq!(config.samples_per_pixel, 1024);
        assert!(config.excl_solo);
        assert_eq!(config.seek_style, SeekStyle::Fill);
        assert_eq!(config.wave_height, 128);
        assert_eq!(config.controls.width, 150);
    }

    #[test]
    fn test_zoom_outside_levels_rejected() {
        let err = PlaylistConfig::from_json(r#"{"samplesPerPixel": 1000}"#).unwrap_err();
        assert_eq!(err, ConfigError::InvalidZoom(1000));

        let config = PlaylistConfig {
            zoom_levels: vec![],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyZoomLevels));
    }

    #[test]
    fn test_zero_zoom_level_rejected() {
        let config = PlaylistConfig {
            samples_per_pixel: 512,
            zoom_levels: vec![0, 512],
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidZoom(0)));
    }

    #[test]
    fn test_bad_sample_rate_rejected() {
        let config = PlaylistConfig {
            sample_rate: 0.0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidSampleRate(0.0)));
    }
}
