// src/loader.rs
//
// Audio source loading.
//
// The playlist never fetches or decodes audio itself; it hands each source
// to a Loader and gets back a decoded buffer. WAV decoding is provided here
// with hound, everything else is up to the host's loader.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use log::debug;

use crate::audio_buffer::AudioData;
use crate::effects::EffectChain;
use crate::error::LoadError;
use crate::fade::{Fade, FadeShape};
use crate::gesture::EnabledStates;
use crate::peaks::Peaks;
use crate::transport::TimeSelection;

/// Where a track's audio comes from.
#[derive(Debug, Clone)]
pub enum TrackSource {
    /// URL or filesystem path.
    Url(String),

    /// Already decoded audio.
    Buffer(Arc<AudioData>),

    /// Encoded bytes (a recording or a file picked by the user).
    Bytes { name: String, data: Arc<Vec<u8>> },
}

impl TrackSource {
    /// Human-readable name for logs and errors.
    pub fn display_name(&self) -> &str {
        match self {
            TrackSource::Url(url) => url,
            TrackSource::Buffer(_) => "<buffer>",
            TrackSource::Bytes { name, .. } => name,
        }
    }
}

/// Fade requested at load time. The shape falls back to the playlist's
/// fade type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeSpec {
    pub duration: f64,
    pub shape: Option<FadeShape>,
}

/// One entry of a load batch. Unset fields take the track defaults.
#[derive(Debug, Clone)]
pub struct TrackSpec {
    pub source: TrackSource,
    pub name: Option<String>,
    pub start: Option<f64>,
    pub cue_in: Option<f64>,
    pub cue_out: Option<f64>,
    pub gain: Option<f32>,
    pub stereo_pan: Option<f32>,
    pub fade_in: Option<FadeSpec>,
    pub fade_out: Option<FadeSpec>,
    pub muted: bool,
    pub soloed: bool,
    pub selected: Option<TimeSelection>,
    /// Precomputed envelope, used when it matches the current zoom.
    pub peaks: Option<Peaks>,
    pub enabled_states: EnabledStates,
    pub custom_class: Option<String>,
    pub wave_outline_color: Option<String>,
    pub effects: EffectChain,
}

impl TrackSpec {
    pub fn new(source: TrackSource) -> Self {
        Self {
            source,
            name: None,
            start: None,
            cue_in: None,
            cue_out: None,
            gain: None,
            stereo_pan: None,
            fade_in: None,
            fade_out: None,
            muted: false,
            soloed: false,
            selected: None,
            peaks: None,
            enabled_states: EnabledStates::default(),
            custom_class: None,
            wave_outline_color: None,
            effects: EffectChain::new(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::new(TrackSource::Url(url.into()))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn starting_at(mut self, start: f64) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_cues(mut self, cue_in: f64, cue_out: f64) -> Self {
        self.cue_in = Some(cue_in);
        self.cue_out = Some(cue_out);
        self
    }

    /// Resolve the fades against a default shape.
    pub fn fades(&self, default_shape: FadeShape) -> Vec<Fade> {
        let mut fades = Vec::new();
        if let Some(f) = self.fade_in {
            fades.push(Fade::fade_in(f.duration, f.shape.unwrap_or(default_shape)));
        }
        if let Some(f) = self.fade_out {
            fades.push(Fade::fade_out(f.duration, f.shape.unwrap_or(default_shape)));
        }
        fades
    }
}

//
// ===============================
// MARK: Loader contract
// ===============================
//

/// Fetches and decodes a source into a buffer.
pub trait Loader: Send {
    fn load(&self, source: &TrackSource) -> Result<AudioData, LoadError>;
}

/// Decode a WAV file held in memory.
pub fn decode_wav(name: &str, bytes: &[u8]) -> Result<AudioData, LoadError> {
    let decode_err = |e: hound::Error| LoadError::Decode {
        source_name: name.to_string(),
        reason: e.to_string(),
    };

    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(decode_err)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(decode_err)?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_err)?
        }
    };

    Ok(AudioData::from_interleaved(
        &samples,
        channels,
        f64::from(spec.sample_rate),
    ))
}

/// WAV loader backed by an in-memory registry, falling back to the
/// filesystem for unregistered URLs.
#[derive(Debug, Default)]
pub struct WavLoader {
    registry: HashMap<String, Arc<Vec<u8>>>,
}

impl WavLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url` without touching the filesystem.
    pub fn register(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.registry.insert(url.into(), Arc::new(bytes));
    }

    fn fetch(&self, url: &str) -> Result<Arc<Vec<u8>>, LoadError> {
        if let Some(bytes) = self.registry.get(url) {
            return Ok(Arc::clone(bytes));
        }
        let path = Path::new(url);
        std::fs::read(path).map(Arc::new).map_err(|e| LoadError::Fetch {
            source_name: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Loader for WavLoader {
    fn load(&self, source: &TrackSource) -> Result<AudioData, LoadError> {
        match source {
            TrackSource::Buffer(data) => Ok(AudioData::clone(data)),
            TrackSource::Bytes { name, data } => decode_wav(name, data),
            TrackSource::Url(url) => {
                let bytes = self.fetch(url)?;
                debug!("fetched {} ({} bytes)", url, bytes.len());
                decode_wav(url, &bytes)
            }
        }
    }
}

/// Loader serving pre-decoded buffers by URL. Unknown URLs fail to fetch.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    buffers: HashMap<String, Arc<AudioData>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, data: AudioData) {
        self.buffers.insert(url.into(), Arc::new(data));
    }

    pub fn with(mut self, url: impl Into<String>, data: AudioData) -> Self {
        self.insert(url, data);
        self
    }
}

impl Loader for MemoryLoader {
    fn load(&self, source: &TrackSource) -> Result<AudioData, LoadError> {
        match source {
            TrackSource::Buffer(data) => Ok(AudioData::clone(data)),
            TrackSource::Bytes { name, data } => decode_wav(name, data),
            TrackSource::Url(url) => self
                .buffers
                .get(url)
                .map(|d| AudioData::clone(d))
                .ok_or_else(|| LoadError::Fetch {
                    source_name: url.clone(),
                    reason: "not found".to_string(),
                }),
        }
    }
}
