//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { waveline_init, WavelinePlaylist } from './waveline.js';
//!
//! await init();
//! waveline_init();
//!
//! const playlist = new WavelinePlaylist(JSON.stringify({ samplesPerPixel: 1024 }));
//! playlist.load_wav("drums.wav", new Uint8Array(buffer), "{}");
//! playlist.dispatch("play", "{}");
//!
//! // AudioWorklet: playlist.process_block(left, right)
//! // requestAnimationFrame: playlist.tick(); playlist.poll_workers();
//! for (const event of JSON.parse(playlist.take_events())) { ... }
//! ```

use std::sync::Arc;

use crossbeam_channel::Receiver;
use log::warn;
use serde::Deserialize;
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;

use crate::audio_buffer::AudioData;
use crate::clock::AudioContext;
use crate::gesture::PointerEvent;
use crate::loader::{FadeSpec, TrackSource, TrackSpec, WavLoader};
use crate::playlist::{Playlist, create_playlist};
use crate::recorder::{HostRecorder, RecorderFeed};
use crate::render_tree::RenderTree;
use crate::state::{
    Command, MemoryProject, Notification, PlaylistConfig, ProjectArchive, RenderOutput,
    SharedProject, VersionedProject,
};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn waveline_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════
// Load options
// ═══════════════════════════════════════════════════════════════════════════

/// Per-track options accepted by `load_wav`, in the editor's JSON shape.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LoadOptions {
    name: Option<String>,
    start: Option<f64>,
    cuein: Option<f64>,
    cueout: Option<f64>,
    gain: Option<f32>,
    stereo_pan: Option<f32>,
    fade_in: Option<FadeSpecJson>,
    fade_out: Option<FadeSpecJson>,
    muted: bool,
    soloed: bool,
    custom_class: Option<String>,
    wave_outline_color: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FadeSpecJson {
    duration: f64,
    #[serde(default)]
    shape: Option<crate::fade::FadeShape>,
}

impl From<FadeSpecJson> for FadeSpec {
    fn from(f: FadeSpecJson) -> Self {
        FadeSpec {
            duration: f.duration,
            shape: f.shape,
        }
    }
}

impl LoadOptions {
    fn into_spec(self, source: TrackSource) -> TrackSpec {
        let mut spec = TrackSpec::new(source);
        spec.name = self.name;
        spec.start = self.start;
        spec.cue_in = self.cuein;
        spec.cue_out = self.cueout;
        spec.gain = self.gain;
        spec.stereo_pan = self.stereo_pan;
        spec.fade_in = self.fade_in.map(FadeSpec::from);
        spec.fade_out = self.fade_out.map(FadeSpec::from);
        spec.muted = self.muted;
        spec.soloed = self.soloed;
        spec.custom_class = self.custom_class;
        spec.wave_outline_color = self.wave_outline_color;
        spec
    }
}

fn parse_or_default<T: Default + for<'de> Deserialize<'de>>(json: &str) -> Result<T, JsValue> {
    if json.trim().is_empty() {
        Ok(T::default())
    } else {
        serde_json::from_str(json).map_err(js_err)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════════════════════

/// JSON shape of an outbound event. Payloads too large for JSON (rendered
/// audio, archives) are kept on the playlist handle instead.
fn event_json(notification: &Notification) -> Value {
    let name = notification.name();
    match notification {
        Notification::TimeUpdate { playback_seconds } => {
            json!({ "name": name, "playbackSeconds": playback_seconds })
        }
        Notification::AudioSourcesError { message }
        | Notification::AudioRenderingFailed { message } => {
            json!({ "name": name, "message": message })
        }
        Notification::AudioRenderingFinished { format, output } => {
            let kind = match output {
                RenderOutput::Buffer(_) => "buffer",
                RenderOutput::Encoded { .. } => "encoded",
            };
            json!({ "name": name, "format": format, "output": kind })
        }
        Notification::Select { start, end, track } => {
            json!({ "name": name, "start": start, "end": end, "track": track })
        }
        Notification::ZipProjectExported { archive } => {
            json!({ "name": name, "entries": archive.names().collect::<Vec<_>>() })
        }
        _ => json!({ "name": name }),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Playlist
// ═══════════════════════════════════════════════════════════════════════════

/// Browser-side playlist handle.
#[wasm_bindgen]
pub struct WavelinePlaylist {
    inner: Playlist,
    events: Receiver<Notification>,
    project: SharedProject,
    recorder_feed: Option<RecorderFeed>,

    rendered: Option<Arc<AudioData>>,
    rendered_bytes: Option<Vec<u8>>,
    exported: Option<ProjectArchive>,
    import: ProjectArchive,
}

#[wasm_bindgen]
impl WavelinePlaylist {
    /// Create a playlist from JSON options (empty for defaults).
    #[wasm_bindgen(constructor)]
    pub fn new(options: &str) -> Result<WavelinePlaylist, JsValue> {
        let config = if options.trim().is_empty() {
            PlaylistConfig::default()
        } else {
            PlaylistConfig::from_json(options).map_err(js_err)?
        };
        // the worklet advances the clock through process_block
        let (context, _clock) = AudioContext::realtime(config.sample_rate);
        let (mut inner, events) =
            create_playlist(config, context, Box::new(WavLoader::new())).map_err(js_err)?;
        let project = MemoryProject::new().shared();
        inner.attach_project(&project);

        Ok(Self {
            inner,
            events,
            project,
            recorder_feed: None,
            rendered: None,
            rendered_bytes: None,
            exported: None,
            import: ProjectArchive::new(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Load WAV bytes as a new track. Returns the track id.
    pub fn load_wav(&mut self, name: &str, bytes: &[u8], options: &str) -> Result<u32, JsValue> {
        let options: LoadOptions = parse_or_default(options)?;
        let source = TrackSource::Bytes {
            name: name.to_string(),
            data: Arc::new(bytes.to_vec()),
        };
        let ids = self
            .inner
            .load(vec![options.into_spec(source)])
            .map_err(js_err)?;
        ids.first()
            .copied()
            .ok_or_else(|| JsValue::from_str("nothing loaded"))
    }

    /// Apply a bus event. Returns false for unknown events or missing
    /// arguments.
    pub fn dispatch(&mut self, name: &str, args: &str) -> Result<bool, JsValue> {
        let args: Value = parse_or_default(args)?;
        let Some(command) = Command::from_event(name, &args) else {
            warn!("ignored event {}", name);
            return Ok(false);
        };
        self.inner.dispatch(command).map_err(js_err)?;
        Ok(true)
    }

    /// Pointer input on a track: `kind` is down, move, up or leave.
    pub fn pointer(&mut self, track: u32, kind: &str, x: Option<f64>) -> bool {
        let event = match kind {
            "down" => PointerEvent::Down(x),
            "move" => PointerEvent::Move(x),
            "up" => PointerEvent::Up(x),
            "leave" => PointerEvent::Leave(x),
            _ => return false,
        };
        self.inner.handle_pointer(track, event).is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audio and animation
    // ─────────────────────────────────────────────────────────────────────────

    /// Render one block of live output. Call from the AudioWorklet.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.inner.process_block(left, right);
    }

    /// Advance the animation. Returns whether another frame is wanted.
    pub fn tick(&mut self) -> bool {
        self.inner.tick()
    }

    pub fn poll_workers(&mut self) {
        self.inner.poll_workers();
    }

    /// Pending events as a JSON array.
    pub fn take_events(&mut self) -> String {
        let mut out = Vec::new();
        while let Ok(notification) = self.events.try_recv() {
            out.push(event_json(&notification));
            match notification {
                Notification::AudioRenderingFinished { output, .. } => match output {
                    RenderOutput::Buffer(buffer) => self.rendered = Some(buffer),
                    RenderOutput::Encoded { bytes, .. } => self.rendered_bytes = Some(bytes),
                },
                Notification::ZipProjectExported { archive } => self.exported = Some(archive),
                _ => {}
            }
        }
        Value::Array(out).to_string()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Render output
    // ─────────────────────────────────────────────────────────────────────────

    /// One channel of the last rendered buffer.
    pub fn rendered_channel(&self, channel: u32) -> Vec<f32> {
        self.rendered
            .as_ref()
            .and_then(|b| b.channels().get(channel as usize))
            .cloned()
            .unwrap_or_default()
    }

    /// Bytes of the last encoded render.
    pub fn rendered_bytes(&self) -> Option<Vec<u8>> {
        self.rendered_bytes.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Recording
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach a recorder fed from JavaScript with WAV chunks.
    pub fn enable_recorder(&mut self) {
        let (recorder, feed) = HostRecorder::new();
        self.inner.set_recorder(Box::new(recorder));
        self.recorder_feed = Some(feed);
    }

    pub fn push_recording_chunk(&mut self, chunk: &[u8]) -> bool {
        self.recorder_feed
            .as_ref()
            .is_some_and(|feed| feed.push(chunk.to_vec()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Project archives
    // ─────────────────────────────────────────────────────────────────────────

    /// Entry names of the last exported archive, as JSON.
    pub fn exported_entries(&self) -> String {
        let names: Vec<&str> = self.exported.iter().flat_map(|a| a.names()).collect();
        json!(names).to_string()
    }

    pub fn exported_entry(&self, name: &str) -> Option<Vec<u8>> {
        self.exported
            .as_ref()
            .and_then(|a| a.get(name))
            .map(<[u8]>::to_vec)
    }

    /// Stage one entry of an archive to import.
    pub fn add_import_entry(&mut self, name: &str, bytes: &[u8]) {
        self.import.insert(name, bytes.to_vec());
    }

    /// Import the staged archive.
    pub fn import_project(&mut self) -> Result<(), JsValue> {
        let archive = std::mem::take(&mut self.import);
        self.inner
            .dispatch(Command::ImportZipProject {
                archive: Box::new(archive),
            })
            .map_err(js_err)
    }

    /// Current project history index.
    pub fn history_index(&self) -> u32 {
        let project = self
            .project
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        project.history().current_index as u32
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    pub fn render_tree(&self) -> Result<String, JsValue> {
        serde_json::to_string(&RenderTree::build(&self.inner)).map_err(js_err)
    }

    pub fn info(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.inner.info()).map_err(js_err)
    }

    pub fn is_playing(&self) -> bool {
        self.inner.is_playing()
    }

    pub fn current_time(&self) -> f64 {
        self.inner.current_time()
    }

    pub fn duration(&self) -> f64 {
        self.inner.duration()
    }
}
