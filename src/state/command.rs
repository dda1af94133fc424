// Commands from the host to the playlist.
//
// Commands are the inbound half of the event bus. Every user action the
// host forwards becomes one Command, applied through `Playlist::dispatch`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fade::FadeShape;
use crate::gesture::InteractionMode;
use crate::loader::TrackSpec;
use crate::state::archive::ProjectArchive;
use crate::track::TrackId;

/// Output format of an offline render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    /// Raw rendered buffer.
    #[default]
    Buffer,
    /// Encoded by the WAV worker.
    Wav,
    /// Raw buffer; the host encodes.
    Mp3,
    Opus,
    Aac,
}

impl RenderFormat {
    /// Whether the playlist encodes this format itself.
    pub fn is_encoded_here(&self) -> bool {
        matches!(self, RenderFormat::Wav)
    }
}

/// A command from the host to the playlist.
#[derive(Debug, Clone)]
pub enum Command {
    // ═══════════════════════════════════════════
    // Transport
    // ═══════════════════════════════════════════
    Play {
        start: Option<f64>,
        end: Option<f64>,
    },
    Pause,
    Stop,
    Rewind,
    FastForward,
    Record,

    /// Move the cursor or selection; scrubs while playing.
    Seek {
        start: f64,
        end: Option<f64>,
        track: Option<TrackId>,
    },

    // ═══════════════════════════════════════════
    // Edits
    // ═══════════════════════════════════════════
    Cut,
    Trim,
    Split,
    RazorCut,

    /// Move a track by `delta` seconds.
    Shift {
        track: TrackId,
        delta: f64,
    },

    FadeIn {
        track: TrackId,
        duration: f64,
    },
    FadeOut {
        track: TrackId,
        duration: f64,
    },
    FadeType {
        shape: FadeShape,
    },

    // ═══════════════════════════════════════════
    // Mix
    // ═══════════════════════════════════════════
    Solo {
        track: TrackId,
    },
    Mute {
        track: TrackId,
    },

    /// Track volume, 0..100.
    VolumeChange {
        track: TrackId,
        volume: f32,
    },

    /// Master volume, 0..100.
    MasterVolumeChange {
        volume: f32,
    },
    StereoPan {
        track: TrackId,
        pan: f32,
    },

    // ═══════════════════════════════════════════
    // Tracks
    // ═══════════════════════════════════════════
    Load {
        sources: Vec<TrackSpec>,
    },
    NewTrack {
        spec: Box<TrackSpec>,
    },
    RemoveTrack {
        track: TrackId,
    },
    ChangeTrackView {
        track: TrackId,
        collapsed: bool,
    },
    Clear,

    // ═══════════════════════════════════════════
    // View
    // ═══════════════════════════════════════════
    ZoomIn,
    ZoomOut,
    SetZoom {
        samples_per_pixel: usize,
    },
    State {
        mode: InteractionMode,
    },
    DurationFormat {
        format: String,
    },
    AutomaticScroll {
        enabled: bool,
    },
    Scroll {
        seconds: f64,
    },

    // ═══════════════════════════════════════════
    // Render and project
    // ═══════════════════════════════════════════
    StartAudioRendering {
        format: RenderFormat,
    },
    Commit,
    Undo,
    Redo,
    ImportZipProject {
        archive: Box<ProjectArchive>,
    },
    ExportZipProject,
}

fn num(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

fn track_id(args: &Value) -> Option<TrackId> {
    args.get("track")
        .and_then(Value::as_u64)
        .and_then(|id| TrackId::try_from(id).ok())
}

impl Command {
    /// Event name on the host's bus.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "play",
            Command::Pause => "pause",
            Command::Stop => "stop",
            Command::Rewind => "rewind",
            Command::FastForward => "fastforward",
            Command::Record => "record",
            Command::Seek { .. } => "seek",
            Command::Cut => "cut",
            Command::Trim => "trim",
            Command::Split => "split",
            Command::RazorCut => "razorCut",
            Command::Shift { .. } => "shift",
            Command::FadeIn { .. } => "fadein",
            Command::FadeOut { .. } => "fadeout",
            Command::FadeType { .. } => "fadetype",
            Command::Solo { .. } => "solo",
            Command::Mute { .. } => "mute",
            Command::VolumeChange { .. } => "volumechange",
            Command::MasterVolumeChange { .. } => "mastervolumechange",
            Command::StereoPan { .. } => "stereopan",
            Command::Load { .. } => "load",
            Command::NewTrack { .. } => "newtrack",
            Command::RemoveTrack { .. } => "removeTrack",
            Command::ChangeTrackView { .. } => "changeTrackView",
            Command::Clear => "clear",
            Command::ZoomIn => "zoomin",
            Command::ZoomOut => "zoomout",
            Command::SetZoom { .. } => "zoom",
            Command::State { .. } => "statechange",
            Command::DurationFormat { .. } => "durationformat",
            Command::AutomaticScroll { .. } => "automaticscroll",
            Command::Scroll { .. } => "scroll",
            Command::StartAudioRendering { .. } => "startaudiorendering",
            Command::Commit => "commit",
            Command::Undo => "undo",
            Command::Redo => "redo",
            Command::ImportZipProject { .. } => "importZipProject",
            Command::ExportZipProject => "exportZipProject",
        }
    }

    /// Build a command from a bus event name and JSON arguments.
    ///
    /// Covers the events that carry plain data; loads, imports, and new
    /// tracks carry buffers and are built directly.
    pub fn from_event(name: &str, args: &Value) -> Option<Command> {
        let command = match name {
            "play" => Command::Play {
                start: num(args, "start"),
                end: num(args, "end"),
            },
            "pause" => Command::Pause,
            "stop" => Command::Stop,
            "rewind" => Command::Rewind,
            "fastforward" => Command::FastForward,
            "record" => Command::Record,
            "seek" | "select" => Command::Seek {
                start: num(args, "start")?,
                end: num(args, "end"),
                track: track_id(args),
            },
            "cut" => Command::Cut,
            "trim" => Command::Trim,
            "split" => Command::Split,
            "razorCut" => Command::RazorCut,
            "shift" => Command::Shift {
                track: track_id(args)?,
                delta: num(args, "delta")?,
            },
            "fadein" => Command::FadeIn {
                track: track_id(args)?,
                duration: num(args, "duration")?,
            },
            "fadeout" => Command::FadeOut {
                track: track_id(args)?,
                duration: num(args, "duration")?,
            },
            "fadetype" => Command::FadeType {
                shape: serde_json::from_value(args.get("shape")?.clone()).ok()?,
            },
            "solo" => Command::Solo {
                track: track_id(args)?,
            },
            "mute" => Command::Mute {
                track: track_id(args)?,
            },
            "volumechange" => Command::VolumeChange {
                track: track_id(args)?,
                volume: num(args, "volume")? as f32,
            },
            "mastervolumechange" => Command::MasterVolumeChange {
                volume: num(args, "volume")? as f32,
            },
            "stereopan" => Command::StereoPan {
                track: track_id(args)?,
                pan: num(args, "pan")? as f32,
            },
            "removeTrack" => Command::RemoveTrack {
                track: track_id(args)?,
            },
            "changeTrackView" => Command::ChangeTrackView {
                track: track_id(args)?,
                collapsed: args.get("collapsed").and_then(Value::as_bool)?,
            },
            "clear" => Command::Clear,
            "zoomin" => Command::ZoomIn,
            "zoomout" => Command::ZoomOut,
            "zoom" => Command::SetZoom {
                samples_per_pixel: args.get("samplesPerPixel").and_then(Value::as_u64)? as usize,
            },
            "statechange" => Command::State {
                mode: serde_json::from_value(args.get("state")?.clone()).ok()?,
            },
            "durationformat" => Command::DurationFormat {
                format: args.get("format").and_then(Value::as_str)?.to_string(),
            },
            "automaticscroll" => Command::AutomaticScroll {
                enabled: args.get("enabled").and_then(Value::as_bool)?,
            },
            "scroll" => Command::Scroll {
                seconds: num(args, "seconds")?,
            },
            "startaudiorendering" => Command::StartAudioRendering {
                format: args
                    .get("format")
                    .cloned()
                    .map(serde_json::from_value::<RenderFormat>)
                    .transpose()
                    .ok()?
                    .unwrap_or_default(),
            },
            "commit" => Command::Commit,
            "undo" => Command::Undo,
            "redo" => Command::Redo,
            "exportZipProject" => Command::ExportZipProject,
            _ => return None,
        };
        Some(command)
    }
}
