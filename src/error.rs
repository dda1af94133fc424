// src/error.rs
//
// Error types for the playlist engine.
//
// Each failure family has its own enum so callers can tell a bad config
// (fatal at construction) from a failed load (reported, engine keeps going).

use thiserror::Error;

use crate::track::TrackId;

/// Invalid construction options. Blocks initialization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("zoom level list is empty")]
    EmptyZoomLevels,

    #[error("samples per pixel {0} is not a usable configured zoom level")]
    InvalidZoom(usize),

    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),

    #[error("malformed options: {0}")]
    Malformed(String),
}

/// Fetch or decode failure for one source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to fetch {source_name}: {reason}")]
    Fetch { source_name: String, reason: String },

    #[error("failed to decode {source_name}: {reason}")]
    Decode { source_name: String, reason: String },

    #[error("unsupported source {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An edit could not be applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("no active track")]
    NoActiveTrack,

    #[error("track {0} not found")]
    UnknownTrack(TrackId),

    #[error("selection is empty")]
    EmptySelection,

    #[error("selection does not overlap track {0}")]
    SelectionOutsideTrack(TrackId),

    #[error("invalid cue window [{cue_in}, {cue_out}] for a {duration}s buffer")]
    InvalidCues {
        cue_in: f64,
        cue_out: f64,
        duration: f64,
    },
}

/// Offline render failure.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("nothing to render")]
    EmptyTimeline,

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error("encoder worker disconnected")]
    WorkerGone,
}

/// Project sync, history, or archive failure.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("no project attached")]
    NoProject,

    #[error("archive has no {0} entry")]
    MissingManifest(&'static str),

    #[error("malformed history: {0}")]
    MalformedHistory(String),

    #[error("media not found: {0}")]
    MediaNotFound(String),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("media encoding error: {0}")]
    Media(String),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Recording could not be started or resumed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("no recorder attached")]
    NoRecorder,

    #[error("cannot record while playing")]
    Busy,
}

/// Any failure of a dispatched command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub type EditResult<T> = Result<T, EditError>;
pub type ProjectResult<T> = Result<T, ProjectError>;
