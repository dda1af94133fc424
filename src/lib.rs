// src/lib.rs
//
// Library entry point: a multitrack timeline engine for waveform editors.

mod audio_buffer;
mod clock;
mod effects;
mod error;
mod fade;
mod gesture;
mod loader;
mod peaks;
mod playlist;
mod playout;
mod recorder;
mod render_tree;
mod state;
mod track;
mod transport;
mod worker;

#[cfg(feature = "web")]
mod wasm;

#[cfg(test)]
mod test;

// Re-export key types for Rust consumers
pub use audio_buffer::AudioData;
pub use clock::{AudioContext, ClockHandle, ContextKind};
pub use effects::{DelayEffect, Effect, EffectChain, GainEffect, LowPassEffect};
pub use error::{
    CommandError, ConfigError, EditError, LoadError, ProjectError, RecordError, RenderError,
};
pub use fade::{Fade, FadeEdge, FadeShape};
pub use gesture::{EnabledStates, Gesture, InteractionMode, PointerEvent};
pub use loader::{FadeSpec, Loader, MemoryLoader, TrackSource, TrackSpec, WavLoader, decode_wav};
pub use peaks::{Peak, Peaks};
pub use playlist::{PlayHandle, Playlist, PlaylistInfo, create_playlist};
pub use recorder::{HostRecorder, MediaRecorder, RecorderEvent, RecorderFeed, RecorderState};
pub use render_tree::{RenderTree, format_time};
pub use state::{
    Annotation, AnnotationOptions, Clip, ClipEffect, Colors, Command, Controls, History,
    MemoryProject, Notification, PlaylistConfig, ProjectArchive, ProjectManifest, ProjectTrack,
    RenderFormat, RenderOutput, SeekStyle, SharedProject, VersionedProject,
};
pub use track::{Track, TrackId, TrackInfo};
pub use transport::TimeSelection;
pub use worker::encode_wav;
