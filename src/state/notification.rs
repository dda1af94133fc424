// Notifications from the playlist to the host.
//
// The outbound half of the event bus. The playlist pushes these onto the
// channel returned by `create_playlist`; the host drains it on its own loop.

use std::sync::Arc;

use crate::audio_buffer::AudioData;
use crate::state::archive::ProjectArchive;
use crate::state::command::RenderFormat;
use crate::track::TrackId;

/// Result of an offline render.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    /// The rendered mix, for the host to use or encode.
    Buffer(Arc<AudioData>),

    /// Encoded bytes.
    Encoded { mime: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Playhead moved during playback.
    TimeUpdate { playback_seconds: f64 },

    /// Playback reached the selection end or the end of the timeline.
    Finished,

    /// Every source of a load batch decoded.
    AudioSourcesLoaded,

    /// Tracks of a load batch were added.
    AudioSourcesRendered,

    /// A load batch failed; no track was added.
    AudioSourcesError { message: String },

    AudioRenderingStarting,
    AudioRenderingFinished {
        format: RenderFormat,
        output: RenderOutput,
    },
    AudioRenderingFailed { message: String },

    CutFinished,

    /// Selection moved by the playlist itself (rewind, fast-forward).
    Select {
        start: f64,
        end: f64,
        track: Option<TrackId>,
    },

    ZipProjectExported { archive: ProjectArchive },
}

impl Notification {
    /// Event name on the host's bus.
    pub fn name(&self) -> &'static str {
        match self {
            Notification::TimeUpdate { .. } => "timeupdate",
            Notification::Finished => "finished",
            Notification::AudioSourcesLoaded => "audiosourcesloaded",
            Notification::AudioSourcesRendered => "audiosourcesrendered",
            Notification::AudioSourcesError { .. } => "audiosourceserror",
            Notification::AudioRenderingStarting => "audiorenderingstarting",
            Notification::AudioRenderingFinished { .. } => "audiorenderingfinished",
            Notification::AudioRenderingFailed { .. } => "audiorenderingfailed",
            Notification::CutFinished => "cutfinished",
            Notification::Select { .. } => "select",
            Notification::ZipProjectExported { .. } => "zipProjectExported",
        }
    }
}
