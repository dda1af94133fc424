// src/playlist/dispatch.rs
//
// Inbound event bus: applies host commands and pointer input.

use log::{debug, warn};

use crate::error::CommandError;
use crate::gesture::{Gesture, PointerEvent};
use crate::state::Command;
use crate::track::TrackId;

use super::Playlist;

impl Playlist {
    /// Apply one command from the host. Failures are logged and returned;
    /// the playlist stays usable either way.
    pub fn dispatch(&mut self, command: Command) -> Result<(), CommandError> {
        let name = command.name();
        debug!("dispatch {}", name);
        let result = self.apply(command);
        if let Err(e) = &result {
            warn!("{} failed: {}", name, e);
        }
        result
    }

    fn apply(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Play { start, end } => {
                self.play(start, end);
            }
            Command::Pause => self.pause(),
            Command::Stop => self.stop(),
            Command::Rewind => self.rewind(),
            Command::FastForward => self.fast_forward(),
            Command::Record => self.record()?,
            Command::Seek { start, end, track } => self.seek(start, end, track),

            Command::Cut => self.cut()?,
            Command::Trim => self.trim()?,
            Command::Split => {
                self.split()?;
            }
            Command::RazorCut => self.razor_cut()?,
            Command::Shift { track, delta } => self.shift_track(track, delta)?,
            Command::FadeIn { track, duration } => self.set_fade_in(track, duration)?,
            Command::FadeOut { track, duration } => self.set_fade_out(track, duration)?,
            Command::FadeType { shape } => self.set_fade_type(shape),

            Command::Solo { track } => self.solo_track(track)?,
            Command::Mute { track } => self.mute_track(track)?,
            Command::VolumeChange { track, volume } => self.set_volume(track, volume)?,
            Command::MasterVolumeChange { volume } => self.set_master_volume(volume),
            Command::StereoPan { track, pan } => self.set_stereo_pan(track, pan)?,

            Command::Load { sources } => {
                self.load(sources)?;
            }
            Command::NewTrack { spec } => {
                self.load(vec![*spec])?;
            }
            Command::RemoveTrack { track } => {
                self.remove_track(track)?;
            }
            Command::ChangeTrackView { track, collapsed } => self.collapse_track(track, collapsed)?,
            Command::Clear => self.clear(),

            Command::ZoomIn => {
                self.zoom_in();
            }
            Command::ZoomOut => {
                self.zoom_out();
            }
            Command::SetZoom { samples_per_pixel } => self.set_zoom(samples_per_pixel)?,
            Command::State { mode } => self.set_state(mode),
            Command::DurationFormat { format } => self.set_duration_format(format),
            Command::AutomaticScroll { enabled } => self.set_automatic_scroll(enabled),
            Command::Scroll { seconds } => self.scroll_to(seconds),

            Command::StartAudioRendering { format } => {
                self.start_offline_render(format)?;
            }
            Command::Commit => self.commit()?,
            Command::Undo => self.undo()?,
            Command::Redo => self.redo()?,
            Command::ImportZipProject { archive } => {
                self.import_project(&archive)?;
            }
            Command::ExportZipProject => {
                self.export_project()?;
            }
        }
        Ok(())
    }

    /// Feed pointer input to a track's gesture machine and apply whatever
    /// it produces. Returns the applied command.
    pub fn handle_pointer(&mut self, track: TrackId, event: PointerEvent) -> Option<Command> {
        let scale = self.scale();
        let gesture = self.track_mut(track).ok()?.handle_pointer(event, scale)?;
        let command = match gesture {
            Gesture::Select { start, end } => Command::Seek {
                start,
                end: Some(end),
                track: Some(track),
            },
            Gesture::Shift { delta } => Command::Shift { track, delta },
            Gesture::FadeIn { duration } => Command::FadeIn { track, duration },
            Gesture::FadeOut { duration } => Command::FadeOut { track, duration },
        };
        // failures are already logged by dispatch
        let _ = self.dispatch(command.clone());
        Some(command)
    }
}
