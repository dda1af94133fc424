// src/playlist/edit.rs
//
// Track edits, mix controls and view settings.
//
// Content edits work on the active track and the current selection. Each one
// recomputes peaks for the tracks it touched and the overall duration.

use log::{debug, info, warn};

use crate::error::{ConfigError, EditError, EditResult};
use crate::fade::{FadeEdge, FadeShape};
use crate::gesture::InteractionMode;
use crate::state::Notification;
use crate::track::{Track, TrackId};
use crate::transport::TimeSelection;

use super::Playlist;

impl Playlist {
    fn edit_target(&self) -> EditResult<(TrackId, TimeSelection)> {
        let id = self.active_track.ok_or(EditError::NoActiveTrack)?;
        Ok((id, self.selection))
    }

    fn refresh_peaks(&mut self, id: TrackId) -> EditResult<()> {
        let (spp, mono) = (self.samples_per_pixel, self.config.mono);
        self.track_mut(id)?.calculate_peaks(spp, mono);
        Ok(())
    }

    // -------------------------------
    // MARK: Content edits
    // -------------------------------

    /// Remove the selected material from the active track.
    pub fn cut(&mut self) -> EditResult<()> {
        let (id, selection) = self.edit_target()?;
        if !selection.is_segment() {
            return Err(EditError::EmptySelection);
        }
        self.track_mut(id)?.remove_part(selection.start, selection.end)?;
        self.refresh_peaks(id)?;
        self.set_time_selection(0.0, 0.0);
        self.adjust_duration();
        info!("cut {:.3}..{:.3} from track {}", selection.start, selection.end, id);
        self.emit(Notification::CutFinished);
        Ok(())
    }

    /// Re-bound the active track to the selection.
    pub fn trim(&mut self) -> EditResult<()> {
        let (id, selection) = self.edit_target()?;
        if !selection.is_segment() {
            return Err(EditError::EmptySelection);
        }
        self.track_mut(id)?.trim(selection.start, selection.end)?;
        self.refresh_peaks(id)?;
        self.set_time_selection(0.0, 0.0);
        self.adjust_duration();
        Ok(())
    }

    /// Mark a split on the active track at the selection start.
    pub fn razor_cut(&mut self) -> EditResult<()> {
        let (id, selection) = self.edit_target()?;
        self.track_mut(id)?.razor_cut(selection.start)?;
        self.refresh_peaks(id)?;
        self.adjust_duration();
        Ok(())
    }

    /// Split the active track at the selection start. The new track holds
    /// the material after the split and is returned.
    pub fn split(&mut self) -> EditResult<TrackId> {
        let (id, selection) = self.edit_target()?;
        let new_id = self.next_track_id;
        let master_gain = self.master_gain;

        let track = self.track_mut(id)?;
        let name = format!("{}_1", track.name());
        let mut tail = track.split_off(selection.start, new_id, name)?;
        self.next_track_id += 1;
        tail.set_master_gain_level(master_gain);

        if self.muted.contains(&id) {
            self.muted.insert(new_id);
        }
        if self.soloed.contains(&id) {
            self.soloed.insert(new_id);
        }
        self.tracks.push(tail);
        self.active_track = Some(new_id);
        self.apply_should_play();

        self.refresh_peaks(id)?;
        self.refresh_peaks(new_id)?;
        self.adjust_duration();
        info!("split track {} at {:.3} into {}", id, selection.start, new_id);
        Ok(new_id)
    }

    /// Move a track along the timeline.
    pub fn shift_track(&mut self, id: TrackId, delta: f64) -> EditResult<()> {
        self.track_mut(id)?.shift(delta);
        self.adjust_duration();
        Ok(())
    }

    pub fn set_fade_in(&mut self, id: TrackId, duration: f64) -> EditResult<()> {
        let shape = self.fade_type;
        self.track_mut(id)?.set_fade(FadeEdge::In, duration, shape);
        Ok(())
    }

    pub fn set_fade_out(&mut self, id: TrackId, duration: f64) -> EditResult<()> {
        let shape = self.fade_type;
        self.track_mut(id)?.set_fade(FadeEdge::Out, duration, shape);
        Ok(())
    }

    /// Shape used by fades created from now on.
    pub fn set_fade_type(&mut self, shape: FadeShape) {
        self.fade_type = shape;
    }

    // -------------------------------
    // MARK: Mix
    // -------------------------------

    /// Toggle solo. In exclusive mode soloing replaces the solo set.
    pub fn solo_track(&mut self, id: TrackId) -> EditResult<()> {
        self.track_mut(id)?;
        if !self.soloed.remove(&id) {
            if self.config.excl_solo {
                self.soloed.clear();
            }
            self.soloed.insert(id);
        }
        self.apply_should_play();
        Ok(())
    }

    pub fn mute_track(&mut self, id: TrackId) -> EditResult<()> {
        self.track_mut(id)?;
        if !self.muted.remove(&id) {
            self.muted.insert(id);
        }
        self.apply_should_play();
        Ok(())
    }

    /// Track volume, 0..100.
    pub fn set_volume(&mut self, id: TrackId, volume: f32) -> EditResult<()> {
        self.track_mut(id)?.set_gain_level(volume / 100.0);
        Ok(())
    }

    /// Master volume, 0..100, pushed to every playout.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_gain = (volume / 100.0).max(0.0);
        let gain = self.master_gain;
        for track in &mut self.tracks {
            track.set_master_gain_level(gain);
        }
    }

    pub fn set_stereo_pan(&mut self, id: TrackId, pan: f32) -> EditResult<()> {
        self.track_mut(id)?.set_stereo_pan_value(pan);
        Ok(())
    }

    // -------------------------------
    // MARK: Collection
    // -------------------------------

    /// Stop and drop a track, purging it from every membership set.
    pub fn remove_track(&mut self, id: TrackId) -> EditResult<Track> {
        let index = self
            .tracks
            .iter()
            .position(|t| t.id() == id)
            .ok_or(EditError::UnknownTrack(id))?;
        let mut track = self.tracks.remove(index);
        track.schedule_stop();

        self.muted.remove(&id);
        self.soloed.remove(&id);
        self.collapsed.remove(&id);
        if self.active_track == Some(id) {
            self.active_track = None;
        }
        if self.recording_track == Some(id) {
            self.recording_track = None;
        }

        self.adjust_duration();
        self.apply_should_play();
        info!("removed track {}", id);
        Ok(track)
    }

    pub fn collapse_track(&mut self, id: TrackId, collapsed: bool) -> EditResult<()> {
        self.track_mut(id)?;
        if collapsed {
            self.collapsed.insert(id);
        } else {
            self.collapsed.remove(&id);
        }
        Ok(())
    }

    /// Stop and drop every track, resetting the view.
    pub fn clear(&mut self) {
        self.stop();
        self.tracks.clear();
        self.muted.clear();
        self.soloed.clear();
        self.collapsed.clear();
        self.active_track = None;
        self.recording_track = None;
        self.tickets.clear();
        self.transport.cursor = 0.0;
        self.transport.playback_seconds = 0.0;
        self.duration = 0.0;
        self.scroll_left = 0.0;
        self.seek(0.0, Some(0.0), None);
        info!("playlist cleared");
    }

    // -------------------------------
    // MARK: View
    // -------------------------------

    /// Change resolution. Levels outside the configured list are rejected
    /// and the current zoom is kept.
    pub fn set_zoom(&mut self, samples_per_pixel: usize) -> Result<(), ConfigError> {
        if self.config.zoom_index(samples_per_pixel).is_none() {
            warn!("zoom {} is not a configured level", samples_per_pixel);
            return Err(ConfigError::InvalidZoom(samples_per_pixel));
        }
        self.samples_per_pixel = samples_per_pixel;
        let mono = self.config.mono;
        for track in &mut self.tracks {
            track.calculate_peaks(samples_per_pixel, mono);
        }
        debug!("zoom set to {} samples per pixel", samples_per_pixel);
        Ok(())
    }

    /// Step to the next finer zoom level. Returns whether the zoom changed.
    pub fn zoom_in(&mut self) -> bool {
        let index = self.config.zoom_index(self.samples_per_pixel).unwrap_or(0);
        self.step_zoom(index.saturating_sub(1))
    }

    /// Step to the next coarser zoom level. Returns whether the zoom changed.
    pub fn zoom_out(&mut self) -> bool {
        let index = self.config.zoom_index(self.samples_per_pixel).unwrap_or(0);
        let last = self.config.zoom_levels.len().saturating_sub(1);
        self.step_zoom((index + 1).min(last))
    }

    fn step_zoom(&mut self, index: usize) -> bool {
        match self.config.zoom_levels.get(index).copied() {
            Some(zoom) if zoom != self.samples_per_pixel => self.set_zoom(zoom).is_ok(),
            _ => false,
        }
    }

    /// Switch the interaction mode of the playlist and every track.
    pub fn set_state(&mut self, mode: InteractionMode) {
        self.mode = mode;
        self.restore_track_states();
    }

    pub fn set_duration_format(&mut self, format: impl Into<String>) {
        self.duration_format = format.into();
    }

    pub fn set_automatic_scroll(&mut self, enabled: bool) {
        self.is_automatic_scroll = enabled;
    }

    /// Scroll the view to `seconds`.
    pub fn scroll_to(&mut self, seconds: f64) {
        self.scroll_left = seconds.max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::loader::TrackSpec;

    fn three() -> (Playlist, Vec<TrackId>) {
        let (mut playlist, _rx, _clock) = playlist();
        let ids = playlist
            .load(vec![
                TrackSpec::url("a.wav"),
                TrackSpec::url("b.wav"),
                TrackSpec::url("c.wav"),
            ])
            .unwrap();
        (playlist, ids)
    }

    #[test]
    fn test_solo_mute_resolution() {
        let (mut playlist, ids) = three();
        let (a, b, c) = (ids[0], ids[1], ids[2]);

        playlist.solo_track(b).unwrap();
        let audible: Vec<bool> = ids.iter().map(|id| playlist.should_track_play(*id)).collect();
        assert_eq!(audible, vec![false, true, false]);

        playlist.solo_track(a).unwrap();
        assert!(playlist.should_track_play(a));
        assert!(playlist.should_track_play(b));
        assert!(!playlist.should_track_play(c));

        playlist.solo_track(a).unwrap();
        playlist.solo_track(b).unwrap();
        playlist.mute_track(c).unwrap();
        assert!(playlist.should_track_play(a));
        assert!(playlist.should_track_play(b));
        assert!(!playlist.should_track_play(c));
    }

    #[test]
    fn test_exclusive_solo_replaces_set() {
        let (mut playlist, ids) = three();
        playlist.config.excl_solo = true;
        playlist.solo_track(ids[0]).unwrap();
        playlist.solo_track(ids[1]).unwrap();
        assert!(!playlist.is_soloed(ids[0]));
        assert!(playlist.is_soloed(ids[1]));
    }

    #[test]
    fn test_mute_gates_live_playout() {
        let (mut playlist, ids) = three();
        playlist.mute_track(ids[1]).unwrap();
        assert!(!playlist.track(ids[1]).unwrap().playout().unwrap().should_play());
        playlist.mute_track(ids[1]).unwrap();
        assert!(playlist.track(ids[1]).unwrap().playout().unwrap().should_play());
    }

    #[test]
    fn test_remove_track_purges_sets() {
        let (mut playlist, ids) = three();
        let b = ids[1];
        playlist.mute_track(b).unwrap();
        playlist.solo_track(b).unwrap();
        playlist.collapse_track(b, true).unwrap();
        playlist.seek(0.0, None, Some(b));

        playlist.remove_track(b).unwrap();
        assert!(!playlist.is_muted(b) && !playlist.is_soloed(b) && !playlist.is_collapsed(b));
        assert_eq!(playlist.active_track(), None);
        assert_eq!(playlist.tracks().len(), 2);

        // only muted before removal
        let c = ids[2];
        playlist.mute_track(c).unwrap();
        playlist.remove_track(c).unwrap();
        assert_eq!(playlist.duration(), 10.0);
        assert_eq!(playlist.remove_track(c).unwrap_err(), EditError::UnknownTrack(c));
    }

    #[test]
    fn test_remove_playing_track_stops_it() {
        let (mut playlist, ids) = three();
        playlist.play(None, None);
        let track = playlist.remove_track(ids[0]).unwrap();
        assert!(!track.is_playing());
        assert_eq!(playlist.duration(), 5.0);
    }

    #[test]
    fn test_zoom_outside_levels_keeps_prior() {
        let (mut playlist, ids) = three();
        assert_eq!(playlist.set_zoom(7), Err(ConfigError::InvalidZoom(7)));
        assert_eq!(playlist.samples_per_pixel(), 10);

        playlist.set_zoom(20).unwrap();
        assert_eq!(playlist.track(ids[0]).unwrap().peaks().length, 50);
    }

    #[test]
    fn test_zoom_steps_clamp_at_ends() {
        let (mut playlist, _ids) = three();
        assert!(playlist.zoom_in());
        assert_eq!(playlist.samples_per_pixel(), 5);
        assert!(!playlist.zoom_in());
        assert!(playlist.zoom_out());
        assert!(playlist.zoom_out());
        assert_eq!(playlist.samples_per_pixel(), 20);
        assert!(!playlist.zoom_out());
    }

    #[test]
    fn test_edits_need_active_track_and_selection() {
        let (mut playlist, ids) = three();
        assert_eq!(playlist.cut(), Err(EditError::NoActiveTrack));
        playlist.seek(1.0, None, Some(ids[0]));
        assert_eq!(playlist.cut(), Err(EditError::EmptySelection));
        assert_eq!(playlist.trim(), Err(EditError::EmptySelection));
    }

    #[test]
    fn test_cut_shortens_and_notifies() {
        let (mut playlist, rx, _clock) = playlist();
        let id = playlist.load(vec![TrackSpec::url("a.wav")]).unwrap()[0];
        playlist.seek(2.0, Some(5.0), Some(id));
        drain(&rx);

        playlist.cut().unwrap();
        let track = playlist.track(id).unwrap();
        assert!((track.duration() - 7.0).abs() < 1e-9);
        assert_eq!(track.peaks().length, 70);
        assert!((playlist.duration() - 7.0).abs() < 1e-9);
        assert!(!playlist.selection().is_segment());
        assert_eq!(names(&rx), vec!["cutfinished"]);
    }

    #[test]
    fn test_trim_rebounds_to_selection() {
        let (mut playlist, ids) = three();
        playlist.seek(1.0, Some(4.0), Some(ids[0]));
        playlist.trim().unwrap();

        let track = playlist.track(ids[0]).unwrap();
        assert_eq!(track.start_time(), 1.0);
        assert_eq!(track.end_time(), 4.0);
        assert_eq!(track.peaks().length, 30);
        assert_eq!(playlist.duration(), 5.0);
    }

    #[test]
    fn test_split_copies_membership_and_partitions() {
        let (mut playlist, ids) = three();
        let a = ids[0];
        playlist.mute_track(a).unwrap();
        playlist.set_fade_out(a, 1.0).unwrap();
        playlist.seek(4.0, None, Some(a));

        let tail = playlist.split().unwrap();
        let head = playlist.track(a).unwrap();
        let new = playlist.track(tail).unwrap();
        assert_eq!(head.end_time(), 4.0);
        assert_eq!(new.start_time(), 4.0);
        assert_eq!(new.name(), "Untitled_1");
        assert_eq!(head.duration() + new.duration(), 10.0);
        assert!(head.fade(FadeEdge::Out).is_none());
        assert!(new.fade(FadeEdge::Out).is_some());
        assert_eq!(head.peaks().length, 40);
        assert_eq!(new.peaks().length, 60);
        assert!(playlist.is_muted(tail));
        assert!(!playlist.should_track_play(tail));
    }

    #[test]
    fn test_split_appends_and_activates_new_track() {
        let (mut playlist, ids) = three();
        playlist.seek(4.0, None, Some(ids[0]));
        let tail = playlist.split().unwrap();

        let order: Vec<TrackId> = playlist.tracks().iter().map(|t| t.id()).collect();
        assert_eq!(order, vec![ids[0], ids[1], ids[2], tail]);
        assert_eq!(playlist.active_track(), Some(tail));
    }

    #[test]
    fn test_razor_cut_keeps_duration() {
        let (mut playlist, ids) = three();
        playlist.seek(3.0, None, Some(ids[0]));
        playlist.razor_cut().unwrap();
        assert_eq!(playlist.track(ids[0]).unwrap().razor_marks(), &[3.0]);
        assert_eq!(playlist.duration(), 10.0);
    }

    #[test]
    fn test_fades_use_current_fade_type() {
        let (mut playlist, ids) = three();
        playlist.set_fade_type(FadeShape::Linear);
        playlist.set_fade_in(ids[0], 1.5).unwrap();
        playlist.set_fade_in(ids[0], 2.0).unwrap();
        let track = playlist.track(ids[0]).unwrap();
        assert_eq!(track.fades().len(), 1);
        assert_eq!(
            track.fade(FadeEdge::In).map(|f| (f.duration, f.shape)),
            Some((2.0, FadeShape::Linear))
        );
    }

    #[test]
    fn test_volume_and_master_volume() {
        let (mut playlist, ids) = three();
        playlist.set_volume(ids[0], 50.0).unwrap();
        assert_eq!(playlist.track(ids[0]).unwrap().gain(), 0.5);
        playlist.set_master_volume(80.0);
        assert!((playlist.master_gain() - 0.8).abs() < 1e-6);
        assert_eq!(playlist.set_volume(99, 10.0), Err(EditError::UnknownTrack(99)));
    }

    #[test]
    fn test_shift_moves_track_and_duration() {
        let (mut playlist, ids) = three();
        playlist.shift_track(ids[2], 9.0).unwrap();
        assert_eq!(playlist.duration(), 12.0);
        playlist.shift_track(ids[2], -20.0).unwrap();
        assert_eq!(playlist.track(ids[2]).unwrap().start_time(), 0.0);
    }

    #[test]
    fn test_state_reaches_every_track() {
        let (mut playlist, _ids) = three();
        playlist.set_state(InteractionMode::Shift);
        assert!(playlist.tracks().iter().all(|t| t.state() == InteractionMode::Shift));
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut playlist, ids) = three();
        playlist.mute_track(ids[0]).unwrap();
        playlist.seek(2.0, Some(3.0), Some(ids[0]));
        playlist.clear();

        assert!(playlist.tracks().is_empty());
        assert!(!playlist.is_muted(ids[0]));
        assert_eq!(playlist.duration(), 0.0);
        assert_eq!(playlist.cursor(), 0.0);
        assert!(!playlist.selection().is_segment());
    }
}
