// src/track.rs
//
// The edit unit of the playlist.
//
// A Track is a window (cue in/out) onto a shared decoded buffer, placed at
// `start_time` on the timeline, plus the edit attributes applied on top of it.
// It owns the Playout that turns those attributes into sound. Edits never
// mutate a buffer in place; content edits build a new buffer and rebind the
// playout to it.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::audio_buffer::AudioData;
use crate::clock::seconds_to_frames;
use crate::effects::EffectChain;
use crate::error::{EditError, EditResult};
use crate::fade::{Fade, FadeEdge, FadeShape};
use crate::gesture::{
    EnabledStates, Gesture, InteractionMode, PixelScale, PointerEvent, TrackGesture, TrackSpan,
};
use crate::loader::TrackSource;
use crate::peaks::{Peaks, extract_peaks};
use crate::playout::{CueWindow, Playout, PlayoutTicket};

/// Unique identifier for a track within a playlist.
pub type TrackId = u32;

/// Slack allowed when validating cue points against the buffer length.
const CUE_EPSILON: f64 = 1e-9;

/// Per-call options for `Track::schedule_play`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayOptions {
    /// When false the track is scheduled but gated to silence.
    pub should_play: bool,
    pub master_gain: f32,
    /// Schedule on the offline playout instead of the live one.
    pub is_offline: bool,
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            should_play: true,
            master_gain: 1.0,
            is_offline: false,
        }
    }
}

/// Snapshot of a track for hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: TrackId,
    pub name: String,
    pub start: f64,
    pub end: f64,
    pub cue_in: f64,
    pub cue_out: f64,
    pub gain: f32,
    pub stereo_pan: f32,
    pub fades: Vec<Fade>,
    pub muted: bool,
    pub soloed: bool,
}

#[derive(Debug)]
pub struct Track {
    id: TrackId,
    name: String,
    source: TrackSource,
    buffer: Arc<AudioData>,

    cue_in: f64,
    cue_out: f64,
    start_time: f64,

    /// At most one fade per edge.
    fades: Vec<Fade>,
    gain: f32,
    stereo_pan: f32,
    effects: EffectChain,

    pub custom_class: Option<String>,
    pub wave_outline_color: Option<String>,

    peaks: Peaks,

    /// Razor split points, in buffer seconds, sorted.
    razor_marks: Vec<f64>,

    enabled_states: EnabledStates,
    state: InteractionMode,
    gesture: TrackGesture,

    playout: Option<Playout>,
    offline_playout: Option<Playout>,
}

impl Track {
    /// A track covering the whole buffer, starting at 0.
    pub fn new(
        id: TrackId,
        name: impl Into<String>,
        source: TrackSource,
        buffer: Arc<AudioData>,
    ) -> Self {
        let cue_out = buffer.duration();
        Self {
            id,
            name: name.into(),
            source,
            buffer,
            cue_in: 0.0,
            cue_out,
            start_time: 0.0,
            fades: Vec::new(),
            gain: 1.0,
            stereo_pan: 0.0,
            effects: EffectChain::new(),
            custom_class: None,
            wave_outline_color: None,
            peaks: Peaks::default(),
            razor_marks: Vec::new(),
            enabled_states: EnabledStates::default(),
            state: InteractionMode::Cursor,
            gesture: TrackGesture::for_mode(InteractionMode::Cursor),
            playout: None,
            offline_playout: None,
        }
    }

    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn source(&self) -> &TrackSource {
        &self.source
    }

    /// Repoint the track at another copy of the same media.
    pub fn set_source(&mut self, source: TrackSource) {
        self.source = source;
    }

    pub fn buffer(&self) -> &Arc<AudioData> {
        &self.buffer
    }

    #[inline]
    pub fn cue_in(&self) -> f64 {
        self.cue_in
    }

    #[inline]
    pub fn cue_out(&self) -> f64 {
        self.cue_out
    }

    /// Length of the audible window.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.cue_out - self.cue_in
    }

    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    #[inline]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration()
    }

    pub fn fades(&self) -> &[Fade] {
        &self.fades
    }

    pub fn fade(&self, edge: FadeEdge) -> Option<&Fade> {
        self.fades.iter().find(|f| f.edge == edge)
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn stereo_pan(&self) -> f32 {
        self.stereo_pan
    }

    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    pub fn peaks(&self) -> &Peaks {
        &self.peaks
    }

    pub fn razor_marks(&self) -> &[f64] {
        &self.razor_marks
    }

    pub fn state(&self) -> InteractionMode {
        self.state
    }

    pub fn enabled_states(&self) -> EnabledStates {
        self.enabled_states
    }

    pub fn playout(&self) -> Option<&Playout> {
        self.playout.as_ref()
    }

    pub fn playout_mut(&mut self) -> Option<&mut Playout> {
        self.playout.as_mut()
    }

    pub fn offline_playout_mut(&mut self) -> Option<&mut Playout> {
        self.offline_playout.as_mut()
    }

    pub fn is_playing(&self) -> bool {
        self.playout.as_ref().is_some_and(Playout::is_playing)
    }

    pub fn info(&self, muted: bool, soloed: bool) -> TrackInfo {
        TrackInfo {
            id: self.id,
            name: self.name.clone(),
            start: self.start_time,
            end: self.end_time(),
            cue_in: self.cue_in,
            cue_out: self.cue_out,
            gain: self.gain,
            stereo_pan: self.stereo_pan,
            fades: self.fades.clone(),
            muted,
            soloed,
        }
    }

    // -------------------------------
    // MARK: Timing
    // -------------------------------

    pub fn set_start_time(&mut self, start: f64) {
        self.start_time = start.max(0.0);
    }

    /// Move the track by `delta` seconds. Never moves before 0.
    pub fn shift(&mut self, delta: f64) {
        self.set_start_time(self.start_time + delta);
    }

    /// Set the audible window. Requires `0 <= cue_in < cue_out <= duration`.
    pub fn set_cues(&mut self, cue_in: f64, cue_out: f64) -> EditResult<()> {
        let duration = self.buffer.duration();
        if cue_in < -CUE_EPSILON || cue_out <= cue_in || cue_out > duration + CUE_EPSILON {
            return Err(EditError::InvalidCues {
                cue_in,
                cue_out,
                duration,
            });
        }
        self.cue_in = cue_in.max(0.0);
        self.cue_out = cue_out.min(duration);
        Ok(())
    }

    // -------------------------------
    // MARK: Edit attributes
    // -------------------------------

    /// Set the fade on one edge, replacing any existing one.
    pub fn set_fade(&mut self, edge: FadeEdge, duration: f64, shape: FadeShape) {
        self.fades.retain(|f| f.edge != edge);
        if duration > 0.0 {
            self.fades.push(Fade {
                edge,
                duration: duration.min(self.duration()),
                shape,
            });
        }
        self.sync_fades();
    }

    pub fn set_fade_in(&mut self, duration: f64, shape: FadeShape) {
        self.set_fade(FadeEdge::In, duration, shape);
    }

    pub fn set_fade_out(&mut self, duration: f64, shape: FadeShape) {
        self.set_fade(FadeEdge::Out, duration, shape);
    }

    pub fn remove_fade(&mut self, edge: FadeEdge) {
        self.fades.retain(|f| f.edge != edge);
        self.sync_fades();
    }

    fn sync_fades(&mut self) {
        if let Some(p) = self.playout.as_mut() {
            p.set_fades(&self.fades);
        }
    }

    pub fn set_gain_level(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
        if let Some(p) = self.playout.as_mut() {
            p.set_volume_gain_level(self.gain);
        }
    }

    pub fn set_stereo_pan_value(&mut self, pan: f32) {
        self.stereo_pan = pan.clamp(-1.0, 1.0);
        if let Some(p) = self.playout.as_mut() {
            p.set_stereo_pan_value(self.stereo_pan);
        }
    }

    /// Push a master gain to the live playout.
    pub fn set_master_gain_level(&mut self, gain: f32) {
        if let Some(p) = self.playout.as_mut() {
            p.set_master_gain_level(gain);
        }
    }

    pub fn set_should_play(&mut self, should_play: bool) {
        if let Some(p) = self.playout.as_mut() {
            p.set_should_play(should_play);
        }
    }

    pub fn set_effects(&mut self, effects: EffectChain) {
        if let Some(p) = self.playout.as_mut() {
            p.set_effects(effects.clone());
        }
        self.effects = effects;
    }

    pub fn set_enabled_states(&mut self, states: EnabledStates) {
        self.enabled_states = states;
        self.set_state(self.state);
    }

    /// Switch interaction mode. A disabled mode puts the track in `None`.
    pub fn set_state(&mut self, mode: InteractionMode) {
        let mode = if self.enabled_states.allows(mode) {
            mode
        } else {
            InteractionMode::None
        };
        if mode != self.state || !matches_mode(&self.gesture, mode) {
            self.gesture = TrackGesture::for_mode(mode);
        }
        self.state = mode;
    }

    /// Feed a pointer event to the current mode's gesture machine.
    pub fn handle_pointer(&mut self, event: PointerEvent, scale: PixelScale) -> Option<Gesture> {
        let span = TrackSpan {
            start: self.start_time,
            end: self.end_time(),
        };
        self.gesture.handle(event, scale, span)
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture.is_active()
    }

    // -------------------------------
    // MARK: Peaks
    // -------------------------------

    /// Recompute the envelope of the cue window. Touches nothing but peaks.
    pub fn calculate_peaks(&mut self, samples_per_pixel: usize, mono: bool) {
        let sr = self.buffer.sample_rate();
        self.peaks = extract_peaks(
            &self.buffer,
            samples_per_pixel,
            mono,
            seconds_to_frames(self.cue_in, sr),
            seconds_to_frames(self.cue_out, sr),
        );
    }

    pub fn set_peaks(&mut self, peaks: Peaks) {
        self.peaks = peaks;
    }

    // -------------------------------
    // MARK: Playout
    // -------------------------------

    fn configure(&self, playout: &mut Playout) {
        playout.set_volume_gain_level(self.gain);
        playout.set_stereo_pan_value(self.stereo_pan);
        playout.set_fades(&self.fades);
        playout.set_effects(self.effects.clone());
    }

    /// Bind a live playout. Any previous one is stopped first.
    pub fn set_playout(&mut self, mut playout: Playout) {
        self.configure(&mut playout);
        if let Some(old) = self.playout.as_mut() {
            let now = old.context().current_time();
            old.stop(now);
        }
        self.playout = Some(playout);
    }

    /// Bind a playout for an offline render.
    pub fn set_offline_playout(&mut self, mut playout: Playout) {
        self.configure(&mut playout);
        self.offline_playout = Some(playout);
    }

    pub fn take_offline_playout(&mut self) -> Option<Playout> {
        self.offline_playout.take()
    }

    /// Rebind the live playout to the current buffer, keeping its context.
    fn rebuild_playout(&mut self) {
        if let Some(old) = self.playout.take() {
            let playout = Playout::new(old.context().clone(), Arc::clone(&self.buffer));
            self.set_playout(playout);
        }
    }

    /// Replace the buffer. Cues are reset to cover it.
    pub fn set_buffer(&mut self, buffer: Arc<AudioData>) {
        self.cue_in = 0.0;
        self.cue_out = buffer.duration();
        self.source = TrackSource::Buffer(Arc::clone(&buffer));
        self.buffer = buffer;
        self.razor_marks.clear();
        self.rebuild_playout();
    }

    /// Schedule playback of the timeline range `[start, end)` at clock time
    /// `now`, clamped to the cue window.
    ///
    /// A track outside the range gets a ticket that is already settled.
    /// Returns `None` when no playout is bound.
    pub fn schedule_play(
        &mut self,
        now: f64,
        start: f64,
        end: Option<f64>,
        options: PlayOptions,
    ) -> Option<PlayoutTicket> {
        let segment = end.filter(|e| *e > start).map(|e| e - start);
        let track_start = self.start_time;
        let track_end = self.end_time();
        let track_duration = self.duration();
        let window = CueWindow {
            cue_in: self.cue_in,
            cue_out: self.cue_out,
        };
        let (gain, pan) = (self.gain, self.stereo_pan);

        let playout = if options.is_offline {
            self.offline_playout.as_mut()
        } else {
            self.playout.as_mut()
        }?;

        if track_end <= start || segment.is_some_and(|seg| start + seg < track_start) {
            return Some(PlayoutTicket {
                context: playout.context().id(),
                ends_at: now,
            });
        }

        let mut when = now;
        let (offset, duration) = if track_start >= start {
            when += track_start - start;
            let duration = match segment {
                Some(seg) => (seg - (track_start - start)).min(track_duration),
                None => track_duration,
            };
            (0.0, duration)
        } else {
            let offset = start - track_start;
            let duration = match segment {
                Some(seg) => seg.min(track_duration - offset),
                None => track_duration - offset,
            };
            (offset, duration)
        };

        debug!(
            "track {} play at {:.3} offset {:.3} for {:.3}s",
            self.id,
            when,
            offset + window.cue_in,
            duration
        );

        playout.set_volume_gain_level(gain);
        playout.set_should_play(options.should_play);
        playout.set_master_gain_level(options.master_gain);
        playout.set_stereo_pan_value(pan);
        Some(playout.play(when, offset + window.cue_in, duration, window))
    }

    /// Stop the live playout now. Safe when nothing is playing.
    pub fn schedule_stop(&mut self) {
        if let Some(p) = self.playout.as_mut() {
            let now = p.context().current_time();
            p.stop(now);
        }
    }

    // -------------------------------
    // MARK: Content edits
    // -------------------------------

    /// Buffer time for a timeline time.
    #[inline]
    fn to_buffer_time(&self, t: f64) -> f64 {
        t - self.start_time + self.cue_in
    }

    /// Re-bound the cue window to the timeline range `[start, end]`.
    pub fn trim(&mut self, start: f64, end: f64) -> EditResult<()> {
        let track_start = self.start_time;
        let track_end = self.end_time();
        if start >= track_end || end <= track_start {
            return Err(EditError::SelectionOutsideTrack(self.id));
        }

        let offset = self.cue_in - track_start;
        let cue_in = start.max(track_start);
        let cue_out = end.min(track_end);
        self.set_cues(cue_in + offset, cue_out + offset)?;
        if start > track_start {
            self.start_time = start;
        }
        Ok(())
    }

    /// Remove the timeline range `[start, end]` from the track's audio.
    /// Later material moves up to close the gap.
    pub fn remove_part(&mut self, start: f64, end: f64) -> EditResult<()> {
        let from = start.max(self.start_time);
        let to = end.min(self.end_time());
        if to <= from {
            return Err(EditError::SelectionOutsideTrack(self.id));
        }
        if to - from >= self.duration() {
            return Err(EditError::InvalidCues {
                cue_in: self.cue_in,
                cue_out: self.cue_in,
                duration: self.buffer.duration(),
            });
        }

        let a = self.to_buffer_time(from);
        let b = self.to_buffer_time(to);
        let removed = b - a;

        self.buffer = Arc::new(self.buffer.without_range(a, b));
        self.source = TrackSource::Buffer(Arc::clone(&self.buffer));
        self.cue_out = (self.cue_out - removed).min(self.buffer.duration());
        self.razor_marks = self
            .razor_marks
            .iter()
            .filter(|m| **m <= a || **m >= b)
            .map(|m| if *m >= b { m - removed } else { *m })
            .collect();
        self.rebuild_playout();
        Ok(())
    }

    /// Mark a split at timeline time `at` without removing material.
    pub fn razor_cut(&mut self, at: f64) -> EditResult<()> {
        if at <= self.start_time || at >= self.end_time() {
            return Err(EditError::SelectionOutsideTrack(self.id));
        }
        let mark = self.to_buffer_time(at);
        let idx = self.razor_marks.partition_point(|m| *m < mark);
        if self.razor_marks.get(idx).is_none_or(|m| (m - mark).abs() > CUE_EPSILON) {
            self.razor_marks.insert(idx, mark);
        }
        Ok(())
    }

    /// Split at timeline time `at`. `self` keeps `[start, at)` and loses its
    /// fade-out; the returned track covers `[at, end)`.
    pub fn split_off(
        &mut self,
        at: f64,
        id: TrackId,
        name: impl Into<String>,
    ) -> EditResult<Track> {
        if at <= self.start_time || at >= self.end_time() {
            return Err(EditError::SelectionOutsideTrack(self.id));
        }
        let end = self.end_time();

        let mut tail = Track::new(id, name, self.source.clone(), Arc::clone(&self.buffer));
        tail.cue_in = self.cue_in;
        tail.cue_out = self.cue_out;
        tail.start_time = self.start_time;
        tail.fades = self.fades.iter().filter(|f| f.edge == FadeEdge::Out).copied().collect();
        tail.gain = self.gain;
        tail.stereo_pan = self.stereo_pan;
        tail.effects = self.effects.clone();
        tail.custom_class = self.custom_class.clone();
        tail.wave_outline_color = self.wave_outline_color.clone();
        tail.enabled_states = self.enabled_states;
        tail.set_state(self.state);
        tail.razor_marks = self.razor_marks.clone();
        tail.trim(at, end)?;
        if let Some(p) = self.playout.as_ref() {
            tail.set_playout(Playout::new(p.context().clone(), Arc::clone(&tail.buffer)));
        }

        self.trim(self.start_time, at)?;
        self.remove_fade(FadeEdge::Out);

        let (tail_in, tail_out) = (tail.cue_in, tail.cue_out);
        tail.razor_marks.retain(|m| *m > tail_in && *m < tail_out);
        let (head_in, head_out) = (self.cue_in, self.cue_out);
        self.razor_marks.retain(|m| *m > head_in && *m < head_out);

        Ok(tail)
    }
}

fn matches_mode(gesture: &TrackGesture, mode: InteractionMode) -> bool {
    matches!(
        (gesture, mode),
        (TrackGesture::Cursor, InteractionMode::Cursor)
            | (TrackGesture::Select(_), InteractionMode::Select)
            | (TrackGesture::Shift(_), InteractionMode::Shift)
            | (TrackGesture::FadeIn, InteractionMode::FadeIn)
            | (TrackGesture::FadeOut, InteractionMode::FadeOut)
            | (TrackGesture::Inert, InteractionMode::None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::AudioContext;

    const SR: f64 = 100.0;

    fn track(seconds: usize) -> Track {
        let data = AudioData::new(SR, vec![vec![1.0; seconds * SR as usize]]);
        Track::new(1, "t", TrackSource::Url("t.wav".into()), Arc::new(data))
    }

    fn bound(seconds: usize) -> (Track, crate::clock::ClockHandle) {
        let mut t = track(seconds);
        let (ctx, clock) = AudioContext::realtime(SR);
        let playout = Playout::new(ctx, Arc::clone(t.buffer()));
        t.set_playout(playout);
        (t, clock)
    }

    #[test]
    fn test_end_time_follows_cues() {
        let mut t = track(10);
        t.set_start_time(2.0);
        t.set_cues(1.0, 4.0).unwrap();
        assert_eq!(t.end_time(), 2.0 + 3.0);
    }

    #[test]
    fn test_invalid_cues_rejected() {
        let mut t = track(10);
        assert!(t.set_cues(5.0, 5.0).is_err());
        assert!(t.set_cues(0.0, 11.0).is_err());
        assert!(t.set_cues(-1.0, 2.0).is_err());
        assert_eq!((t.cue_in(), t.cue_out()), (0.0, 10.0));
    }

    #[test]
    fn test_trim_moves_start_and_cues() {
        let mut t = track(10);
        t.set_start_time(2.0);
        t.trim(4.0, 20.0).unwrap();
        assert_eq!(t.start_time(), 4.0);
        assert_eq!((t.cue_in(), t.cue_out()), (2.0, 10.0));
        assert_eq!(t.end_time(), 12.0);

        assert_eq!(t.trim(20.0, 30.0), Err(EditError::SelectionOutsideTrack(1)));
    }

    #[test]
    fn test_trim_with_enclosing_selection_keeps_track() {
        let mut t = track(5);
        t.set_start_time(2.0);
        t.trim(1.0, 8.0).unwrap();
        assert_eq!(t.start_time(), 2.0);
        assert_eq!((t.cue_in(), t.cue_out()), (0.0, 5.0));

        // touching an edge is not an overlap
        assert_eq!(t.trim(7.0, 9.0), Err(EditError::SelectionOutsideTrack(1)));
    }

    #[test]
    fn test_split_partitions_cue_coverage() {
        let (mut t, _clock) = bound(10);
        t.set_fade_out(1.0, FadeShape::Linear);
        let tail = t.split_off(4.0, 2, "t_1").unwrap();

        assert_eq!(t.end_time(), 4.0);
        assert!(t.fade(FadeEdge::Out).is_none());
        assert_eq!(tail.start_time(), 4.0);
        assert_eq!(tail.end_time(), 10.0);
        assert_eq!(t.duration() + tail.duration(), 10.0);
        assert!(tail.fade(FadeEdge::Out).is_some());
        assert!(tail.playout().is_some());
    }

    #[test]
    fn test_remove_part_shortens_track() {
        let (mut t, _clock) = bound(10);
        t.remove_part(2.0, 5.0).unwrap();
        assert!((t.duration() - 7.0).abs() < 1e-9);
        assert_eq!(t.buffer().frames(), 700);
        assert!(Arc::ptr_eq(t.buffer(), t.playout().unwrap().buffer()));
    }

    #[test]
    fn test_razor_cut_keeps_material() {
        let mut t = track(10);
        t.razor_cut(3.0).unwrap();
        t.razor_cut(3.0).unwrap();
        assert_eq!(t.razor_marks(), &[3.0]);
        assert_eq!(t.duration(), 10.0);
        assert!(t.razor_cut(0.0).is_err());
    }

    #[test]
    fn test_peaks_follow_resolution_not_state() {
        let mut t = track(10);
        t.calculate_peaks(10, true);
        assert_eq!(t.peaks().length, 100);
        t.set_gain_level(0.5);
        t.calculate_peaks(10, true);
        assert_eq!(t.peaks().length, 100);
        t.calculate_peaks(50, true);
        assert_eq!(t.peaks().length, 20);
    }

    #[test]
    fn test_schedule_play_clamps_to_window() {
        let (mut t, _clock) = bound(10);
        t.set_start_time(2.0);

        // cursor before the track: delayed start, full duration
        let ticket = t.schedule_play(0.0, 0.0, None, PlayOptions::default()).unwrap();
        let src = *t.playout().unwrap().source().unwrap();
        assert_eq!(src.when, 2.0);
        assert_eq!(src.offset, 0.0);
        assert_eq!(src.duration, 10.0);
        assert_eq!(ticket.ends_at, 12.0);

        // cursor inside the track with a segment end
        t.schedule_play(0.0, 5.0, Some(7.0), PlayOptions::default());
        let src = *t.playout().unwrap().source().unwrap();
        assert_eq!(src.when, 0.0);
        assert_eq!(src.offset, 3.0);
        assert_eq!(src.duration, 2.0);
    }

    #[test]
    fn test_schedule_play_outside_range_is_settled() {
        let (mut t, _clock) = bound(10);
        let ticket = t.schedule_play(1.0, 20.0, None, PlayOptions::default()).unwrap();
        assert!(ticket.is_settled(1.0));
        assert!(!t.is_playing());
    }

    #[test]
    fn test_silent_tracks_still_schedule() {
        let (mut t, _clock) = bound(10);
        let opts = PlayOptions {
            should_play: false,
            ..Default::default()
        };
        let ticket = t.schedule_play(0.0, 0.0, None, opts).unwrap();
        assert_eq!(ticket.ends_at, 10.0);
        assert!(t.is_playing());
        assert!(!t.playout().unwrap().should_play());

        t.schedule_stop();
        assert!(!t.is_playing());
        t.schedule_stop();
    }

    #[test]
    fn test_fades_replace_per_edge() {
        let mut t = track(10);
        t.set_fade_in(1.0, FadeShape::Linear);
        t.set_fade_in(2.0, FadeShape::SCurve);
        assert_eq!(t.fades().len(), 1);
        assert_eq!(t.fade(FadeEdge::In).map(|f| f.duration), Some(2.0));
    }

    #[test]
    fn test_disabled_mode_falls_back_to_none() {
        let mut t = track(1);
        t.set_enabled_states(EnabledStates {
            shift: false,
            ..Default::default()
        });
        t.set_state(InteractionMode::Shift);
        assert_eq!(t.state(), InteractionMode::None);
        t.set_state(InteractionMode::Select);
        assert_eq!(t.state(), InteractionMode::Select);
    }
}
