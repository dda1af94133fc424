// src/playout.rs
//
// Per-track playback graph.
//
// A Playout is the audio side of one track: source -> fades -> volume ->
// mute/solo gate -> pan -> track effects -> master gain. It is bound to a
// single AudioContext and holds at most one scheduled source, so scheduling
// again replaces the previous schedule instead of layering a second one.
//
// Rendering is pull-based: the context's driver calls `render` once per block
// with the block's first frame, and the playout mixes itself into the output.

use std::sync::Arc;

use crate::audio_buffer::AudioData;
use crate::clock::{AudioContext, ContextId};
use crate::effects::EffectChain;
use crate::fade::{Fade, fades_gain_at};

/// The audible window of a buffer, in buffer seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CueWindow {
    pub cue_in: f64,
    pub cue_out: f64,
}

impl CueWindow {
    #[inline]
    pub fn length(&self) -> f64 {
        self.cue_out - self.cue_in
    }
}

/// One scheduled playback of the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledSource {
    /// Context time at which sound starts.
    pub when: f64,

    /// Buffer offset (seconds) heard at `when`.
    pub offset: f64,

    /// Seconds of audio to play.
    pub duration: f64,

    /// Cue window the fades are positioned against.
    pub window: CueWindow,

    /// Context time of a requested stop.
    pub stop_at: Option<f64>,
}

impl ScheduledSource {
    /// Context time at which the source falls silent.
    #[inline]
    pub fn end_time(&self) -> f64 {
        let natural = self.when + self.duration;
        self.stop_at.map_or(natural, |stop| stop.min(natural))
    }
}

/// Completion token returned by `Playout::play`.
///
/// Settles once the context clock passes `ends_at`, or immediately when the
/// play was silent bookkeeping only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayoutTicket {
    pub context: ContextId,
    pub ends_at: f64,
}

impl PlayoutTicket {
    #[inline]
    pub fn is_settled(&self, now: f64) -> bool {
        now >= self.ends_at
    }
}

//
// ===============================
// MARK: Playout
// ===============================
//

#[derive(Debug)]
pub struct Playout {
    context: AudioContext,
    buffer: Arc<AudioData>,

    volume_gain: f32,
    should_play: bool,
    master_gain: f32,
    pan: f32,
    mono_pan: bool,

    fades: Vec<Fade>,
    effects: EffectChain,

    source: Option<ScheduledSource>,

    scratch_l: Vec<f32>,
    scratch_r: Vec<f32>,
}

impl Playout {
    pub fn new(context: AudioContext, buffer: Arc<AudioData>) -> Self {
        let mono_pan = buffer.num_channels() == 1;
        Self {
            context,
            buffer,
            volume_gain: 1.0,
            should_play: true,
            master_gain: 1.0,
            pan: 0.0,
            mono_pan,
            fades: Vec::new(),
            effects: EffectChain::new(),
            source: None,
            scratch_l: Vec::new(),
            scratch_r: Vec::new(),
        }
    }

    #[inline]
    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    #[inline]
    pub fn buffer(&self) -> &Arc<AudioData> {
        &self.buffer
    }

    pub fn source(&self) -> Option<&ScheduledSource> {
        self.source.as_ref()
    }

    // -------------------------------
    // MARK: Parameters
    // -------------------------------

    pub fn set_volume_gain_level(&mut self, gain: f32) {
        self.volume_gain = gain.max(0.0);
    }

    pub fn set_should_play(&mut self, should_play: bool) {
        self.should_play = should_play;
    }

    pub fn set_master_gain_level(&mut self, gain: f32) {
        self.master_gain = gain.max(0.0);
    }

    pub fn set_stereo_pan_value(&mut self, pan: f32) {
        self.pan = pan.clamp(-1.0, 1.0);
    }

    pub fn set_fades(&mut self, fades: &[Fade]) {
        self.fades = fades.to_vec();
    }

    pub fn set_effects(&mut self, mut effects: EffectChain) {
        effects.prepare(self.context.sample_rate());
        self.effects = effects;
    }

    pub fn should_play(&self) -> bool {
        self.should_play
    }

    // -------------------------------
    // MARK: Scheduling
    // -------------------------------

    /// Schedule the source to play `duration` seconds from buffer `offset`,
    /// starting at context time `when`. Replaces any previous schedule.
    pub fn play(
        &mut self,
        when: f64,
        offset: f64,
        duration: f64,
        window: CueWindow,
    ) -> PlayoutTicket {
        let source = ScheduledSource {
            when,
            offset,
            duration: duration.max(0.0),
            window,
            stop_at: None,
        };
        self.effects.reset();
        self.source = Some(source);
        PlayoutTicket {
            context: self.context.id(),
            ends_at: source.end_time(),
        }
    }

    /// Stop at context time `when`. Safe when nothing is scheduled.
    pub fn stop(&mut self, when: f64) {
        if let Some(source) = self.source.as_mut() {
            source.stop_at = Some(source.stop_at.map_or(when, |s| s.min(when)));
        }
    }

    /// Whether the source is scheduled and not yet finished at `now`.
    pub fn is_playing_at(&self, now: f64) -> bool {
        self.source.is_some_and(|s| now < s.end_time())
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing_at(self.context.current_time())
    }

    /// Number of live schedules (0 or 1).
    pub fn active_sources(&self) -> usize {
        usize::from(self.is_playing())
    }

    // -------------------------------
    // MARK: Rendering
    // -------------------------------

    /// Mix this playout into a stereo block starting at `block_start` frames.
    pub fn render(&mut self, block_start: u64, left: &mut [f32], right: &mut [f32]) {
        let Some(source) = self.source else {
            return;
        };

        let frames = left.len().min(right.len());
        let sr = self.context.sample_rate();
        let block_time = block_start as f64 / sr;
        let block_end = (block_start + frames as u64) as f64 / sr;
        if block_end <= source.when || block_time >= source.end_time() {
            if block_time >= source.end_time() {
                self.source = None;
            }
            return;
        }

        self.scratch_l.clear();
        self.scratch_l.resize(frames, 0.0);
        self.scratch_r.clear();
        self.scratch_r.resize(frames, 0.0);

        let gate = if self.should_play { 1.0 } else { 0.0 };
        let gain = self.volume_gain * gate * self.master_gain;
        let buffer_sr = self.buffer.sample_rate();
        let region_len = source.window.length();

        for i in 0..frames {
            let t = (block_start + i as u64) as f64 / sr;
            if t < source.when || t >= source.end_time() {
                continue;
            }
            let src_time = source.offset + (t - source.when);
            let fade = fades_gain_at(&self.fades, src_time - source.window.cue_in, region_len);

            let pos = src_time * buffer_sr;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let l = lerp(self.buffer.sample(0, idx), self.buffer.sample(0, idx + 1), frac);
            let r = lerp(self.buffer.sample(1, idx), self.buffer.sample(1, idx + 1), frac);

            let g = gain * fade;
            let (pl, pr) = pan_frame(self.pan, l * g, r * g, self.mono_pan);
            self.scratch_l[i] = pl;
            self.scratch_r[i] = pr;
        }

        self.effects.process(&mut self.scratch_l, &mut self.scratch_r);

        for (out, s) in left.iter_mut().zip(&self.scratch_l) {
            *out += *s;
        }
        for (out, s) in right.iter_mut().zip(&self.scratch_r) {
            *out += *s;
        }
    }
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Stereo panner matching the Web Audio `StereoPannerNode` law.
#[inline]
pub fn pan_frame(pan: f32, left: f32, right: f32, mono: bool) -> (f32, f32) {
    use std::f32::consts::FRAC_PI_2;

    if mono {
        let x = (pan + 1.0) / 2.0;
        return (left * (x * FRAC_PI_2).cos(), left * (x * FRAC_PI_2).sin());
    }

    if pan <= 0.0 {
        let x = pan + 1.0;
        (left + right * (x * FRAC_PI_2).cos(), right * (x * FRAC_PI_2).sin())
    } else {
        let x = pan;
        (left * (x * FRAC_PI_2).cos(), right + left * (x * FRAC_PI_2).sin())
    }
}

//
// ===============================
// MARK: Master bus
// ===============================
//

/// Effects applied after all playouts are mixed. Master gain is applied per
/// playout, so the bus carries effects only.
#[derive(Debug, Clone, Default)]
pub struct MasterBus {
    effects: EffectChain,
}

impl MasterBus {
    pub fn new(sample_rate: f64, mut effects: EffectChain) -> Self {
        effects.prepare(sample_rate);
        Self { effects }
    }

    pub fn effects(&self) -> &EffectChain {
        &self.effects
    }

    pub fn set_effects(&mut self, mut effects: EffectChain, sample_rate: f64) {
        effects.prepare(sample_rate);
        self.effects = effects;
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.effects.process(left, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fade::FadeShape;

    fn ones(frames: usize, sample_rate: f64) -> Arc<AudioData> {
        Arc::new(AudioData::new(sample_rate, vec![vec![1.0; frames], vec![1.0; frames]]))
    }

    fn window(len: f64) -> CueWindow {
        CueWindow { cue_in: 0.0, cue_out: len }
    }

    #[test]
    fn test_play_replaces_previous_schedule() {
        let (ctx, _clock) = AudioContext::realtime(100.0);
        let mut playout = Playout::new(ctx, ones(100, 100.0));

        playout.play(0.0, 0.0, 1.0, window(1.0));
        let ticket = playout.play(0.0, 0.5, 0.5, window(1.0));

        assert_eq!(playout.active_sources(), 1);
        assert_eq!(playout.source().map(|s| s.offset), Some(0.5));
        assert_eq!(ticket.ends_at, 0.5);
    }

    #[test]
    fn test_stop_is_safe_without_source() {
        let (ctx, _clock) = AudioContext::realtime(100.0);
        let mut playout = Playout::new(ctx, ones(100, 100.0));
        playout.stop(0.0);
        assert!(!playout.is_playing());
    }

    #[test]
    fn test_stop_ends_playback() {
        let (ctx, clock) = AudioContext::realtime(100.0);
        let mut playout = Playout::new(ctx, ones(100, 100.0));
        playout.play(0.0, 0.0, 1.0, window(1.0));
        assert!(playout.is_playing());

        clock.advance(10);
        playout.stop(0.1);
        assert!(!playout.is_playing());
    }

    #[test]
    fn test_render_applies_gate_and_start_time() {
        let (ctx, _clock) = AudioContext::realtime(100.0);
        let mut playout = Playout::new(ctx, ones(100, 100.0));
        playout.play(0.05, 0.0, 1.0, window(1.0));

        let mut l = vec![0.0; 10];
        let mut r = vec![0.0; 10];
        playout.render(0, &mut l, &mut r);
        assert_eq!(l[4], 0.0);
        assert!((l[5] - 1.0).abs() < 1e-6);

        playout.set_should_play(false);
        let mut l = vec![0.0; 10];
        let mut r = vec![0.0; 10];
        playout.render(10, &mut l, &mut r);
        assert!(l.iter().all(|s| *s == 0.0));
        assert!(playout.is_playing_at(0.2));
    }

    #[test]
    fn test_render_applies_fade_in() {
        let (ctx, _clock) = AudioContext::realtime(100.0);
        let mut playout = Playout::new(ctx, ones(100, 100.0));
        playout.set_fades(&[Fade::fade_in(0.1, FadeShape::Linear)]);
        playout.play(0.0, 0.0, 1.0, window(1.0));

        let mut l = vec![0.0; 20];
        let mut r = vec![0.0; 20];
        playout.render(0, &mut l, &mut r);
        assert_eq!(l[0], 0.0);
        assert!((l[5] - 0.5).abs() < 1e-6);
        assert!((l[15] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_pan_law() {
        let (l, r) = pan_frame(0.0, 0.3, 0.7, false);
        assert!((l - 0.3).abs() < 1e-6 && (r - 0.7).abs() < 1e-6);
        let (l, r) = pan_frame(-1.0, 0.0, 1.0, false);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = pan_frame(0.0, 1.0, 1.0, true);
        assert!((l - r).abs() < 1e-6);
    }
}
