// src/effects.rs
//
// Insert effects for track and master chains.
//
// An Effect processes a stereo block in place. Chains are cloned (with fresh
// state) whenever a playout is rebuilt for another context, so each effect
// must be able to produce an unprepared copy of itself.

use std::fmt;

const MAX_DELAY_SECONDS: f32 = 2.0;

/// A stereo in-place audio processor.
pub trait Effect: Send {
    /// Name used by project snapshots.
    fn name(&self) -> &str;

    /// Called before the first block and whenever the sample rate changes.
    fn prepare(&mut self, sample_rate: f64);

    /// Process one block in place.
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Clear internal state (delay lines, filter memory).
    fn reset(&mut self) {}

    /// Fresh copy carrying parameters but not state.
    fn box_clone(&self) -> Box<dyn Effect>;
}

/// Ordered list of effects applied in sequence.
#[derive(Default)]
pub struct EffectChain {
    effects: Vec<Box<dyn Effect>>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, effect: impl Effect + 'static) -> Self {
        self.push(Box::new(effect));
        self
    }

    pub fn push(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
    }

    /// Move every effect of `other` to the end of this chain.
    pub fn append(&mut self, other: EffectChain) {
        self.effects.extend(other.effects);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.effects.iter().map(|e| e.name())
    }

    pub fn prepare(&mut self, sample_rate: f64) {
        for effect in &mut self.effects {
            effect.prepare(sample_rate);
        }
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for effect in &mut self.effects {
            effect.process(left, right);
        }
    }

    pub fn reset(&mut self) {
        for effect in &mut self.effects {
            effect.reset();
        }
    }
}

impl Clone for EffectChain {
    fn clone(&self) -> Self {
        Self {
            effects: self.effects.iter().map(|e| e.box_clone()).collect(),
        }
    }
}

impl fmt::Debug for EffectChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

// ═══════════════════════════════════════════════════════════════════
// Gain
// ═══════════════════════════════════════════════════════════════════

/// Static gain in decibels.
#[derive(Debug, Clone)]
pub struct GainEffect {
    gain_linear: f32,
}

impl GainEffect {
    pub fn from_db(gain_db: f32) -> Self {
        Self {
            gain_linear: 10.0_f32.powf(gain_db / 20.0),
        }
    }
}

impl Effect for GainEffect {
    fn name(&self) -> &str {
        "gain"
    }

    fn prepare(&mut self, _sample_rate: f64) {}

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        for s in left.iter_mut().chain(right.iter_mut()) {
            *s *= self.gain_linear;
        }
    }

    fn box_clone(&self) -> Box<dyn Effect> {
        Box::new(self.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Low-pass (state variable filter)
// ═══════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default)]
struct SvfState {
    ic1eq: f32,
    ic2eq: f32,
}

/// Two-pole low-pass using the SVF topology.
#[derive(Debug, Clone)]
pub struct LowPassEffect {
    cutoff: f32,
    resonance: f32,

    a1: f32,
    a2: f32,
    a3: f32,

    state: [SvfState; 2],
}

impl LowPassEffect {
    pub fn new(cutoff: f32, resonance: f32) -> Self {
        let mut effect = Self {
            cutoff,
            resonance,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
            state: [SvfState::default(); 2],
        };
        effect.prepare(48_000.0);
        effect
    }

    #[inline]
    fn process_sample(a: (f32, f32, f32), state: &mut SvfState, input: f32) -> f32 {
        let (a1, a2, a3) = a;
        let v3 = input - state.ic2eq;
        let v1 = a1 * state.ic1eq + a2 * v3;
        let v2 = state.ic2eq + a2 * state.ic1eq + a3 * v3;

        state.ic1eq = 2.0 * v1 - state.ic1eq;
        state.ic2eq = 2.0 * v2 - state.ic2eq;
        v2
    }
}

impl Effect for LowPassEffect {
    fn name(&self) -> &str {
        "lowpass"
    }

    fn prepare(&mut self, sample_rate: f64) {
        let cutoff = self.cutoff.clamp(20.0, (sample_rate as f32 * 0.49).max(20.0));
        let resonance = self.resonance.clamp(0.0, 0.99);

        let g = (std::f32::consts::PI * cutoff / sample_rate as f32).tan();
        let k = 2.0 - 2.0 * resonance;
        self.a1 = 1.0 / (1.0 + g * (g + k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let a = (self.a1, self.a2, self.a3);
        let [l_state, r_state] = &mut self.state;
        for s in left.iter_mut() {
            *s = Self::process_sample(a, l_state, *s);
        }
        for s in right.iter_mut() {
            *s = Self::process_sample(a, r_state, *s);
        }
    }

    fn reset(&mut self) {
        self.state = [SvfState::default(); 2];
    }

    fn box_clone(&self) -> Box<dyn Effect> {
        let mut copy = self.clone();
        copy.reset();
        Box::new(copy)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Delay
// ═══════════════════════════════════════════════════════════════════

/// Simple stereo feedback delay.
#[derive(Debug, Clone)]
pub struct DelayEffect {
    delay_time: f32, // seconds
    feedback: f32,   // 0.0 - 1.0
    mix: f32,        // 0.0 = dry, 1.0 = wet

    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f64,
}

impl DelayEffect {
    pub fn new(delay_time: f32, feedback: f32, mix: f32) -> Self {
        Self {
            delay_time: delay_time.clamp(0.0, MAX_DELAY_SECONDS),
            feedback: feedback.clamp(0.0, 0.99),
            mix: mix.clamp(0.0, 1.0),
            buffer_l: Vec::new(),
            buffer_r: Vec::new(),
            write_pos: 0,
            sample_rate: 0.0,
        }
    }

    fn delay_samples(&self) -> usize {
        let samples = (self.delay_time * self.sample_rate as f32).round() as usize;
        samples.clamp(1, self.buffer_l.len().saturating_sub(1).max(1))
    }
}

impl Effect for DelayEffect {
    fn name(&self) -> &str {
        "delay"
    }

    fn prepare(&mut self, sample_rate: f64) {
        if (self.sample_rate - sample_rate).abs() < 0.1 && !self.buffer_l.is_empty() {
            return;
        }
        self.sample_rate = sample_rate;
        let len = (MAX_DELAY_SECONDS as f64 * sample_rate) as usize + 1;
        self.buffer_l = vec![0.0; len];
        self.buffer_r = vec![0.0; len];
        self.write_pos = 0;
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.buffer_l.is_empty() {
            return;
        }
        let delay = self.delay_samples();
        let len = self.buffer_l.len();

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let read_pos = (self.write_pos + len - delay) % len;
            let dl = self.buffer_l[read_pos];
            let dr = self.buffer_r[read_pos];

            self.buffer_l[self.write_pos] = *l + dl * self.feedback;
            self.buffer_r[self.write_pos] = *r + dr * self.feedback;

            *l = *l * (1.0 - self.mix) + dl * self.mix;
            *r = *r * (1.0 - self.mix) + dr * self.mix;

            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }

    fn box_clone(&self) -> Box<dyn Effect> {
        Box::new(DelayEffect::new(self.delay_time, self.feedback, self.mix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_effect_scales() {
        let mut chain = EffectChain::new().with(GainEffect::from_db(-6.0206));
        chain.prepare(48_000.0);
        let mut l = vec![1.0; 4];
        let mut r = vec![1.0; 4];
        chain.process(&mut l, &mut r);
        assert!((l[0] - 0.5).abs() < 1e-3);
        assert!((r[3] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_lowpass_attenuates_nyquist() {
        let mut lp = LowPassEffect::new(200.0, 0.0);
        lp.prepare(48_000.0);
        let mut l: Vec<f32> = (0..512).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let mut r = l.clone();
        lp.process(&mut l, &mut r);
        let tail_peak = l[256..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail_peak < 0.05, "tail peak {}", tail_peak);
    }

    #[test]
    fn test_delay_echoes_impulse() {
        let mut delay = DelayEffect::new(0.001, 0.0, 1.0);
        delay.prepare(48_000.0);
        let mut l = vec![0.0; 128];
        let mut r = vec![0.0; 128];
        l[0] = 1.0;
        delay.process(&mut l, &mut r);
        assert_eq!(l[0], 0.0);
        assert!((l[48] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_chain_clone_keeps_order() {
        let chain = EffectChain::new()
            .with(GainEffect::from_db(0.0))
            .with(DelayEffect::new(0.1, 0.2, 0.3));
        let copy = chain.clone();
        assert_eq!(copy.names().collect::<Vec<_>>(), vec!["gain", "delay"]);
    }
}
