// src/audio_buffer.rs
//
// Decoded audio held by tracks.
//
// Samples are stored planar (one Vec per channel). Buffers are shared between
// a track, its playout, and any track split from it, so edits never mutate a
// buffer in place: they build a new one.

use crate::clock::{samples_to_seconds, seconds_to_frames};

#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    sample_rate: f64,
    channels: Vec<Vec<f32>>,
    frames: usize,
}

impl AudioData {
    /// Build from planar channel data. Shorter channels are padded with
    /// silence to the longest one.
    pub fn new(sample_rate: f64, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for ch in &mut channels {
            ch.resize(frames, 0.0);
        }
        Self {
            sample_rate,
            channels,
            frames,
        }
    }

    pub fn silent(channels: usize, frames: usize, sample_rate: f64) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frames]; channels.max(1)])
    }

    /// Build from interleaved samples.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: f64) -> Self {
        let channels = channels.max(1);
        let frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, s) in frame.iter().enumerate() {
                planar[ch].push(*s);
            }
        }
        Self::new(sample_rate, planar)
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Length in frames.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Length in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        samples_to_seconds(self.frames, self.sample_rate)
    }

    #[inline]
    pub fn channel(&self, ch: usize) -> &[f32] {
        &self.channels[ch]
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Sample at a frame, mapping missing channels onto the last one
    /// (mono sources feed both sides of a stereo output).
    #[inline]
    pub fn sample(&self, ch: usize, frame: usize) -> f32 {
        if self.channels.is_empty() {
            return 0.0;
        }
        let ch = ch.min(self.channels.len() - 1);
        self.channels[ch].get(frame).copied().unwrap_or(0.0)
    }

    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frames * self.channels.len());
        for frame in 0..self.frames {
            for ch in &self.channels {
                out.push(ch[frame]);
            }
        }
        out
    }

    /// Frame index for a time offset, clamped to the buffer.
    #[inline]
    pub fn frame_at(&self, seconds: f64) -> usize {
        seconds_to_frames(seconds, self.sample_rate).min(self.frames)
    }

    // -------------------------------
    // MARK: Resampling
    // -------------------------------

    /// Linear-interpolation resample to `target_rate`.
    pub fn resample(&self, target_rate: f64) -> Self {
        if (self.sample_rate - target_rate).abs() < f64::EPSILON || self.frames == 0 {
            return Self::new(target_rate, self.channels.clone());
        }

        let ratio = self.sample_rate / target_rate;
        let out_frames = ((self.frames as f64) / ratio).round() as usize;
        let channels = self
            .channels
            .iter()
            .map(|src| {
                (0..out_frames)
                    .map(|i| {
                        let pos = i as f64 * ratio;
                        let idx = pos.floor() as usize;
                        let frac = (pos - idx as f64) as f32;
                        let a = src.get(idx).copied().unwrap_or(0.0);
                        let b = src.get(idx + 1).copied().unwrap_or(a);
                        a + (b - a) * frac
                    })
                    .collect()
            })
            .collect();

        Self::new(target_rate, channels)
    }

    // -------------------------------
    // MARK: Content edits
    // -------------------------------

    /// Copy of the buffer with the time range `[start, end)` removed.
    pub fn without_range(&self, start: f64, end: f64) -> Self {
        let a = self.frame_at(start.min(end));
        let b = self.frame_at(start.max(end));
        let channels = self
            .channels
            .iter()
            .map(|ch| {
                let mut out = Vec::with_capacity(self.frames - (b - a));
                out.extend_from_slice(&ch[..a]);
                out.extend_from_slice(&ch[b..]);
                out
            })
            .collect();
        Self::new(self.sample_rate, channels)
    }

    /// Copy of the time range `[start, end)`.
    pub fn slice(&self, start: f64, end: f64) -> Self {
        let a = self.frame_at(start.min(end));
        let b = self.frame_at(start.max(end));
        let channels = self.channels.iter().map(|ch| ch[a..b].to_vec()).collect();
        Self::new(self.sample_rate, channels)
    }

    /// Append another buffer (same sample rate expected; resampled if not).
    pub fn append(&mut self, other: &AudioData) {
        let other = if (other.sample_rate - self.sample_rate).abs() < f64::EPSILON {
            std::borrow::Cow::Borrowed(other)
        } else {
            std::borrow::Cow::Owned(other.resample(self.sample_rate))
        };
        let channels = self.channels.len().max(other.num_channels());
        self.channels.resize(channels, vec![0.0; self.frames]);
        for (ch, dst) in self.channels.iter_mut().enumerate() {
            if ch < other.num_channels() {
                dst.extend_from_slice(other.channel(ch));
            } else {
                dst.resize(dst.len() + other.frames(), 0.0);
            }
        }
        self.frames += other.frames();
    }
}
