// src/peaks.rs
//
// Peak envelope extraction.
//
// A peak envelope summarizes a buffer as one min/max pair per pixel column,
// so a waveform can be drawn without touching every sample.

use serde::{Deserialize, Serialize};

use crate::audio_buffer::AudioData;

/// Min/max amplitude of one pixel column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub min: f32,
    pub max: f32,
}

/// Peak envelope at one zoom level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Peaks {
    /// Zoom level this envelope was computed at.
    pub samples_per_pixel: usize,

    /// Number of pixel columns.
    pub length: usize,

    /// One envelope per output channel (a single one when mono).
    pub data: Vec<Vec<Peak>>,
}

impl Peaks {
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Peak envelope for a run of samples.
pub fn peaks_from_samples(samples: &[f32], samples_per_pixel: usize) -> Vec<Peak> {
    let spp = samples_per_pixel.max(1);
    samples
        .chunks(spp)
        .map(|column| {
            let mut peak = Peak {
                min: f32::MAX,
                max: f32::MIN,
            };
            for &s in column {
                peak.min = peak.min.min(s);
                peak.max = peak.max.max(s);
            }
            peak
        })
        .collect()
}

/// Peak envelope for the frames `[start_frame, end_frame)` of a buffer.
///
/// With `mono` set, channels are averaged before extraction.
pub fn extract_peaks(
    data: &AudioData,
    samples_per_pixel: usize,
    mono: bool,
    start_frame: usize,
    end_frame: usize,
) -> Peaks {
    let end = end_frame.min(data.frames());
    let start = start_frame.min(end);

    let envelopes: Vec<Vec<Peak>> = if mono && data.num_channels() > 1 {
        let scale = 1.0 / data.num_channels() as f32;
        let mixed: Vec<f32> = (start..end)
            .map(|f| {
                data.channels()
                    .iter()
                    .map(|ch| ch[f])
                    .sum::<f32>()
                    * scale
            })
            .collect();
        vec![peaks_from_samples(&mixed, samples_per_pixel)]
    } else {
        data.channels()
            .iter()
            .map(|ch| peaks_from_samples(&ch[start..end], samples_per_pixel))
            .collect()
    };

    Peaks {
        samples_per_pixel,
        length: envelopes.first().map_or(0, Vec::len),
        data: envelopes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peaks_per_column() {
        let samples = [0.1, -0.5, 0.3, 0.9, -0.2];
        let peaks = peaks_from_samples(&samples, 2);
        assert_eq!(peaks.len(), 3);
        assert_eq!(peaks[0], Peak { min: -0.5, max: 0.1 });
        assert_eq!(peaks[1], Peak { min: 0.3, max: 0.9 });
        assert_eq!(peaks[2], Peak { min: -0.2, max: -0.2 });
    }

    #[test]
    fn test_mono_merges_channels() {
        let data = AudioData::new(100.0, vec![vec![1.0; 8], vec![-1.0; 8]]);
        let mono = extract_peaks(&data, 4, true, 0, 8);
        assert_eq!(mono.data.len(), 1);
        assert_eq!(mono.data[0][0], Peak { min: 0.0, max: 0.0 });

        let stereo = extract_peaks(&data, 4, false, 0, 8);
        assert_eq!(stereo.data.len(), 2);
        assert_eq!(stereo.length, 2);
    }

    #[test]
    fn test_length_follows_resolution_and_window() {
        let data = AudioData::silent(1, 1000, 100.0);
        assert_eq!(extract_peaks(&data, 100, true, 0, 1000).length, 10);
        assert_eq!(extract_peaks(&data, 250, true, 0, 1000).length, 4);
        assert_eq!(extract_peaks(&data, 100, true, 200, 500).length, 3);
    }
}
