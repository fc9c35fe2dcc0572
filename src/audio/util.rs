//! Shared sample-level utilities: down-mixing and amplitude normalization.

use serde::{Deserialize, Serialize};

/// Amplitude normalization strategy applied to each segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Leave samples untouched
    None,
    /// Scale so the loudest sample reaches the target
    #[default]
    Peak,
    /// Scale so the RMS level reaches the target (clipped to [-1, 1])
    Rms,
}

/// Normalization mode plus its target level (0.0 - 1.0 of full scale).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub mode: NormalizationMode,
    pub target: f32,
}

impl Default for Normalization {
    fn default() -> Self {
        // 95% of full scale avoids clipping after 16-bit conversion
        Self { mode: NormalizationMode::Peak, target: 0.95 }
    }
}

impl Normalization {
    /// Normalize samples in place.
    ///
    /// # Returns
    /// The gain that was applied (1.0 when nothing changed, e.g. for silence).
    pub fn apply(&self, samples: &mut [f32]) -> f32 {
        let level = match self.mode {
            NormalizationMode::None => return 1.0,
            NormalizationMode::Peak => peak(samples),
            NormalizationMode::Rms => rms(samples),
        };

        if level <= f32::EPSILON {
            return 1.0;
        }

        let gain = self.target / level;
        for s in samples.iter_mut() {
            *s = (*s * gain).clamp(-1.0, 1.0);
        }
        gain
    }
}

/// Largest absolute sample value.
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |max, s| max.max(s.abs()))
}

/// Root-mean-square level.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Convert interleaved f32 samples to mono.
///
/// Handles both mono and stereo input:
/// - Mono: Returns a copy of the input
/// - Stereo: Mixes channels by averaging
///
/// # Arguments
/// * `data` - Raw f32 samples (interleaved for stereo)
/// * `channels` - Number of channels (1 for mono, 2 for stereo)
pub fn convert_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        data.to_vec()
    } else {
        data.chunks(channels).map(|frame| frame.iter().sum::<f32>() / channels as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_to_mono() {
        let data = vec![0.5f32, 1.0, -0.5, -1.0];
        let result = convert_to_mono(&data, 2);
        assert_eq!(result, vec![0.75, -0.75]);
    }

    #[test]
    fn test_peak_normalization() {
        let mut samples = vec![0.1f32, -0.5, 0.25];
        let gain = Normalization::default().apply(&mut samples);
        assert!((gain - 1.9).abs() < 1e-5);
        assert!((peak(&samples) - 0.95).abs() < 1e-5);
        assert!((samples[0] - 0.19).abs() < 1e-5);
    }

    #[test]
    fn test_rms_normalization_clips() {
        let mut samples = vec![0.01f32, -0.01, 0.01, 0.9];
        let norm = Normalization { mode: NormalizationMode::Rms, target: 0.8 };
        norm.apply(&mut samples);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert_eq!(samples[3], 1.0);
    }

    #[test]
    fn test_silence_is_left_alone() {
        let mut samples = vec![0.0f32; 16];
        assert_eq!(Normalization::default().apply(&mut samples), 1.0);
        assert!(samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_mode_none() {
        let mut samples = vec![0.2f32, -0.3];
        let norm = Normalization { mode: NormalizationMode::None, target: 0.9 };
        assert_eq!(norm.apply(&mut samples), 1.0);
        assert_eq!(samples, vec![0.2, -0.3]);
    }
}
