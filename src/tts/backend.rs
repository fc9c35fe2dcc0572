//! Backend-neutral synthesis interface.
//!
//! Every engine takes text plus voice parameters and returns PCM samples at a
//! sample rate of its choosing, or a typed error the assembler can act on.

use thiserror::Error;

/// Resolved voice parameters for one synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceParams {
    pub voice: String, // Backend-specific voice identifier
    pub speed: f32,    // Speech-rate multiplier (> 0)
}

/// Audio produced for a single segment.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    /// Raw f32 samples, interleaved when `channels == 2`
    pub samples: Vec<f32>,
    /// Number of interleaved channels (1 or 2)
    pub channels: u16,
    /// Sample rate declared by the backend
    pub sample_rate: u32,
}

impl SynthesisResult {
    /// Create a mono result.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, channels: 1, sample_rate }
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Synthesis failures, classified by how the run must react.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Engine, model or network unreachable; fatal unless a fallback exists
    #[error("TTS backend unavailable: {0}")]
    BackendUnavailable(String),
    /// Request took too long; retried once before the segment is skipped
    #[error("synthesis timed out: {0}")]
    Timeout(String),
    /// Voice not recognized by the backend
    #[error("invalid voice '{0}'")]
    InvalidVoice(String),
    /// Any other per-segment failure; the segment is skipped
    #[error("synthesis failed: {0}")]
    Failed(String),
}

impl SynthesisError {
    /// Whether this error ends the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SynthesisError::BackendUnavailable(_) | SynthesisError::InvalidVoice(_))
    }

    /// Whether the same request may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SynthesisError::Timeout(_))
    }
}

/// Common interface for interchangeable text-to-speech engines.
pub trait SpeechBackend {
    /// Display name for logs (e.g. "Kokoro (af_bella)").
    fn name(&self) -> String;

    /// Verify the voice and engine readiness before any synthesis starts.
    ///
    /// # Errors
    /// `InvalidVoice` for an unknown voice, `BackendUnavailable` when the engine
    /// cannot be reached or loaded.
    fn check_voice(&mut self, voice: &VoiceParams) -> Result<(), SynthesisError>;

    /// Validate a voice for an engine held in reserve, without loading models.
    ///
    /// Defaults to the full `check_voice`.
    fn validate_voice(&mut self, voice: &VoiceParams) -> Result<(), SynthesisError> {
        self.check_voice(voice)
    }

    /// Synthesize a single segment.
    ///
    /// # Errors
    /// Never returns empty audio; any failure is reported as a `SynthesisError`.
    fn synthesize(&mut self, text: &str, voice: &VoiceParams) -> Result<SynthesisResult, SynthesisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_duration_counts_frames() {
        let result = SynthesisResult { samples: vec![0.0; 48000], channels: 2, sample_rate: 24000 };
        assert_eq!(result.frames(), 24000);
        assert!((result.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_classification() {
        assert!(SynthesisError::BackendUnavailable("down".into()).is_fatal());
        assert!(SynthesisError::InvalidVoice("x".into()).is_fatal());
        assert!(!SynthesisError::Timeout("slow".into()).is_fatal());
        assert!(SynthesisError::Timeout("slow".into()).is_retryable());
        assert!(!SynthesisError::Failed("500".into()).is_retryable());
    }
}
