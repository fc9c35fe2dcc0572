//! Primary/secondary backend pair.
//!
//! Delegates to the primary engine until it reports `BackendUnavailable`, then
//! switches to the secondary engine for the rest of the run.

use tracing::warn;

use super::backend::{SpeechBackend, SynthesisError, SynthesisResult, VoiceParams};

pub struct FallbackBackend {
    primary: Box<dyn SpeechBackend>,
    secondary: Box<dyn SpeechBackend>,
    secondary_voice: VoiceParams, // Voice configured for the secondary engine
    switched: bool,
}

impl FallbackBackend {
    pub fn new(primary: Box<dyn SpeechBackend>, secondary: Box<dyn SpeechBackend>, secondary_voice: VoiceParams) -> Self {
        Self { primary, secondary, secondary_voice, switched: false }
    }

    fn switch(&mut self, reason: &str) -> Result<(), SynthesisError> {
        warn!("⚠️  {} unavailable ({}), falling back to {}", self.primary.name(), reason, self.secondary.name());
        self.switched = true;
        self.secondary.check_voice(&self.secondary_voice)
    }

    /// Reject a bad secondary voice up front; an unreachable secondary only warns.
    fn check_standby(&mut self) -> Result<(), SynthesisError> {
        match self.secondary.validate_voice(&self.secondary_voice) {
            Err(SynthesisError::InvalidVoice(voice)) => Err(SynthesisError::InvalidVoice(voice)),
            Err(e) => {
                warn!("⚠️  Fallback {} not ready: {}", self.secondary.name(), e);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Secondary voice, keeping the requested speed.
    fn secondary_params(&self, requested: &VoiceParams) -> VoiceParams {
        VoiceParams { voice: self.secondary_voice.voice.clone(), speed: requested.speed }
    }
}

impl SpeechBackend for FallbackBackend {
    fn name(&self) -> String {
        if self.switched { self.secondary.name() } else { format!("{} (fallback: {})", self.primary.name(), self.secondary.name()) }
    }

    fn check_voice(&mut self, voice: &VoiceParams) -> Result<(), SynthesisError> {
        if self.switched {
            return self.secondary.check_voice(&self.secondary_params(voice));
        }
        match self.primary.check_voice(voice) {
            Err(SynthesisError::BackendUnavailable(reason)) => self.switch(&reason),
            Err(e) => Err(e),
            Ok(()) => self.check_standby(),
        }
    }

    fn synthesize(&mut self, text: &str, voice: &VoiceParams) -> Result<SynthesisResult, SynthesisError> {
        if !self.switched {
            match self.primary.synthesize(text, voice) {
                Err(SynthesisError::BackendUnavailable(reason)) => self.switch(&reason)?,
                other => return other,
            }
        }
        let params = self.secondary_params(voice);
        self.secondary.synthesize(text, &params)
    }
}
