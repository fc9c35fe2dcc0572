//! Text-to-speech module.
//!
//! A single `SpeechBackend` interface with two engines: Kokoro running locally
//! through sherpa-rs (feature `local`) and the ElevenLabs cloud API.

mod backend;
mod cloud;
mod fallback;
#[cfg(feature = "local")]
mod local;
#[cfg_attr(not(feature = "local"), allow(dead_code))]
mod models;

pub use backend::{SpeechBackend, SynthesisError, SynthesisResult, VoiceParams};

use tracing::warn;

use crate::config::{AppConfig, Engine};
use cloud::CloudBackend;
use fallback::FallbackBackend;

/// Create one engine.
///
/// # Errors
/// Returns `BackendUnavailable` if the engine cannot be constructed in this build.
fn create_engine(engine: Engine, config: &AppConfig, debug: bool) -> Result<Box<dyn SpeechBackend>, SynthesisError> {
    match engine {
        #[cfg(feature = "local")]
        Engine::Local => Ok(Box::new(local::LocalBackend::new(config, debug))),
        #[cfg(not(feature = "local"))]
        Engine::Local => {
            let _ = debug;
            Err(SynthesisError::BackendUnavailable("this build does not include the local engine (rebuild with `--features local`)".to_string()))
        }
        Engine::Cloud => Ok(Box::new(CloudBackend::new(&config.tts.cloud, config.output.sample_rate)?)),
    }
}

/// Create the configured backend, wrapped with its fallback if one is set.
///
/// # Returns
/// The backend and the voice parameters to use with it.
///
/// # Errors
/// Returns `BackendUnavailable` if neither engine can be constructed.
pub fn create_backend(config: &AppConfig, debug: bool) -> Result<(Box<dyn SpeechBackend>, VoiceParams), SynthesisError> {
    let primary_voice = config.voice_params(config.tts.engine);

    let Some(fallback) = config.tts.fallback else {
        return Ok((create_engine(config.tts.engine, config, debug)?, primary_voice));
    };

    let fallback_voice = config.voice_params(fallback);
    let secondary = create_engine(fallback, config, debug)?;

    match create_engine(config.tts.engine, config, debug) {
        Ok(primary) => Ok((Box::new(FallbackBackend::new(primary, secondary, fallback_voice)), primary_voice)),
        Err(SynthesisError::BackendUnavailable(reason)) => {
            warn!("⚠️  {} engine unavailable ({}), using {} engine", config.tts.engine, reason, fallback);
            Ok((secondary, fallback_voice))
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_backend_created() {
        let mut config = AppConfig::default();
        config.tts.engine = Engine::Cloud;
        config.tts.cloud.api_key = "key".to_string();
        config.voice.name = Some("voice-123".to_string());

        let (backend, voice) = create_backend(&config, false).unwrap();
        assert!(backend.name().starts_with("ElevenLabs"));
        assert_eq!(voice.voice, "voice-123");
    }

    #[cfg(not(feature = "local"))]
    #[test]
    fn test_local_engine_falls_back_to_cloud_when_not_built() {
        let mut config = AppConfig::default();
        config.tts.engine = Engine::Local;
        config.tts.fallback = Some(Engine::Cloud);
        config.tts.cloud.api_key = "key".to_string();

        let (backend, voice) = create_backend(&config, false).unwrap();
        assert!(backend.name().starts_with("ElevenLabs"));
        assert_eq!(voice.voice, config.tts.cloud.voice_id);

        config.tts.fallback = None;
        assert!(matches!(create_backend(&config, false), Err(SynthesisError::BackendUnavailable(_))));
    }
}
