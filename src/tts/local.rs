//! Local text-to-speech using Kokoro models through sherpa-rs.

use sherpa_rs::OnnxConfig;
use sherpa_rs::tts::{CommonTtsConfig, KokoroTts, KokoroTtsConfig};
use tracing::{debug, info};

use super::backend::{SpeechBackend, SynthesisError, SynthesisResult, VoiceParams};
use super::models;
use crate::config::voices::{self, Voice};
use crate::config::{AppConfig, LocalConfig, Provider};

/// Rate assumed when sherpa reports none (Kokoro v1.0 runs at 24 kHz).
const KOKORO_SAMPLE_RATE: u32 = 24000;

/// Kokoro engine created lazily for the voice in use.
pub struct LocalBackend {
    config: LocalConfig,                   // Model paths and download settings
    provider: Provider,                    // ONNX execution provider
    threads: usize,                        // Inference threads
    debug: bool,                           // sherpa-onnx debug output
    loaded: Option<(&'static str, KokoroTts)>, // Engine and the voice it was built for
}

impl LocalBackend {
    /// Create a backend; the model is not touched until first use.
    pub fn new(config: &AppConfig, debug: bool) -> Self {
        Self {
            config: config.tts.local.clone(),
            provider: config.effective_provider(),
            threads: config.tts.threads.max(1),
            debug,
            loaded: None,
        }
    }

    fn resolve_voice(name: &str) -> Result<&'static Voice, SynthesisError> {
        voices::get_voice(name).ok_or_else(|| SynthesisError::InvalidVoice(name.to_string()))
    }

    /// Build the Kokoro engine for a voice, downloading the model if needed.
    ///
    /// The lexicon/language settings depend on the voice, so a different voice
    /// rebuilds the engine.
    fn ensure_loaded(&mut self, voice: &'static Voice) -> Result<&mut KokoroTts, SynthesisError> {
        let reload = !matches!(&self.loaded, Some((name, _)) if *name == voice.name);

        if reload {
            models::ensure_kokoro_model(&self.config)?;

            info!("Initializing Kokoro TTS with {} provider ({} threads)", self.provider, self.threads);
            info!("TTS voice: {} (speaker ID: {})", voice.name, voice.speaker_id);

            let tts_config = KokoroTtsConfig {
                model: self.config.model_path().to_string_lossy().to_string(),
                voices: self.config.voices_path().to_string_lossy().to_string(),
                tokens: self.config.tokens_path().to_string_lossy().to_string(),
                data_dir: self.config.data_dir().to_string_lossy().to_string(),
                dict_dir: self.config.dict_dir().to_string_lossy().to_string(),
                lexicon: self.config.lexicon(voice), // Lexicon files for English/Chinese voices
                lang: voice.lang().to_string(),      // For non-English voices without lexicon
                length_scale: 1.0,                   // Speed is passed per request
                onnx_config: OnnxConfig {
                    provider: self.provider.as_sherpa_provider().to_string(),
                    num_threads: self.threads.try_into().unwrap_or(2),
                    debug: self.debug,
                },
                common_config: CommonTtsConfig { max_num_sentences: 1, ..Default::default() }, // Kokoro only supports 1
            };

            self.loaded = Some((voice.name, KokoroTts::new(tts_config)));
        }

        match self.loaded.as_mut() {
            Some((_, tts)) => Ok(tts),
            None => Err(SynthesisError::BackendUnavailable("Kokoro engine failed to load".to_string())),
        }
    }
}

impl SpeechBackend for LocalBackend {
    fn name(&self) -> String {
        match &self.loaded {
            Some((voice, _)) => format!("Kokoro ({})", voice),
            None => "Kokoro".to_string(),
        }
    }

    fn check_voice(&mut self, voice: &VoiceParams) -> Result<(), SynthesisError> {
        let resolved = Self::resolve_voice(&voice.voice)?;
        self.ensure_loaded(resolved)?;
        Ok(())
    }

    fn validate_voice(&mut self, voice: &VoiceParams) -> Result<(), SynthesisError> {
        Self::resolve_voice(&voice.voice).map(|_| ())
    }

    fn synthesize(&mut self, text: &str, voice: &VoiceParams) -> Result<SynthesisResult, SynthesisError> {
        let resolved = Self::resolve_voice(&voice.voice)?;
        let speaker_id = resolved.speaker_id;
        let tts = self.ensure_loaded(resolved)?;

        debug!("Synthesizing with Kokoro: \"{}\"", text);

        let audio = tts.create(text, speaker_id, voice.speed).map_err(|e| SynthesisError::Failed(format!("Kokoro generation failed: {}", e)))?;

        if audio.samples.is_empty() {
            return Err(SynthesisError::Failed("Kokoro returned no audio".to_string()));
        }

        let sample_rate = declared_rate(audio.sample_rate);
        debug!("Generated {} samples at {} Hz", audio.samples.len(), sample_rate);
        Ok(SynthesisResult::mono(audio.samples, sample_rate))
    }
}

/// Sample rate reported by sherpa, or the Kokoro default when it reports none.
fn declared_rate<T>(rate: T) -> u32
where
    u32: TryFrom<T>,
{
    u32::try_from(rate).ok().filter(|r| *r > 0).unwrap_or(KOKORO_SAMPLE_RATE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_rate() {
        assert_eq!(declared_rate(22050_u32), 22050);
        assert_eq!(declared_rate(0_u32), KOKORO_SAMPLE_RATE);
        assert_eq!(declared_rate(-1_i32), KOKORO_SAMPLE_RATE);
    }

    #[test]
    fn test_voice_validated_without_model() {
        let mut config = AppConfig::default();
        config.tts.local.model_dir = std::path::PathBuf::from("/nonexistent/models");
        config.tts.local.auto_download = false;
        let mut backend = LocalBackend::new(&config, false);

        let known = VoiceParams { voice: "bf_emma".to_string(), speed: 1.0 };
        let unknown = VoiceParams { voice: "xx_nobody".to_string(), speed: 1.0 };
        assert!(backend.validate_voice(&known).is_ok());
        assert!(matches!(backend.validate_voice(&unknown), Err(SynthesisError::InvalidVoice(_))));
        assert!(matches!(backend.check_voice(&known), Err(SynthesisError::BackendUnavailable(_))));
    }
}
