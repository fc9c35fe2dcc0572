//! ElevenLabs text-to-speech over HTTPS.
//!
//! Audio is requested as raw 16-bit little-endian PCM so no decoder is needed.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::json;
use tracing::{debug, info, warn};

use super::backend::{SpeechBackend, SynthesisError, SynthesisResult, VoiceParams};
use crate::config::CloudConfig;

/// PCM sample rates the API can return.
const PCM_RATES: [u32; 6] = [8000, 16000, 22050, 24000, 44100, 48000];

/// Rate requested when the output rate is not offered by the API.
const DEFAULT_PCM_RATE: u32 = 24000;

/// Speed range accepted by the API's voice settings.
const SPEED_RANGE: (f32, f32) = (0.7, 1.2);

/// ElevenLabs API client.
pub struct CloudBackend {
    client: Client,      // Blocking HTTP client with request timeout
    config: CloudConfig, // API key, model and voice settings
    sample_rate: u32,    // PCM rate requested from the API
}

impl CloudBackend {
    /// Create a new ElevenLabs backend.
    ///
    /// # Arguments
    /// * `config` - Cloud engine settings
    /// * `preferred_rate` - Output sample rate; requested directly when supported
    ///
    /// # Errors
    /// Returns `BackendUnavailable` if the HTTP client cannot be created.
    pub fn new(config: &CloudConfig, preferred_rate: u32) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| SynthesisError::BackendUnavailable(format!("Failed to create HTTP client: {}", e)))?;

        let sample_rate = if PCM_RATES.contains(&preferred_rate) { preferred_rate } else { DEFAULT_PCM_RATE };
        info!("ElevenLabs TTS initialized (model {}, pcm_{})", config.model_id, sample_rate);

        Ok(Self { client, config: config.clone(), sample_rate })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

impl SpeechBackend for CloudBackend {
    fn name(&self) -> String {
        format!("ElevenLabs ({})", self.config.model_id)
    }

    fn check_voice(&mut self, voice: &VoiceParams) -> Result<(), SynthesisError> {
        let url = self.endpoint(&format!("voices/{}", urlencoding::encode(&voice.voice)));
        debug!("Checking voice at {}", url);

        let response = self.client.get(&url).header("xi-api-key", &self.config.api_key).send().map_err(|e| match classify_request_error(e) {
            // A pre-check that cannot complete means the service is unusable
            SynthesisError::Timeout(msg) | SynthesisError::Failed(msg) => SynthesisError::BackendUnavailable(msg),
            other => other,
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match classify_status(status, &voice.voice) {
            SynthesisError::Failed(msg) => Err(SynthesisError::BackendUnavailable(msg)),
            other => Err(other),
        }
    }

    fn synthesize(&mut self, text: &str, voice: &VoiceParams) -> Result<SynthesisResult, SynthesisError> {
        let url = format!("{}?output_format=pcm_{}", self.endpoint(&format!("text-to-speech/{}", urlencoding::encode(&voice.voice))), self.sample_rate);

        let speed = voice.speed.clamp(SPEED_RANGE.0, SPEED_RANGE.1);
        if speed != voice.speed {
            warn!("ElevenLabs speed limited to {} (requested {})", speed, voice.speed);
        }

        let body = json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
                "speed": speed
            }
        });

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header("Accept", "audio/pcm")
            .json(&body)
            .send()
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &voice.voice));
        }

        let bytes = response.bytes().map_err(classify_request_error)?;
        let samples = decode_pcm16(&bytes)?;
        debug!("Received {} samples from ElevenLabs", samples.len());

        Ok(SynthesisResult::mono(samples, self.sample_rate))
    }
}

/// Map a transport error to the synthesis error taxonomy.
fn classify_request_error(e: reqwest::Error) -> SynthesisError {
    if e.is_timeout() {
        SynthesisError::Timeout(e.to_string())
    } else if e.is_connect() {
        SynthesisError::BackendUnavailable(format!("Cannot reach ElevenLabs: {}", e))
    } else {
        SynthesisError::Failed(e.to_string())
    }
}

/// Map an unsuccessful HTTP status to the synthesis error taxonomy.
fn classify_status(status: StatusCode, voice: &str) -> SynthesisError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SynthesisError::BackendUnavailable(format!("ElevenLabs rejected the API key (HTTP {})", status)),
        StatusCode::NOT_FOUND => SynthesisError::InvalidVoice(voice.to_string()),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => SynthesisError::Timeout(format!("HTTP {}", status)),
        _ => SynthesisError::Failed(format!("ElevenLabs returned HTTP {}", status)),
    }
}

/// Decode 16-bit little-endian PCM into f32 samples.
///
/// # Errors
/// Returns `Failed` for an empty or truncated payload.
pub fn decode_pcm16(bytes: &[u8]) -> Result<Vec<f32>, SynthesisError> {
    if bytes.is_empty() {
        return Err(SynthesisError::Failed("ElevenLabs returned no audio".to_string()));
    }
    if bytes.len() % 2 != 0 {
        return Err(SynthesisError::Failed(format!("Truncated PCM payload ({} bytes)", bytes.len())));
    }
    Ok(bytes.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pcm16() {
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0x80];
        let samples = decode_pcm16(&bytes).unwrap();
        assert_eq!(samples, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_decode_rejects_bad_payloads() {
        assert!(matches!(decode_pcm16(&[]), Err(SynthesisError::Failed(_))));
        assert!(matches!(decode_pcm16(&[1, 2, 3]), Err(SynthesisError::Failed(_))));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(classify_status(StatusCode::UNAUTHORIZED, "v"), SynthesisError::BackendUnavailable(_)));
        assert!(matches!(classify_status(StatusCode::NOT_FOUND, "v"), SynthesisError::InvalidVoice(ref v) if v == "v"));
        assert!(matches!(classify_status(StatusCode::GATEWAY_TIMEOUT, "v"), SynthesisError::Timeout(_)));
        assert!(matches!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "v"), SynthesisError::Failed(_)));
    }

    #[test]
    fn test_sample_rate_selection() {
        let config = CloudConfig::default();
        assert_eq!(CloudBackend::new(&config, 22050).unwrap().sample_rate, 22050);
        assert_eq!(CloudBackend::new(&config, 32000).unwrap().sample_rate, DEFAULT_PCM_RATE);
    }

    #[test]
    fn test_unreachable_service() {
        let config = CloudConfig { base_url: "http://127.0.0.1:9".to_string(), api_key: "k".to_string(), timeout_secs: 2, ..Default::default() };
        let mut backend = CloudBackend::new(&config, 24000).unwrap();
        let voice = VoiceParams { voice: "abc".to_string(), speed: 1.0 };
        assert!(matches!(backend.check_voice(&voice), Err(SynthesisError::BackendUnavailable(_))));
    }
}
