//! Kokoro model bootstrap.
//!
//! The sherpa-onnx release ships as a `.tar.bz2` archive. It is fetched once
//! into the model directory and reused by later runs.

use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::info;

use super::backend::SynthesisError;
use crate::config::LocalConfig;
use crate::config::KOKORO_MODEL_NAME;

/// Staging directory (inside the tts directory) used while extracting.
const STAGING_DIR: &str = ".download";

fn unavailable(context: &str, e: impl std::fmt::Display) -> SynthesisError {
    SynthesisError::BackendUnavailable(format!("{}: {}", context, e))
}

/// Make sure the Kokoro model files exist, downloading them if allowed.
///
/// # Errors
/// Returns `BackendUnavailable` if files are missing and cannot be fetched.
pub fn ensure_kokoro_model(config: &LocalConfig) -> Result<(), SynthesisError> {
    let missing = config.required_files().into_iter().find(|p| !p.exists());
    let Some(missing) = missing else {
        return Ok(());
    };

    if !config.auto_download {
        return Err(SynthesisError::BackendUnavailable(format!("Required model file not found: {}", missing.display())));
    }

    info!("⬇️  Downloading Kokoro model from {}", config.model_url);

    let client = reqwest::blocking::Client::builder()
        .timeout(None::<std::time::Duration>) // Archive is several hundred MB
        .build()
        .map_err(|e| unavailable("Failed to create HTTP client", e))?;

    let response = client.get(&config.model_url).send().map_err(|e| unavailable("Model download failed", e))?;
    if !response.status().is_success() {
        return Err(SynthesisError::BackendUnavailable(format!("Model download failed with HTTP {}", response.status())));
    }

    install_archive(response, &config.tts_dir())?;

    match config.required_files().into_iter().find(|p| !p.exists()) {
        Some(path) => Err(SynthesisError::BackendUnavailable(format!("Model archive did not contain {}", path.display()))),
        None => {
            info!("✅ Kokoro model installed in {}", config.kokoro_dir().display());
            Ok(())
        }
    }
}

/// Extract a `.tar.bz2` model archive into `tts_dir`.
///
/// The archive is unpacked into a staging directory first and then moved into
/// place, so an interrupted download never leaves a half-populated model dir.
pub fn install_archive(reader: impl Read, tts_dir: &Path) -> Result<(), SynthesisError> {
    let staging = tts_dir.join(STAGING_DIR);
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(|e| unavailable("Failed to clear staging directory", e))?;
    }
    fs::create_dir_all(&staging).map_err(|e| unavailable("Failed to create model directory", e))?;

    let mut archive = tar::Archive::new(bzip2::read::BzDecoder::new(reader));
    archive.unpack(&staging).map_err(|e| unavailable("Failed to extract model archive", e))?;

    let extracted = staging.join(KOKORO_MODEL_NAME);
    if !extracted.is_dir() {
        return Err(SynthesisError::BackendUnavailable(format!("Model archive has no {} directory", KOKORO_MODEL_NAME)));
    }

    let target = tts_dir.join(KOKORO_MODEL_NAME);
    if target.exists() {
        fs::remove_dir_all(&target).map_err(|e| unavailable("Failed to replace old model", e))?;
    }
    fs::rename(&extracted, &target).map_err(|e| unavailable("Failed to install model", e))?;
    fs::remove_dir_all(&staging).map_err(|e| unavailable("Failed to clean staging directory", e))?;
    Ok(())
}
