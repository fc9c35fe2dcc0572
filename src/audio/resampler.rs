//! Audio resampling using the rubato FFT-based resampler.
//!
//! Backends declare their own sample rates (24 kHz for Kokoro, whatever PCM rate
//! the cloud API returns); every segment is brought to the output rate before it
//! is persisted so the final track can be concatenated sample-for-sample.

use anyhow::{Context, Result};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{Fft, FixedSync, Resampler};

/// Chunk size for FFT-based resampling (provides good quality and performance).
const CHUNK_SIZE: usize = 1024;

/// Number of sub-chunks for FFT processing (higher = better quality but more CPU).
const SUB_CHUNKS: usize = 2;

/// Number of output frames a clip of `frames` input frames maps to.
pub fn output_len(frames: usize, from_rate: u32, to_rate: u32) -> usize {
    (frames as f64 * to_rate as f64 / from_rate as f64).round() as usize
}

/// Resample mono audio from one sample rate to another.
///
/// The result always holds exactly `output_len(samples.len(), from_rate, to_rate)`
/// frames, so segment durations stay exact after conversion.
///
/// # Arguments
/// * `samples` - Mono input samples
/// * `from_rate` - Input sample rate (e.g., 24000 for Kokoro)
/// * `to_rate` - Output sample rate (e.g., 22050 for the final track)
///
/// # Errors
/// Returns an error if the resampler cannot be built or fails mid-stream.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Fft::<f32>::new(
        from_rate as usize,
        to_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        1, // mono
        FixedSync::Input,
    )
    .context("Failed to create resampler")?;

    let output_frames_max = resampler.output_frames_max();
    let mut output_buffer = vec![0.0f32; output_frames_max];

    let expected_len = output_len(samples.len(), from_rate, to_rate);
    let mut output = Vec::with_capacity(expected_len + CHUNK_SIZE);

    // Feed one extra silent chunk so the resampler's delay line drains fully
    let padded_len = samples.len().div_ceil(CHUNK_SIZE) * CHUNK_SIZE + CHUNK_SIZE;
    let mut input = samples.to_vec();
    input.resize(padded_len, 0.0);

    for chunk in input.chunks(CHUNK_SIZE) {
        let input_adapter = InterleavedSlice::new(chunk, 1, CHUNK_SIZE).context("Failed to create input adapter")?;
        let mut output_adapter = InterleavedSlice::new_mut(&mut output_buffer, 1, output_frames_max).context("Failed to create output adapter")?;

        let (_, frames_written) = resampler
            .process_into_buffer(&input_adapter, &mut output_adapter, None)
            .map_err(|e| anyhow::anyhow!("Resampling error: {}", e))?;
        output.extend_from_slice(&output_buffer[..frames_written]);
    }

    // Drop the filter delay from the front and pin the length
    let delay = resampler.output_delay().min(output.len());
    output.drain(..delay);
    output.resize(expected_len, 0.0);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_upsampling() {
        let samples = vec![0.0; 16000]; // 1 second at 16kHz
        let result = resample(&samples, 16000, 48000).unwrap();
        assert_eq!(result.len(), 48000);
    }

    #[test]
    fn test_resample_downsampling() {
        let samples = vec![0.0; 24000]; // 1 second at 24kHz
        let result = resample(&samples, 24000, 22050).unwrap();
        assert_eq!(result.len(), 22050);
    }

    #[test]
    fn test_same_rate_is_copy() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&samples, 24000, 24000).unwrap(), samples);
    }

    #[test]
    fn test_output_len() {
        assert_eq!(output_len(24000, 24000, 16000), 16000);
        assert_eq!(output_len(3, 2, 3), 5);
    }
}
