//! WAV artifacts: per-segment files and the concatenated track.
//!
//! Everything is written as 16-bit PCM mono at the configured output rate.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

fn pcm16_spec(sample_rate: u32) -> WavSpec {
    WavSpec { channels: 1, sample_rate, bits_per_sample: 16, sample_format: SampleFormat::Int }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

/// File name of a segment artifact, zero-padded by index.
pub fn segment_file_name(index: usize) -> String {
    format!("segment_{:04}.wav", index)
}

/// Delete segment files left in `dir` by an earlier run.
///
/// # Returns
/// Number of files removed (0 when the directory does not exist yet).
pub fn remove_segment_files(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry?.path();
        let is_segment = path.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.starts_with("segment_") && n.ends_with(".wav"));
        if is_segment && path.is_file() {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write mono f32 samples as a 16-bit PCM WAV file.
///
/// # Errors
/// Returns an error if the file cannot be created or written.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), hound::Error> {
    ensure_parent(path)?;
    let mut writer = WavWriter::create(path, pcm16_spec(sample_rate))?;
    for &sample in samples {
        writer.write_sample(to_pcm16(sample))?;
    }
    writer.finalize()
}

#[cfg(test)]
/// Read a mono 16-bit WAV file back as f32 samples.
///
/// # Returns
/// Samples and the file's sample rate.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), hound::Error> {
    let mut reader = WavReader::open(path)?;
    let sample_rate = reader.spec().sample_rate;
    let samples = reader.samples::<i16>().map(|s| s.map(|v| v as f32 / i16::MAX as f32)).collect::<Result<Vec<_>, _>>()?;
    Ok((samples, sample_rate))
}

/// Concatenate segment files into one track with silence between them.
///
/// Inputs are streamed one at a time so memory use does not grow with the
/// document length.
///
/// # Arguments
/// * `inputs` - Segment files in playback order
/// * `output` - Destination WAV file
/// * `sample_rate` - Rate shared by every input and the output
/// * `gap_seconds` - Silence inserted between consecutive inputs
///
/// # Returns
/// Total number of frames written.
///
/// # Errors
/// Returns an error on I/O failure or if an input has a different format.
pub fn concatenate(inputs: &[PathBuf], output: &Path, sample_rate: u32, gap_seconds: f64) -> Result<u64, hound::Error> {
    ensure_parent(output)?;
    let spec = pcm16_spec(sample_rate);
    let gap_frames = (gap_seconds.max(0.0) * sample_rate as f64).round() as u64;

    let mut writer = WavWriter::create(output, spec)?;
    let mut frames = 0u64;

    for (i, input) in inputs.iter().enumerate() {
        if i > 0 {
            for _ in 0..gap_frames {
                writer.write_sample(0i16)?;
            }
            frames += gap_frames;
        }

        let mut reader = WavReader::open(input)?;
        if reader.spec() != spec {
            return Err(hound::Error::IoError(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} does not match the output format ({:?})", input.display(), reader.spec()),
            )));
        }

        for sample in reader.samples::<i16>() {
            writer.write_sample(sample?)?;
            frames += 1;
        }
        debug!("Appended {}", input.display());
    }

    writer.finalize()?;
    Ok(frames)
}
