//! Sequential synthesis run.
//!
//! Drives each segment through the backend, persists its audio, places it on
//! the timeline and finally stitches all produced segments into one track.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::timeline::{RunOutcome, RunSummary, SkippedSegment, TimelineEntry, TimelineLogger};
use crate::audio::util::convert_to_mono;
use crate::audio::{Normalization, resampler, wav};
use crate::config::AppConfig;
use crate::text::Segment;
use crate::tts::{SpeechBackend, SynthesisError, SynthesisResult, VoiceParams};

/// Upper bound on the wait before retrying a timed-out segment.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(10);

/// Settings the assembler needs, resolved from the application config.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    pub sample_rate: u32,             // Output rate for segment files and the final track
    pub gap_seconds: f64,             // Silence between consecutive segments
    pub normalization: Normalization, // Per-segment level adjustment
    pub speak_headers: bool,          // Synthesize headers or log them as markers only
    pub retry_backoff: Duration,      // Wait before the single timeout retry
    pub segments_dir: PathBuf,
    pub final_output: PathBuf,
}

impl AssemblerConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sample_rate: config.output.sample_rate,
            gap_seconds: config.output.gap_seconds,
            normalization: config.output.normalization,
            speak_headers: config.output.speak_headers,
            retry_backoff: Duration::from_millis(config.output.retry_backoff_ms).min(MAX_RETRY_BACKOFF),
            segments_dir: config.paths.segments_dir.clone(),
            final_output: config.paths.final_output.clone(),
        }
    }
}

/// Runs segments through a backend and builds the timeline.
pub struct Assembler<W: Write> {
    config: AssemblerConfig,
    logger: TimelineLogger<W>,
    shutdown: Arc<AtomicBool>, // Checked before each segment
}

impl<W: Write> Assembler<W> {
    pub fn new(config: AssemblerConfig, logger: TimelineLogger<W>, shutdown: Arc<AtomicBool>) -> Self {
        Self { config, logger, shutdown }
    }

    /// Synthesize every segment in order and assemble the final track.
    ///
    /// Per-segment failures are skipped; fatal backend errors, an unwritable
    /// segment file or an interrupt stop the loop early. In every case the
    /// segments produced so far are concatenated and the log is finalized.
    ///
    /// # Errors
    /// Returns an error only if the timeline log cannot be written.
    pub fn run(&mut self, segments: &[Segment], backend: &mut dyn SpeechBackend, voice: &VoiceParams) -> io::Result<RunSummary> {
        let started = Instant::now();
        let total = segments.len();

        let mut cursor = 0.0_f64;
        let mut entries: Vec<TimelineEntry> = Vec::new();
        let mut skipped: Vec<SkippedSegment> = Vec::new();
        let mut current_header: Option<String> = None;
        let mut outcome = RunOutcome::Completed;

        // Stale files from an earlier run would not match this run's log
        match wav::remove_segment_files(&self.config.segments_dir) {
            Ok(0) => {}
            Ok(n) => debug!("Removed {} old segment files from {}", n, self.config.segments_dir.display()),
            Err(e) => warn!("⚠️  Could not clear {}: {}", self.config.segments_dir.display(), e),
        }

        for segment in segments {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!("⏹️  Interrupted before segment {}/{}", segment.index + 1, total);
                self.logger.note(cursor, &format!("Run interrupted before segment {}", segment.index))?;
                outcome = RunOutcome::Interrupted;
                break;
            }

            if segment.is_header() && !self.config.speak_headers {
                self.logger.note(cursor, &segment.content_line())?;
                current_header = Some(segment.text.clone());
                continue;
            }

            // Headers open a section; paragraphs record the section they are in
            let header = if segment.is_header() { None } else { current_header.clone() };
            if segment.is_header() {
                current_header = Some(segment.text.clone());
            }

            debug!("Synthesizing segment {}/{} (line {}): \"{}\"", segment.index + 1, total, segment.source_line, segment.text);

            let samples = match self.synthesize_with_retry(backend, &segment.text, voice).and_then(|r| self.prepare(r)) {
                Ok(samples) => samples,
                Err(e) if e.is_fatal() => {
                    error!("❌ Segment {}: {}", segment.index, e);
                    self.logger.note(cursor, &format!("Run aborted at segment {}: {}", segment.index, e))?;
                    outcome = RunOutcome::Aborted(e.to_string());
                    break;
                }
                Err(e) => {
                    warn!("⚠️  Skipping segment {}: {}", segment.index, e);
                    let skip = SkippedSegment { index: segment.index, content: segment.content_line(), offset: cursor, reason: e.to_string() };
                    self.logger.skip(&skip)?;
                    skipped.push(skip);
                    continue;
                }
            };

            let path = self.config.segments_dir.join(wav::segment_file_name(segment.index));
            if let Err(e) = wav::write_wav(&path, &samples, self.config.sample_rate) {
                error!("❌ Failed to write {}: {}", path.display(), e);
                let reason = format!("failed to write {}: {}", path.display(), e);
                self.logger.note(cursor, &format!("Run aborted at segment {}: {}", segment.index, reason))?;
                outcome = RunOutcome::Aborted(reason);
                break;
            }

            let duration = samples.len() as f64 / self.config.sample_rate as f64;
            let entry = TimelineEntry {
                index: segment.index,
                content: segment.content_line(),
                header,
                start_offset: cursor,
                end_offset: cursor + duration,
                path,
            };
            cursor = entry.end_offset + self.config.gap_seconds;

            info!("🔊 Segment {}/{}: {:.2}s", entry.index + 1, total, entry.duration());
            self.logger.append(&entry)?;
            entries.push(entry);
        }

        let output_path = self.concatenate(&entries, cursor, &mut outcome)?;

        let summary = RunSummary {
            total_duration: entries.last().map_or(0.0, |e| e.end_offset),
            total_processing_time: started.elapsed().as_secs_f64(),
            entries,
            skipped,
            outcome,
            output_path,
        };
        self.logger.finalize(&summary)?;
        Ok(summary)
    }

    /// Call the backend, retrying once after a timeout.
    fn synthesize_with_retry(&self, backend: &mut dyn SpeechBackend, text: &str, voice: &VoiceParams) -> Result<SynthesisResult, SynthesisError> {
        match backend.synthesize(text, voice) {
            Err(e) if e.is_retryable() => {
                warn!("⏳ {}, retrying in {:?}", e, self.config.retry_backoff);
                thread::sleep(self.config.retry_backoff);
                backend.synthesize(text, voice)
            }
            other => other,
        }
    }

    /// Down-mix, resample and normalize backend output for the track.
    fn prepare(&self, result: SynthesisResult) -> Result<Vec<f32>, SynthesisError> {
        debug!("Backend returned {:.2}s at {} Hz ({} ch)", result.duration_secs(), result.sample_rate, result.channels);
        let mono = if result.channels > 1 { convert_to_mono(&result.samples, result.channels as usize) } else { result.samples };

        let mut samples = resampler::resample(&mono, result.sample_rate, self.config.sample_rate).map_err(|e| SynthesisError::Failed(e.to_string()))?;
        if samples.is_empty() {
            return Err(SynthesisError::Failed("backend returned empty audio".to_string()));
        }

        let gain = self.config.normalization.apply(&mut samples);
        debug!("Normalization gain: {:.3}", gain);
        Ok(samples)
    }

    /// Join produced segment files into the final track.
    fn concatenate(&mut self, entries: &[TimelineEntry], cursor: f64, outcome: &mut RunOutcome) -> io::Result<Option<PathBuf>> {
        if entries.is_empty() {
            warn!("No segments produced, final track not written");
            self.logger.note(cursor, "No segments produced, final track not written")?;
            return Ok(None);
        }

        let inputs: Vec<PathBuf> = entries.iter().map(|e| e.path.clone()).collect();
        match wav::concatenate(&inputs, &self.config.final_output, self.config.sample_rate, self.config.gap_seconds) {
            Ok(frames) => {
                info!("💾 Wrote {} ({} segments, {} frames)", self.config.final_output.display(), inputs.len(), frames);
                Ok(Some(self.config.final_output.clone()))
            }
            Err(e) => {
                error!("❌ Failed to write final track: {}", e);
                let reason = format!("failed to write final track: {}", e);
                self.logger.note(cursor, &reason)?;
                if *outcome == RunOutcome::Completed {
                    *outcome = RunOutcome::Aborted(reason);
                }
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::audio::NormalizationMode;
    use crate::text::{SegmentationConfig, segment};

    const RATE: u32 = 1000;

    /// Backend replaying a scripted list of results, then one second of tone.
    struct Scripted {
        script: VecDeque<Result<SynthesisResult, SynthesisError>>,
        calls: Vec<String>,
    }

    impl Scripted {
        fn new(script: Vec<Result<SynthesisResult, SynthesisError>>) -> Self {
            Self { script: script.into(), calls: Vec::new() }
        }
    }

    impl SpeechBackend for Scripted {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        fn check_voice(&mut self, _voice: &VoiceParams) -> Result<(), SynthesisError> {
            Ok(())
        }

        fn synthesize(&mut self, text: &str, _voice: &VoiceParams) -> Result<SynthesisResult, SynthesisError> {
            self.calls.push(text.to_string());
            self.script.pop_front().unwrap_or_else(|| Ok(tone(1.0)))
        }
    }

    fn tone(seconds: f64) -> SynthesisResult {
        let frames = (seconds * RATE as f64) as usize;
        SynthesisResult::mono((0..frames).map(|i| if i % 2 == 0 { 0.25 } else { -0.25 }).collect(), RATE)
    }

    fn voice() -> VoiceParams {
        VoiceParams { voice: "test".to_string(), speed: 1.0 }
    }

    fn config(dir: &std::path::Path) -> AssemblerConfig {
        AssemblerConfig {
            sample_rate: RATE,
            gap_seconds: 0.5,
            normalization: Normalization { mode: NormalizationMode::None, target: 1.0 },
            speak_headers: true,
            retry_backoff: Duration::ZERO,
            segments_dir: dir.join("segments"),
            final_output: dir.join("output.wav"),
        }
    }

    fn run(config: AssemblerConfig, text: &str, backend: &mut Scripted, interrupted: bool) -> (RunSummary, String) {
        let segments = segment(text, &SegmentationConfig::default()).unwrap();
        let mut buf = Vec::new();
        let summary = {
            let logger = TimelineLogger::new(&mut buf).unwrap();
            let mut assembler = Assembler::new(config, logger, Arc::new(AtomicBool::new(interrupted)));
            assembler.run(&segments, backend, &voice()).unwrap()
        };
        (summary, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn test_total_duration_includes_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![Ok(tone(1.0)), Ok(tone(0.5)), Ok(tone(0.25))]);

        let (summary, log) = run(config(dir.path()), "# Title\n\nHello world. This is a test.", &mut backend, false);

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.entries.len(), 3);
        assert_eq!(summary.total_duration, 1.0 + 0.5 + 0.25 + 2.0 * 0.5);
        assert_eq!(summary.entries[1].start_offset, 1.5);
        assert_eq!(summary.entries[2].start_offset, 2.5);
        assert_eq!(summary.entries[1].header.as_deref(), Some("Title"));
        assert!(summary.entries[0].header.is_none());

        let (samples, rate) = wav::read_wav(&dir.path().join("output.wav")).unwrap();
        assert_eq!(rate, RATE);
        assert_eq!(samples.len(), 2750);
        assert!(dir.path().join("segments").join("segment_0002.wav").exists());

        assert!(log.contains("[00:00:00] # Title\n"));
        assert!(log.contains("[00:00:01] Segment started (under header: Title)\n"));
        assert!(log.contains("Status: completed"));
    }

    #[test]
    fn test_offsets_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![Ok(tone(0.3)), Ok(tone(1.2)), Ok(tone(0.7)), Ok(tone(0.1))]);

        let (summary, _) = run(config(dir.path()), "One. Two! Three? Four.", &mut backend, false);

        for pair in summary.entries.windows(2) {
            assert!(pair[0].start_offset <= pair[0].end_offset);
            assert!(pair[1].start_offset >= pair[0].end_offset);
        }
    }

    #[test]
    fn test_failed_segment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![Ok(tone(1.0)), Err(SynthesisError::Failed("HTTP 500".into())), Ok(tone(1.0))]);
        // Artifact from an earlier run at the index that will be skipped
        let stale = dir.path().join("segments").join("segment_0001.wav");
        wav::write_wav(&stale, &[0.5; 10], RATE).unwrap();

        let (summary, log) = run(config(dir.path()), "One. Two. Three.", &mut backend, false);

        assert_eq!(summary.outcome, RunOutcome::Completed);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].index, 1);
        // Skipped segment leaves the cursor where it was
        assert_eq!(summary.entries[1].start_offset, 1.5);
        assert_eq!(summary.total_duration, 2.5);
        assert!(!dir.path().join("segments").join("segment_0001.wav").exists());
        assert!(log.contains("[00:00:01] Segment skipped (synthesis failed: HTTP 500)"));
        assert!(log.contains("Segments: 2 produced, 1 skipped"));
    }

    #[test]
    fn test_backend_unavailable_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![Ok(tone(1.0)), Ok(tone(2.0)), Err(SynthesisError::BackendUnavailable("model gone".into()))]);

        let (summary, log) = run(config(dir.path()), "A one. B two. C three. D four. E five.", &mut backend, false);

        assert!(matches!(summary.outcome, RunOutcome::Aborted(_)));
        assert_eq!(backend.calls.len(), 3);
        assert_eq!(summary.entries.len(), 2);
        assert_eq!((summary.entries[0].start_offset, summary.entries[0].end_offset), (0.0, 1.0));
        assert_eq!((summary.entries[1].start_offset, summary.entries[1].end_offset), (1.5, 3.5));
        assert_eq!(summary.total_duration, 3.5);
        assert_eq!(summary.output_path.as_deref(), Some(dir.path().join("output.wav").as_path()));
        assert!(log.contains("Total duration: 3.50 seconds"));
        assert!(log.contains("Segments: 2 produced, 0 skipped"));
        assert!(log.contains("Status: aborted (TTS backend unavailable: model gone)"));
    }

    #[test]
    fn test_timeout_retried_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![Err(SynthesisError::Timeout("slow".into())), Ok(tone(1.0))]);

        let (summary, _) = run(config(dir.path()), "Only one.", &mut backend, false);

        assert_eq!(backend.calls.len(), 2);
        assert_eq!(summary.entries.len(), 1);
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn test_repeated_timeout_skips() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![Err(SynthesisError::Timeout("slow".into())), Err(SynthesisError::Timeout("slow".into()))]);

        let (summary, _) = run(config(dir.path()), "First. Second.", &mut backend, false);

        assert_eq!(backend.calls.len(), 3);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].start_offset, 0.0);
        assert_eq!(summary.outcome, RunOutcome::Completed);
    }

    #[test]
    fn test_interrupt_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = Scripted::new(vec![]);

        let (summary, log) = run(config(dir.path()), "First. Second.", &mut backend, true);

        assert_eq!(summary.outcome, RunOutcome::Interrupted);
        assert!(backend.calls.is_empty());
        assert!(summary.output_path.is_none());
        assert!(!dir.path().join("output.wav").exists());
        assert!(log.contains("No segments produced"));
        assert!(log.contains("Status: interrupted"));
    }

    #[test]
    fn test_unspoken_headers_are_markers() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.speak_headers = false;
        let mut backend = Scripted::new(vec![]);

        let (summary, log) = run(cfg, "# Title\n\nHello world.", &mut backend, false);

        assert_eq!(backend.calls, vec!["Hello world.".to_string()]);
        assert_eq!(summary.entries.len(), 1);
        assert_eq!(summary.entries[0].index, 1);
        assert!(log.contains("[00:00:00] # Title\n[00:00:00] Hello world.\n[00:00:00] Segment started (under header: Title)"));
    }

    #[test]
    fn test_stereo_output_is_resampled_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.normalization = Normalization::default();
        let stereo = SynthesisResult { samples: vec![0.2; 2 * 4000], channels: 2, sample_rate: 2 * RATE };
        let mut backend = Scripted::new(vec![Ok(stereo)]);

        let (summary, _) = run(cfg, "Loud enough.", &mut backend, false);

        assert_eq!(summary.entries[0].duration(), 2.0);
        let (samples, _) = wav::read_wav(&summary.entries[0].path).unwrap();
        assert_eq!(samples.len(), 2000);
        let loudest = samples.iter().fold(0.0_f32, |m, s| m.max(s.abs()));
        assert!(loudest > 0.9);
    }
}
