//! Persistent per-run timeline log.
//!
//! Every event is written and flushed as soon as it happens, so a run that
//! dies midway still leaves a readable log of the work done so far.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

const TITLE: &str = "TTS Generation Log";
const RULE_WIDTH: usize = 50;

/// A produced segment placed on the output timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineEntry {
    pub index: usize,           // Segment index
    pub content: String,        // Header line or paragraph preview
    pub header: Option<String>, // Header the segment falls under
    pub start_offset: f64,      // Seconds from the start of the track
    pub end_offset: f64,        // start_offset + duration
    pub path: PathBuf,          // Segment WAV file
}

impl TimelineEntry {
    pub fn duration(&self) -> f64 {
        self.end_offset - self.start_offset
    }
}

/// A segment whose synthesis failed without ending the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSegment {
    pub index: usize,
    pub content: String,
    pub offset: f64, // Cursor position when the segment was attempted
    pub reason: String,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Interrupted,
    Aborted(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "completed"),
            RunOutcome::Interrupted => write!(f, "interrupted"),
            RunOutcome::Aborted(reason) => write!(f, "aborted ({})", reason),
        }
    }
}

/// Final account of a run, written once as the log footer.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub total_duration: f64,        // End offset of the last produced segment
    pub total_processing_time: f64, // Wall-clock seconds spent on the run
    pub entries: Vec<TimelineEntry>,
    pub skipped: Vec<SkippedSegment>,
    pub outcome: RunOutcome,
    pub output_path: Option<PathBuf>, // Concatenated track, if one was written
}

/// Render a timeline offset as `[HH:MM:SS]`, truncated to whole seconds.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("[{:02}:{:02}:{:02}]", total / 3600, (total % 3600) / 60, total % 60)
}

/// Append-only writer for the timeline log.
pub struct TimelineLogger<W: Write> {
    writer: W,
}

impl TimelineLogger<BufWriter<File>> {
    /// Create (or truncate) the log file, creating parent directories as needed.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> TimelineLogger<W> {
    /// Wrap a writer and emit the log title.
    pub fn new(writer: W) -> io::Result<Self> {
        let mut logger = Self { writer };
        writeln!(logger.writer, "{}", TITLE)?;
        writeln!(logger.writer, "{}\n", "=".repeat(RULE_WIDTH))?;
        logger.writer.flush()?;
        Ok(logger)
    }

    /// Record a produced segment.
    pub fn append(&mut self, entry: &TimelineEntry) -> io::Result<()> {
        let start = format_timestamp(entry.start_offset);
        writeln!(self.writer, "{} {}", start, entry.content)?;
        match &entry.header {
            Some(header) => writeln!(self.writer, "{} Segment started (under header: {})", start, header)?,
            None => writeln!(self.writer, "{} Segment started", start)?,
        }
        writeln!(self.writer, "{} Segment finished (duration: {:.2}s)", format_timestamp(entry.end_offset), entry.duration())?;
        writeln!(self.writer, "  File: {}", entry.path.display())?;
        self.writer.flush()
    }

    /// Record a segment that produced no audio.
    pub fn skip(&mut self, skipped: &SkippedSegment) -> io::Result<()> {
        let at = format_timestamp(skipped.offset);
        writeln!(self.writer, "{} {}", at, skipped.content)?;
        writeln!(self.writer, "{} Segment skipped ({})", at, skipped.reason)?;
        self.writer.flush()
    }

    /// Record a free-form line at a timeline offset (section markers, run events).
    pub fn note(&mut self, offset: f64, message: &str) -> io::Result<()> {
        writeln!(self.writer, "{} {}", format_timestamp(offset), message)?;
        self.writer.flush()
    }

    /// Write the footer.
    ///
    /// # Returns
    /// The footer text as written.
    pub fn finalize(&mut self, summary: &RunSummary) -> io::Result<String> {
        let output = match &summary.output_path {
            Some(path) => path.display().to_string(),
            None => "none".to_string(),
        };

        let footer = format!(
            "\n{rule}\n\
             Total duration: {dur:.2} seconds ({min:.2} minutes)\n\
             Total processing time: {proc:.2} seconds\n\
             Segments: {produced} produced, {skipped} skipped\n\
             Status: {status}\n\
             Final output: {output}\n",
            rule = "=".repeat(RULE_WIDTH),
            dur = summary.total_duration,
            min = summary.total_duration / 60.0,
            proc = summary.total_processing_time,
            produced = summary.entries.len(),
            skipped = summary.skipped.len(),
            status = summary.outcome,
        );

        self.writer.write_all(footer.as_bytes())?;
        self.writer.flush()?;
        Ok(footer)
    }
}
