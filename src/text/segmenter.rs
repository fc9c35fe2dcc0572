//! Markdown-aware text segmenter.
//!
//! Headers (`#` to `######`) always become their own segment. Every other run of
//! non-blank lines forms a paragraph block, which is split at sentence-ending
//! punctuation and regrouped according to the configured length limits.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Markdown header: 1-6 `#` followed by whitespace and some text.
static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(\S.*)$").expect("valid header pattern"));

/// Sentence boundary: a run of `.`, `!` or `?` followed by whitespace.
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([.!?]+)\s+").expect("valid sentence pattern"));

/// Number of characters shown for paragraph content in the timeline log.
const PREVIEW_CHARS: usize = 60;

/// Logical role of a segment in the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Markdown header with its nesting depth (1-6)
    Header { level: u8 },
    /// Sentence or group of sentences from a paragraph block
    Paragraph,
}

/// An atomic unit of text submitted to synthesis as one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,       // 0-based, contiguous
    pub kind: SegmentKind,  // Header or paragraph
    pub text: String,       // Non-empty, trimmed
    pub source_line: usize, // 1-based line where the segment starts
}

impl Segment {
    /// Whether this segment is a markdown header.
    pub fn is_header(&self) -> bool {
        matches!(self.kind, SegmentKind::Header { .. })
    }

    /// Human-readable content line used by the timeline log.
    ///
    /// Headers are rendered back with their `#` prefix; paragraphs are
    /// truncated to a short preview.
    pub fn content_line(&self) -> String {
        match self.kind {
            SegmentKind::Header { level } => format!("{} {}", "#".repeat(level as usize), self.text),
            SegmentKind::Paragraph => preview(&self.text, PREVIEW_CHARS),
        }
    }
}

/// Options controlling how paragraph blocks are cut into segments.
#[derive(Debug, Clone)]
pub struct SegmentationConfig {
    /// Treat `#` lines as headers (otherwise they are plain paragraph text)
    pub split_by_headers: bool,
    /// Sentences shorter than this are merged with the next sentence of the block
    pub min_segment_length: usize,
    /// Merging stops once a segment would exceed this many characters.
    /// A single sentence longer than the limit is kept whole.
    pub max_segment_length: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { split_by_headers: true, min_segment_length: 0, max_segment_length: 300 }
    }
}

/// Segmentation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("input text is empty")]
    EmptyInput,
}

/// Split a document into ordered header and paragraph segments.
///
/// # Arguments
/// * `text` - Raw document text (markdown-style headers are recognized)
/// * `config` - Segmentation options
///
/// # Returns
/// Segments in source order with `index` assigned from 0.
///
/// # Errors
/// Returns `SegmentError::EmptyInput` if the text is blank after trimming.
pub fn segment(text: &str, config: &SegmentationConfig) -> Result<Vec<Segment>, SegmentError> {
    if text.trim().is_empty() {
        return Err(SegmentError::EmptyInput);
    }

    let mut segments = Vec::new();
    let mut block: Vec<(usize, &str)> = Vec::new();

    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.trim();

        if line.is_empty() {
            flush_block(&mut segments, &mut block, config);
            continue;
        }

        if config.split_by_headers
            && let Some(caps) = HEADER_PATTERN.captures(line)
        {
            flush_block(&mut segments, &mut block, config);
            let level = caps[1].len() as u8;
            push_segment(&mut segments, SegmentKind::Header { level }, caps[2].trim().to_string(), line_no);
            continue;
        }

        block.push((line_no, line));
    }

    flush_block(&mut segments, &mut block, config);
    Ok(segments)
}

/// Split a paragraph block into sentences and emit the regrouped segments.
fn flush_block(segments: &mut Vec<Segment>, block: &mut Vec<(usize, &str)>, config: &SegmentationConfig) {
    if block.is_empty() {
        return;
    }

    // Join lines with a single space, remembering where each source line starts
    let mut joined = String::new();
    let mut line_starts = Vec::with_capacity(block.len());
    for (line_no, line) in block.iter() {
        if !joined.is_empty() {
            joined.push(' ');
        }
        line_starts.push((joined.len(), *line_no));
        joined.push_str(line);
    }
    block.clear();

    let mut sentences = split_sentences(&joined);
    if config.split_by_headers {
        sentences = attach_header_lookalikes(&joined, sentences);
    }

    for (offset, text) in group_sentences(sentences, config) {
        let line_no = line_starts.iter().take_while(|(start, _)| *start <= offset).last().map(|(_, n)| *n).unwrap_or(1);
        push_segment(segments, SegmentKind::Paragraph, text, line_no);
    }
}

fn push_segment(segments: &mut Vec<Segment>, kind: SegmentKind, text: String, source_line: usize) {
    let index = segments.len();
    segments.push(Segment { index, kind, text, source_line });
}

/// Split text at sentence-ending punctuation followed by whitespace.
///
/// Returns each sentence together with its byte offset in `text`.
fn split_sentences(text: &str) -> Vec<(usize, &str)> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for caps in SENTENCE_END.captures_iter(text) {
        let (Some(whole), Some(punct)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_trimmed(&mut sentences, text, start, punct.end());
        start = whole.end();
    }

    // Don't forget remaining text
    push_trimmed(&mut sentences, text, start, text.len());
    sentences
}

/// Keep a mid-line sentence that reads like a header line (`# ...`) attached
/// to the sentence before it, so it never becomes a header on re-reading.
fn attach_header_lookalikes<'a>(text: &'a str, sentences: Vec<(usize, &'a str)>) -> Vec<(usize, &'a str)> {
    let mut merged: Vec<(usize, &'a str)> = Vec::with_capacity(sentences.len());
    for (offset, sentence) in sentences {
        match merged.last_mut() {
            Some((start, previous)) if HEADER_PATTERN.is_match(sentence) => *previous = &text[*start..offset + sentence.len()],
            _ => merged.push((offset, sentence)),
        }
    }
    merged
}

fn push_trimmed<'a>(sentences: &mut Vec<(usize, &'a str)>, text: &'a str, start: usize, end: usize) {
    let piece = &text[start..end];
    let trimmed = piece.trim_start();
    let offset = start + (piece.len() - trimmed.len());
    let trimmed = trimmed.trim_end();
    if !trimmed.is_empty() {
        sentences.push((offset, trimmed));
    }
}

/// Merge short sentences forward until they reach `min_segment_length`,
/// never growing a group past `max_segment_length`.
fn group_sentences(sentences: Vec<(usize, &str)>, config: &SegmentationConfig) -> Vec<(usize, String)> {
    let mut groups: Vec<(usize, String)> = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (offset, sentence) in sentences {
        let next = match pending.take() {
            None => (offset, sentence.to_string()),
            Some((start, mut text)) if fits(&text, sentence, config.max_segment_length) => {
                text.push(' ');
                text.push_str(sentence);
                (start, text)
            }
            Some(full) => {
                groups.push(full);
                (offset, sentence.to_string())
            }
        };

        if next.1.chars().count() >= config.min_segment_length {
            groups.push(next);
        } else {
            pending = Some(next);
        }
    }

    // A short tail joins the previous group when it fits, otherwise stands alone
    if let Some((start, text)) = pending {
        match groups.last_mut() {
            Some((_, last)) if fits(last, &text, config.max_segment_length) => {
                last.push(' ');
                last.push_str(&text);
            }
            _ => groups.push((start, text)),
        }
    }

    groups
}

fn fits(current: &str, addition: &str, max_len: usize) -> bool {
    current.chars().count() + 1 + addition.chars().count() <= max_len
}

/// Truncate text to `max_chars` characters, appending an ellipsis when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild a document from segments, separated by blank lines.
    fn rebuild(segments: &[Segment]) -> String {
        segments
            .iter()
            .map(|s| match s.kind {
                SegmentKind::Header { level } => format!("{} {}", "#".repeat(level as usize), s.text),
                SegmentKind::Paragraph => s.text.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_title_and_two_sentences() {
        let segments = segment("# Title\n\nHello world. This is a test.", &SegmentationConfig::default()).unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].kind, SegmentKind::Header { level: 1 });
        assert_eq!(segments[0].text, "Title");
        assert_eq!(segments[1].kind, SegmentKind::Paragraph);
        assert_eq!(segments[1].text, "Hello world.");
        assert_eq!(segments[2].kind, SegmentKind::Paragraph);
        assert_eq!(segments[2].text, "This is a test.");
        assert_eq!(segments.iter().map(|s| s.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_header_count_and_levels() {
        let text = "# One\ntext\n## Two\n### Three\n#### Four\n##### Five\n###### Six\n####### Seven is text";
        let segments = segment(text, &SegmentationConfig::default()).unwrap();
        let levels: Vec<u8> = segments
            .iter()
            .filter_map(|s| match s.kind {
                SegmentKind::Header { level } => Some(level),
                SegmentKind::Paragraph => None,
            })
            .collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(segments.last().unwrap().text, "####### Seven is text");
    }

    #[test]
    fn test_hash_without_space_is_paragraph() {
        let segments = segment("#hashtag trending.", &SegmentationConfig::default()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, SegmentKind::Paragraph);
    }

    #[test]
    fn test_only_headers() {
        let segments = segment("# A\n## B\n\n### C\n", &SegmentationConfig::default()).unwrap();
        assert!(segments.iter().all(Segment::is_header));
        assert_eq!(texts(&segments), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_no_headers_and_blank_edges() {
        let segments = segment("\n\n  First one! Second?\n\nThird.\n\n\n", &SegmentationConfig::default()).unwrap();
        assert!(segments.iter().all(|s| !s.is_header()));
        assert_eq!(texts(&segments), vec!["First one!", "Second?", "Third."]);
    }

    #[test]
    fn test_source_lines_follow_block_lines() {
        let text = "# Intro\n\nLine one starts. It continues\nonto line two. Done\n\nNew block.";
        let segments = segment(text, &SegmentationConfig::default()).unwrap();
        let lines: Vec<usize> = segments.iter().map(|s| s.source_line).collect();
        assert_eq!(texts(&segments), vec!["Intro", "Line one starts.", "It continues onto line two.", "Done", "New block."]);
        assert_eq!(lines, vec![1, 3, 3, 4, 6]);
    }

    #[test]
    fn test_punctuation_runs_and_decimals() {
        let segments = segment("Wait... what?! Pi is 3.14 roughly.", &SegmentationConfig::default()).unwrap();
        assert_eq!(texts(&segments), vec!["Wait...", "what?!", "Pi is 3.14 roughly."]);
    }

    #[test]
    fn test_long_sentence_is_not_split() {
        let config = SegmentationConfig { max_segment_length: 10, ..Default::default() };
        let segments = segment("This sentence is far longer than ten characters. Ok.", &config).unwrap();
        assert_eq!(texts(&segments), vec!["This sentence is far longer than ten characters.", "Ok."]);
    }

    #[test]
    fn test_short_sentences_are_grouped() {
        let config = SegmentationConfig { min_segment_length: 20, max_segment_length: 40, ..Default::default() };
        let segments = segment("Hi. How are you? I am fine, thank you very much. Bye.", &config).unwrap();
        assert_eq!(texts(&segments), vec!["Hi. How are you?", "I am fine, thank you very much. Bye."]);
    }

    #[test]
    fn test_grouping_never_crosses_headers() {
        let config = SegmentationConfig { min_segment_length: 50, ..Default::default() };
        let segments = segment("Short.\n# Next\nAlso short.", &config).unwrap();
        assert_eq!(texts(&segments), vec!["Short.", "Next", "Also short."]);
    }

    #[test]
    fn test_headers_disabled() {
        let config = SegmentationConfig { split_by_headers: false, ..Default::default() };
        let segments = segment("# Title\nBody.", &config).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "# Title Body.");
    }

    #[test]
    fn test_crlf_input() {
        let segments = segment("# Title\r\n\r\nBody text.\r\n", &SegmentationConfig::default()).unwrap();
        assert_eq!(texts(&segments), vec!["Title", "Body text."]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(segment("", &SegmentationConfig::default()), Err(SegmentError::EmptyInput));
        assert_eq!(segment(" \n\t\n ", &SegmentationConfig::default()), Err(SegmentError::EmptyInput));
    }

    #[test]
    fn test_resegmenting_output_is_stable() {
        let config = SegmentationConfig { min_segment_length: 15, max_segment_length: 60, ..Default::default() };
        let text = "# Chapter\n\nIt was late. The rain kept falling on the roof all night! Why?\n\n## Part\nEnd.";
        let first = segment(text, &config).unwrap();

        let second = segment(&rebuild(&first), &config).unwrap();

        assert_eq!(texts(&first), texts(&second));
        assert_eq!(first.iter().map(|s| s.kind).collect::<Vec<_>>(), second.iter().map(|s| s.kind).collect::<Vec<_>>());
    }

    #[test]
    fn test_mid_line_hash_stays_in_paragraph() {
        let config = SegmentationConfig::default();
        let first = segment("Intro text. # Not a header. Outro.", &config).unwrap();

        assert_eq!(texts(&first), vec!["Intro text. # Not a header.", "Outro."]);
        assert!(first.iter().all(|s| s.kind == SegmentKind::Paragraph));

        let second = segment(&rebuild(&first), &config).unwrap();
        assert_eq!(texts(&first), texts(&second));
        assert!(second.iter().all(|s| s.kind == SegmentKind::Paragraph));
    }

    #[test]
    fn test_content_line() {
        let segments = segment("## Section\n\nShort text.", &SegmentationConfig::default()).unwrap();
        assert_eq!(segments[0].content_line(), "## Section");
        assert_eq!(segments[1].content_line(), "Short text.");
        assert_eq!(preview("abcdefgh", 4), "abcd...");
    }
}
