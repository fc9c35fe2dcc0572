//! Text segmentation module.
//!
//! Splits markdown-style documents into header and paragraph segments, each of
//! which is synthesized as one request.

mod segmenter;

pub use segmenter::{Segment, SegmentationConfig, segment};
#[cfg(test)]
pub use segmenter::SegmentError;
