//! Audio processing module for narrated segments.
//!
//! Provides down-mixing and normalization, high-quality resampling via rubato,
//! and WAV artifact writing and concatenation via hound.

pub mod resampler;
pub mod util;
pub mod wav;

pub use util::{Normalization, NormalizationMode};
