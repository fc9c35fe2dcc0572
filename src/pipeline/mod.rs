//! Narration pipeline: the sequential run loop and its timeline log.

mod assembler;
mod timeline;

pub use assembler::{Assembler, AssemblerConfig};
pub use timeline::{RunOutcome, RunSummary, TimelineLogger};
