//! Configuration module for the narrator.
//!
//! Provides CLI argument parsing, config file loading and the Kokoro voice catalogue.

#[allow(clippy::module_inception)]
mod config;
pub mod voices;

pub use config::{AppConfig, Cli, CloudConfig, Engine, KOKORO_MODEL_NAME, LocalConfig};
#[cfg(feature = "local")]
pub use config::Provider;
