//! Narrator - turn a structured text document into one narrated audio track.
//!
//! The input is split into header and sentence segments, each segment is
//! synthesized (Kokoro locally or ElevenLabs in the cloud), and the results are
//! stitched together with a timing log recording where every segment landed.

mod audio;
mod config;
mod pipeline;
mod text;
mod tts;

use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use config::{AppConfig, Cli};
use pipeline::{Assembler, AssemblerConfig, RunOutcome, RunSummary, TimelineLogger};

/// Exit status for a run stopped by Ctrl+C or SIGTERM.
const EXIT_INTERRUPTED: u8 = 130;

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown(shutdown: Arc<AtomicBool>) {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, finishing current segment...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, finishing current segment...");
        }
    }

    shutdown.store(true, Ordering::SeqCst);
}

/// Read and segment the input document.
///
/// Runs before the backend or the timeline log is created, so bad input never
/// leaves a log file behind.
fn prepare_run(config: &AppConfig) -> Result<Vec<text::Segment>> {
    let input = fs::read_to_string(&config.paths.input_file).with_context(|| format!("Cannot read input file {}", config.paths.input_file.display()))?;
    let segments = text::segment(&input, &config.segmentation()).with_context(|| format!("No segments in {}", config.paths.input_file.display()))?;

    let headers = segments.iter().filter(|s| s.is_header()).count();
    info!("📄 Parsed {} segments ({} headers)", segments.len(), headers);
    Ok(segments)
}

/// Build the backend and run every segment through the assembler.
///
/// Runs on a blocking worker: synthesis calls block on inference or HTTP.
fn narrate(config: &AppConfig, segments: &[text::Segment], verbose: bool, shutdown: Arc<AtomicBool>) -> Result<RunSummary> {
    let (mut backend, voice) = tts::create_backend(config, verbose)?;
    info!("Using {} with voice {} (speed {})", backend.name(), voice.voice, voice.speed);

    backend.check_voice(&voice)?;

    let logger = TimelineLogger::create(&config.paths.log_file).with_context(|| format!("Failed to create log file {}", config.paths.log_file.display()))?;
    let mut assembler = Assembler::new(AssemblerConfig::from_config(config), logger, shutdown);

    let summary = assembler.run(segments, backend.as_mut(), &voice).with_context(|| format!("Failed to write log file {}", config.paths.log_file.display()))?;
    Ok(summary)
}

/// Print the end-of-run summary.
fn print_summary(config: &AppConfig, summary: &RunSummary) {
    info!("📋 Summary:");
    info!("  Audio duration: {:.2}s ({:.2} min)", summary.total_duration, summary.total_duration / 60.0);
    info!("  Processing time: {:.2}s", summary.total_processing_time);
    info!("  Segments: {} produced, {} skipped", summary.entries.len(), summary.skipped.len());
    for skipped in &summary.skipped {
        warn!("    Skipped segment {}: {} ({})", skipped.index, skipped.content, skipped.reason);
    }
    match &summary.output_path {
        Some(path) => info!("  Output: {}", path.display()),
        None => warn!("  Output: none"),
    }
    info!("  Log: {}", config.paths.log_file.display());
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments (voice catalogue commands exit here)
    let cli = Cli::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if cli.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })
        .unwrap();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🎙️  Narrator v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::load(&cli).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            error!("❌ Configuration error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    config.log_config();

    let segments = match prepare_run(&config) {
        Ok(segments) => segments,
        Err(e) => {
            error!("❌ {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let signal_task = tokio::spawn(wait_for_shutdown(shutdown.clone()));

    let worker = {
        let config = config.clone();
        let shutdown = shutdown.clone();
        tokio::task::spawn_blocking(move || narrate(&config, &segments, cli.verbose, shutdown))
    };

    let result = worker.await;
    signal_task.abort();

    let summary = match result {
        Ok(Ok(summary)) => summary,
        Ok(Err(e)) => {
            error!("❌ {:#}", e);
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("❌ Narration worker failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_summary(&config, &summary);

    match &summary.outcome {
        RunOutcome::Completed => {
            info!("✅ Narration complete");
            ExitCode::SUCCESS
        }
        RunOutcome::Interrupted => {
            warn!("⏹️  Narration interrupted, partial output kept");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        RunOutcome::Aborted(reason) => {
            error!("❌ Narration aborted: {}", reason);
            ExitCode::FAILURE
        }
    }
}
