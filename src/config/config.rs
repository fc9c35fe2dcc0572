//! Application configuration: CLI arguments layered over a JSON config file.
//!
//! Precedence is CLI override > config file > built-in default. The resolved
//! `AppConfig` is handed explicitly to every pipeline stage.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::voices;
use crate::audio::{Normalization, NormalizationMode};
use crate::text::SegmentationConfig;
use crate::tts::VoiceParams;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Directory name of the sherpa-onnx Kokoro release.
pub const KOKORO_MODEL_NAME: &str = "kokoro-multi-lang-v1_0";

/// Hardware acceleration provider for ONNX models.
/// Auto-detected based on platform if not specified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// CPU inference (default fallback, always available)
    #[default]
    Cpu,
    /// NVIDIA CUDA acceleration (Linux only, requires CUDA toolkit)
    Cuda,
    /// Apple CoreML acceleration (macOS only, uses Neural Engine)
    #[value(name = "coreml")]
    CoreMl,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sherpa_provider())
    }
}

impl Provider {
    /// Convert to sherpa-rs provider string.
    pub fn as_sherpa_provider(&self) -> &'static str {
        match self {
            Provider::Cpu => "cpu",
            Provider::Cuda => "cuda",
            Provider::CoreMl => "coreml",
        }
    }
}

/// Speech synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Kokoro model running in-process through sherpa-rs
    #[default]
    Local,
    /// ElevenLabs text-to-speech API over HTTPS
    Cloud,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Local => write!(f, "local"),
            Engine::Cloud => write!(f, "cloud"),
        }
    }
}

/// Command line interface.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "narrator")]
#[command(author, version, about = "Narrate a text document into one audio track with a timing log", long_about = None)]
pub struct Cli {
    /// List all available Kokoro voices and exit
    #[arg(long)]
    pub list_voices: bool,

    /// Show detailed information about a specific voice and exit
    #[arg(long)]
    pub voice_info: Option<String>,

    /// Input text file (overrides paths.input_file)
    #[arg(long, short = 't')]
    pub text: Option<PathBuf>,

    /// JSON configuration file (defaults to ./config.json when present)
    #[arg(long, short = 'c', env = "NARRATOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Voice override: Kokoro voice name (local) or ElevenLabs voice id (cloud)
    #[arg(long)]
    pub voice: Option<String>,

    /// Speech rate multiplier override (must be positive)
    #[arg(long, value_parser = parse_rate)]
    pub rate: Option<f32>,

    /// Synthesis engine override
    #[arg(long, value_enum)]
    pub engine: Option<Engine>,

    /// ElevenLabs API key
    #[arg(long, env = "ELEVENLABS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Directory containing (or receiving) the Kokoro model files
    #[arg(long, short = 'd', env = "MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Hardware acceleration provider for the local engine (auto-detected if not specified)
    #[arg(long, value_enum)]
    pub provider: Option<Provider>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments, handling the voice catalogue commands.
    pub fn from_args() -> Self {
        let cli = Self::parse();

        if cli.list_voices {
            voices::print_voices();
            std::process::exit(0);
        }

        if let Some(ref voice_name) = cli.voice_info {
            match voices::print_voice_info(voice_name) {
                Ok(_) => std::process::exit(0),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
        }

        cli
    }
}

/// Engine selection and per-engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub engine: Engine,
    /// Engine to switch to when the primary one is unavailable
    pub fallback: Option<Engine>,
    pub provider: Option<Provider>,
    /// Inference threads for the local engine (0 = auto-detect)
    pub threads: usize,
    pub local: LocalConfig,
    pub cloud: CloudConfig,
}

/// Kokoro (sherpa-rs) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub model_dir: PathBuf,
    /// Default Kokoro voice when `voice.name` is not set
    pub voice: String,
    /// Download the model archive on first use when it is missing
    pub auto_download: bool,
    pub model_url: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            voice: "af_bella".to_string(),
            auto_download: true,
            model_url: format!("https://github.com/k2-fsa/sherpa-onnx/releases/download/tts-models/{}.tar.bz2", KOKORO_MODEL_NAME),
        }
    }
}

impl LocalConfig {
    /// Directory the model archive is extracted into.
    pub fn tts_dir(&self) -> PathBuf {
        self.model_dir.join("tts")
    }

    /// Directory of the extracted Kokoro release.
    pub fn kokoro_dir(&self) -> PathBuf {
        self.tts_dir().join(KOKORO_MODEL_NAME)
    }

    pub fn model_path(&self) -> PathBuf {
        self.kokoro_dir().join("model.onnx")
    }

    pub fn voices_path(&self) -> PathBuf {
        self.kokoro_dir().join("voices.bin")
    }

    pub fn tokens_path(&self) -> PathBuf {
        self.kokoro_dir().join("tokens.txt")
    }

    /// espeak-ng data used for languages without a lexicon.
    #[cfg(feature = "local")]
    pub fn data_dir(&self) -> PathBuf {
        self.kokoro_dir().join("espeak-ng-data")
    }

    /// Jieba dictionary (for Chinese segmentation).
    #[cfg(feature = "local")]
    pub fn dict_dir(&self) -> PathBuf {
        self.kokoro_dir().join("dict")
    }

    /// Comma-separated lexicon paths for a voice; empty when espeak-ng is used.
    #[cfg(feature = "local")]
    pub fn lexicon(&self, voice: &voices::Voice) -> String {
        let dir = self.kokoro_dir();
        voice.lexicon_files().iter().map(|f| dir.join(f).to_string_lossy().to_string()).collect::<Vec<_>>().join(",")
    }

    /// Files that must exist before the engine can be created.
    pub fn required_files(&self) -> [PathBuf; 3] {
        [self.model_path(), self.voices_path(), self.tokens_path()]
    }
}

/// ElevenLabs settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub api_key: String,
    /// Default voice id when `voice.name` is not set
    pub voice_id: String,
    pub model_id: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(), // Rachel
            model_id: "eleven_monolingual_v1".to_string(),
            base_url: "https://api.elevenlabs.io".to_string(),
            timeout_secs: 60,
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

/// Voice selection shared by all engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Voice for the primary engine (falls back to the engine's default voice)
    pub name: Option<String>,
    /// Speech-rate multiplier
    pub speed: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self { name: None, speed: 1.0 }
    }
}

/// Text segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub split_by_headers: bool,
    pub min_segment_length: usize,
    pub max_segment_length: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        let defaults = SegmentationConfig::default();
        Self {
            split_by_headers: defaults.split_by_headers,
            min_segment_length: defaults.min_segment_length,
            max_segment_length: defaults.max_segment_length,
        }
    }
}

/// Audio output and run-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Sample rate of segment files and the final track
    pub sample_rate: u32,
    /// Silence between consecutive segments, in seconds
    pub gap_seconds: f64,
    pub normalization: Normalization,
    /// Narrate headers (otherwise they are logged as section markers only)
    pub speak_headers: bool,
    /// Wait before retrying a timed-out segment
    pub retry_backoff_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { sample_rate: 24000, gap_seconds: 0.5, normalization: Normalization::default(), speak_headers: true, retry_backoff_ms: 500 }
    }
}

/// Input and output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_file: PathBuf,
    pub segments_dir: PathBuf,
    pub log_file: PathBuf,
    pub final_output: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_file: PathBuf::from("input.txt"),
            segments_dir: PathBuf::from("outputs/segments"),
            log_file: PathBuf::from("outputs/tts_log.txt"),
            final_output: PathBuf::from("outputs/output.wav"),
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tts: TtsConfig,
    pub voice: VoiceConfig,
    pub text: TextConfig,
    pub output: OutputConfig,
    pub paths: PathsConfig,
}

impl AppConfig {
    /// Resolve the configuration from the config file and CLI overrides.
    ///
    /// # Errors
    /// Returns an error if an explicitly requested config file is missing or
    /// any config file fails to parse.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            None => {
                info!("No config file found, using built-in defaults");
                Self::default()
            }
        };

        config.apply_overrides(cli);
        config.normalize_thread_count(cli.verbose);
        Ok(config)
    }

    /// Parse a JSON config file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).with_context(|| format!("Config file not found: {}", path.display()))?;
        let config = serde_json::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply command line overrides on top of the file values.
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(ref text) = cli.text {
            self.paths.input_file = text.clone();
        }
        if let Some(ref voice) = cli.voice {
            self.voice.name = Some(voice.clone());
        }
        if let Some(rate) = cli.rate {
            self.voice.speed = rate;
        }
        if let Some(engine) = cli.engine {
            self.tts.engine = engine;
        }
        if let Some(ref key) = cli.api_key {
            self.tts.cloud.api_key = key.clone();
        }
        if let Some(ref dir) = cli.model_dir {
            self.tts.local.model_dir = dir.clone();
        }
        if cli.provider.is_some() {
            self.tts.provider = cli.provider;
        }
    }

    /// Pick a thread count for the local engine when set to auto.
    ///
    /// With CUDA a single thread is used since the GPU handles parallelism;
    /// on CPU half the cores are used so the rest of the system stays responsive.
    fn normalize_thread_count(&mut self, verbose: bool) {
        if self.tts.threads != 0 || !self.uses_engine(Engine::Local) {
            return;
        }

        let cpu_cores = num_cpus::get();
        let provider = self.effective_provider();
        self.tts.threads = if provider == Provider::Cuda { 1 } else { (cpu_cores / 2).max(1) };

        if verbose {
            info!("CPU cores: {}, provider: {}, TTS threads: {}", cpu_cores, provider, self.tts.threads);
        }
    }

    /// Whether the engine is the primary or fallback engine.
    pub fn uses_engine(&self, engine: Engine) -> bool {
        self.tts.engine == engine || self.tts.fallback == Some(engine)
    }

    /// Get the effective provider for the local engine.
    pub fn effective_provider(&self) -> Provider {
        self.tts.provider.unwrap_or_else(detect_provider)
    }

    /// Segmentation options for the text stage.
    pub fn segmentation(&self) -> SegmentationConfig {
        SegmentationConfig {
            split_by_headers: self.text.split_by_headers,
            min_segment_length: self.text.min_segment_length,
            max_segment_length: self.text.max_segment_length,
        }
    }

    /// Voice parameters for an engine.
    ///
    /// `voice.name` only applies to the primary engine; a fallback engine always
    /// uses its own configured default voice.
    pub fn voice_params(&self, engine: Engine) -> VoiceParams {
        let default_voice = match engine {
            Engine::Local => &self.tts.local.voice,
            Engine::Cloud => &self.tts.cloud.voice_id,
        };
        let voice = match (&self.voice.name, engine == self.tts.engine) {
            (Some(name), true) => name.clone(),
            _ => default_voice.clone(),
        };
        VoiceParams { voice, speed: self.voice.speed }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.voice.speed.is_finite() && self.voice.speed > 0.0) {
            anyhow::bail!("Speech rate must be positive, got {}", self.voice.speed);
        }

        if !(self.output.gap_seconds.is_finite() && self.output.gap_seconds >= 0.0) {
            anyhow::bail!("Inter-segment gap must be zero or positive, got {}", self.output.gap_seconds);
        }

        if self.output.sample_rate == 0 {
            anyhow::bail!("Output sample rate must be positive");
        }

        let norm = self.output.normalization;
        if norm.mode != NormalizationMode::None && !(norm.target > 0.0 && norm.target <= 1.0) {
            anyhow::bail!("Normalization target must be in (0, 1], got {}", norm.target);
        }

        if self.text.max_segment_length == 0 {
            anyhow::bail!("max_segment_length must be positive");
        }

        if self.text.min_segment_length > self.text.max_segment_length {
            anyhow::bail!("min_segment_length ({}) exceeds max_segment_length ({})", self.text.min_segment_length, self.text.max_segment_length);
        }

        if self.tts.fallback == Some(self.tts.engine) {
            anyhow::bail!("Fallback engine must differ from the primary engine ({})", self.tts.engine);
        }

        if self.uses_engine(Engine::Cloud) && self.tts.cloud.api_key.trim().is_empty() {
            anyhow::bail!("The cloud engine requires an API key (tts.cloud.api_key, --api-key or ELEVENLABS_API_KEY)");
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Engine: {}", self.tts.engine);
        if let Some(fallback) = self.tts.fallback {
            info!("  Fallback engine: {}", fallback);
        }
        let voice = self.voice_params(self.tts.engine);
        info!("  Voice: {} (speed {})", voice.voice, voice.speed);
        if self.uses_engine(Engine::Local) {
            info!("  Model directory: {}", self.tts.local.model_dir.display());
            info!("  Provider: {} ({} threads)", self.effective_provider(), self.tts.threads);
        }
        info!("  Sample rate: {} Hz", self.output.sample_rate);
        info!("  Inter-segment gap: {}s", self.output.gap_seconds);
        info!("  Normalization: {:?} (target {})", self.output.normalization.mode, self.output.normalization.target);
        info!("  Segment length: {}..{} chars", self.text.min_segment_length, self.text.max_segment_length);
        info!("  Segments directory: {}", self.paths.segments_dir.display());
        info!("  Log file: {}", self.paths.log_file.display());
        info!("  Final output: {}", self.paths.final_output.display());
    }
}

/// Get the default model directory (~/.narrator/models).
fn default_model_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".narrator").join("models")
    } else {
        PathBuf::from("models")
    }
}

/// Auto-detect the best hardware acceleration provider.
fn detect_provider() -> Provider {
    #[cfg(target_os = "macos")]
    {
        Provider::CoreMl
    }

    #[cfg(target_os = "linux")]
    {
        if has_nvidia_gpu() { Provider::Cuda } else { Provider::Cpu }
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        Provider::Cpu
    }
}

/// Check if an NVIDIA GPU is available (Linux only).
#[cfg(target_os = "linux")]
fn has_nvidia_gpu() -> bool {
    const NVIDIA_PATHS: [&str; 4] = ["/dev/nvidia0", "/dev/nvidiactl", "/dev/nvhost-ctrl", "/etc/nv_tegra_release"];
    NVIDIA_PATHS.iter().any(|p| Path::new(p).exists())
}

/// Parse and validate a speech rate (must be a positive number).
fn parse_rate(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value.is_finite() && value > 0.0 { Ok(value) } else { Err(format!("rate must be positive, got {}", value)) }
}
