//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.postpulse.toml` files. Every field has a default, so a partial file
//! (or none at all) is valid.

use crate::llm::RetryPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".postpulse.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Content store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Retry settings for model calls.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Text size limits.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// General run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Lookback window in days.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,

    /// Number of concurrent categorization calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Run deadline in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_seconds: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            concurrency: default_concurrency(),
            run_timeout_seconds: default_run_timeout(),
        }
    }
}

fn default_lookback_days() -> u32 {
    7
}

fn default_concurrency() -> usize {
    4
}

fn default_run_timeout() -> u64 {
    600
}

/// Content store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the filesystem store.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,

    /// Prefix holding raw posts.
    #[serde(default = "default_raw_prefix")]
    pub raw_prefix: String,

    /// Prefix reports are written under.
    #[serde(default = "default_report_prefix")]
    pub report_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            raw_prefix: default_raw_prefix(),
            report_prefix: default_report_prefix(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_raw_prefix() -> String {
    "raw/".to_string()
}

fn default_report_prefix() -> String {
    "reports".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model used for per-post classification.
    #[serde(default = "default_categorization_model")]
    pub categorization_model: String,

    /// Model used for the corpus summary.
    #[serde(default = "default_summarization_model")]
    pub summarization_model: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            categorization_model: default_categorization_model(),
            summarization_model: default_summarization_model(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_categorization_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_summarization_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    120
}

/// Retry budget for model calls.
///
/// Summarization sends a much larger payload, so it backs off longer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_categorization_base_delay")]
    pub categorization_base_delay_ms: u64,

    #[serde(default = "default_categorization_max_delay")]
    pub categorization_max_delay_ms: u64,

    #[serde(default = "default_summarization_base_delay")]
    pub summarization_base_delay_ms: u64,

    #[serde(default = "default_summarization_max_delay")]
    pub summarization_max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            categorization_base_delay_ms: default_categorization_base_delay(),
            categorization_max_delay_ms: default_categorization_max_delay(),
            summarization_base_delay_ms: default_summarization_base_delay(),
            summarization_max_delay_ms: default_summarization_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_categorization_base_delay() -> u64 {
    500
}

fn default_categorization_max_delay() -> u64 {
    4_000
}

fn default_summarization_base_delay() -> u64 {
    2_000
}

fn default_summarization_max_delay() -> u64 {
    30_000
}

impl RetryConfig {
    pub fn categorization_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.categorization_base_delay_ms),
            max_delay: Duration::from_millis(self.categorization_max_delay_ms),
        }
    }

    pub fn summarization_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.summarization_base_delay_ms),
            max_delay: Duration::from_millis(self.summarization_max_delay_ms),
        }
    }
}

/// Text size limits applied before calling a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum characters per post.
    #[serde(default = "default_max_item_chars")]
    pub max_item_chars: usize,

    /// Maximum characters of the summarization corpus.
    #[serde(default = "default_max_corpus_chars")]
    pub max_corpus_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_item_chars: default_max_item_chars(),
            max_corpus_chars: default_max_corpus_chars(),
        }
    }
}

fn default_max_item_chars() -> usize {
    4_000
}

fn default_max_corpus_chars() -> usize {
    60_000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref root) = args.store {
            self.store.root = root.clone();
        }
        if let Some(ref prefix) = args.prefix {
            self.store.raw_prefix = prefix.clone();
        }
        if let Some(days) = args.lookback_days {
            self.general.lookback_days = days;
        }
        if let Some(ref model) = args.categorization_model {
            self.model.categorization_model = model.clone();
        }
        if let Some(ref model) = args.summarization_model {
            self.model.summarization_model = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout {
            self.general.run_timeout_seconds = timeout;
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<()> {
        if self.general.lookback_days == 0 {
            anyhow::bail!("general.lookback_days must be at least 1");
        }
        if self.general.concurrency == 0 {
            anyhow::bail!("general.concurrency must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.model.temperature) {
            anyhow::bail!("model.temperature must be between 0.0 and 1.0");
        }
        if self.limits.max_item_chars == 0 || self.limits.max_corpus_chars == 0 {
            anyhow::bail!("limits must be positive");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}
