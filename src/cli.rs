//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation. Most flags are optional and only override
//! the configuration file when given.

use clap::Parser;
use std::path::PathBuf;

/// PostPulse - LLM-powered sentiment digest for social-media posts
///
/// Classifies the sentiment of every post deposited in the content store
/// during the lookback window, summarizes the corpus, and writes a JSON
/// report back to the store.
///
/// Examples:
///   postpulse --store ./data
///   postpulse --store ./data --lookback-days 14 --markdown digest.md
///   postpulse --categorization-model llama3.2:latest --summarization-model qwen2.5:14b
///   postpulse --dry-run
///   postpulse --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Root directory of the content store
    #[arg(long, value_name = "DIR", env = "POSTPULSE_STORE")]
    pub store: Option<PathBuf>,

    /// Store prefix holding raw posts
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Lookback window in days, measured back from now
    #[arg(long, value_name = "DAYS")]
    pub lookback_days: Option<u32>,

    /// Ollama model used to classify each post
    #[arg(long, value_name = "MODEL", env = "POSTPULSE_CATEGORIZATION_MODEL")]
    pub categorization_model: Option<String>,

    /// Ollama model used to summarize the corpus
    #[arg(long, value_name = "MODEL", env = "POSTPULSE_SUMMARIZATION_MODEL")]
    pub summarization_model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, value_name = "URL", env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Number of concurrent categorization calls
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Run deadline in seconds
    ///
    /// Posts not categorized when it expires are reported as dropped.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .postpulse.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Also write a Markdown digest of the report to this file
    #[arg(long, value_name = "FILE")]
    pub markdown: Option<PathBuf>,

    /// Dry run: load the window and list the posts without calling any model
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .postpulse.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.lookback_days == Some(0) {
            return Err("Lookback window must be at least 1 day".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        for model in [&self.categorization_model, &self.summarization_model]
            .into_iter()
            .flatten()
        {
            if model.trim().is_empty() {
                return Err("Model identifiers must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
