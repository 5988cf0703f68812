//! PostPulse - LLM-powered sentiment digest for social-media posts
//!
//! A CLI tool that reads the posts deposited in a content store over a
//! lookback window, classifies each one with an Ollama model, summarizes the
//! corpus with a second model, and writes a JSON report back to the store.
//!
//! Exit codes:
//!   0 - Run completed with status success or partial
//!   1 - Runtime error (config, store listing or report write, etc.)
//!   2 - Run completed with status failed

mod analysis;
mod cli;
mod config;
mod error;
mod llm;
mod models;
mod pipeline;
mod report;
mod store;

use analysis::{Categorizer, CategorizerConfig, Summarizer, SummarizerConfig};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use llm::OllamaProvider;
use models::{FailureKind, RunStatus, Sentiment};
use pipeline::{Pipeline, PipelineSettings};
use std::sync::Arc;
use std::time::Duration;
use store::FsStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("PostPulse v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .postpulse.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize the store, models, retries, and limits.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run the pipeline once. Returns the exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let pipeline = build_pipeline(&config, !args.quiet)?;
    let now = Utc::now();

    if args.dry_run {
        return handle_dry_run(&pipeline, &config, now).await;
    }

    if !args.quiet {
        println!("📰 Analyzing posts from the last {} day(s)", config.general.lookback_days);
        println!("   Store: {}", config.store.root.display());
        println!("   Categorization model: {}", config.model.categorization_model);
        println!("   Summarization model: {}", config.model.summarization_model);
        println!("   Ollama: {}", config.model.ollama_url);
    }

    let report = pipeline.run(now).await?;

    if let Some(ref path) = args.markdown {
        report::write_report(&report, path)?;
        info!("Markdown digest written to {}", path.display());
    }

    if !args.quiet {
        let agg = &report.categorization;
        println!("\n📊 Sentiment Summary:");
        println!("   Posts categorized: {} of {}", agg.total, report.items_loaded);
        let shares: Vec<String> = Sentiment::ALL
            .iter()
            .map(|s| {
                format!(
                    "{} {}: {}",
                    s.emoji(),
                    s,
                    agg.distribution.get(s).copied().unwrap_or(0)
                )
            })
            .collect();
        println!("   {}", shares.join(" | "));
        if let Some(overall) = agg.overall_sentiment {
            println!("   Overall: {}", overall);
        }
        if !report.failures.is_empty() {
            println!(
                "   Dropped: {} transport | {} parse | {} deadline",
                report.failure_count(FailureKind::Transport),
                report.failure_count(FailureKind::Parse),
                report.failure_count(FailureKind::Deadline)
            );
        }
        println!("   Duration: {:.1}s", report.duration_seconds);
        println!("\n✅ {}", report.message);
        println!("   Report saved to: {}", report.storage_key);
    }

    if report.status == RunStatus::Failed {
        eprintln!("\n⛔ Run produced no usable output (exit code 2).");
        return Ok(2);
    }
    Ok(0)
}

/// Wire the store, model provider and components from configuration.
fn build_pipeline(config: &Config, show_progress: bool) -> Result<Pipeline> {
    let provider = Arc::new(
        OllamaProvider::new(
            &config.model.ollama_url,
            config.model.temperature,
            config.model.timeout_seconds,
        )
        .context("Failed to create Ollama client")?,
    );

    let categorizer = Categorizer::new(
        provider.clone(),
        CategorizerConfig {
            model: config.model.categorization_model.clone(),
            retry: config.retry.categorization_policy(),
            max_item_chars: config.limits.max_item_chars,
        },
    );
    let summarizer = Summarizer::new(
        provider,
        SummarizerConfig {
            model: config.model.summarization_model.clone(),
            retry: config.retry.summarization_policy(),
            max_item_chars: config.limits.max_item_chars,
            max_corpus_chars: config.limits.max_corpus_chars,
        },
    );

    let settings = PipelineSettings {
        raw_prefix: config.store.raw_prefix.clone(),
        report_prefix: config.store.report_prefix.clone(),
        lookback: chrono::Duration::days(i64::from(config.general.lookback_days)),
        concurrency: config.general.concurrency,
        run_timeout: Duration::from_secs(config.general.run_timeout_seconds),
        show_progress,
    };

    Ok(Pipeline::new(
        Arc::new(FsStore::new(config.store.root.clone())),
        categorizer,
        summarizer,
        settings,
    ))
}

/// Handle --dry-run: load the window, print what would be analyzed, exit.
async fn handle_dry_run(
    pipeline: &Pipeline,
    config: &Config,
    now: chrono::DateTime<Utc>,
) -> Result<i32> {
    println!("\n🔍 Dry run: loading the window (no model calls)...\n");

    let loaded = pipeline.preview(now).await?;

    if loaded.items.is_empty() {
        println!(
            "   No posts under {} in the last {} day(s).",
            config.store.raw_prefix, config.general.lookback_days
        );
    } else {
        println!("   Found {} posts that would be analyzed:\n", loaded.items.len());
        for item in &loaded.items {
            println!(
                "     📝 [{}] {} ({})",
                item.authored_at.format("%Y-%m-%d %H:%M"),
                item.title,
                item.id
            );
        }
    }
    if loaded.skipped > 0 {
        println!("\n   Skipped {} malformed record(s).", loaded.skipped);
    }

    println!("\n✅ Dry run complete. No model calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
