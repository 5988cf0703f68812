//! Run orchestration.
//!
//! One run loads the window, categorizes every post with bounded concurrency
//! while the corpus is summarized in parallel, aggregates the verdicts, and
//! persists the assembled report. A run deadline bounds the whole thing:
//! posts still outstanding when it fires are recorded as `deadline` failures.

use crate::analysis::{aggregate, load_window, Categorizer, LoadOutcome, Summarizer};
use crate::error::{PipelineError, SummarizationFailure};
use crate::models::{
    AnalysisReport, FailureKind, ItemFailure, ModelsUsed, RawItem, ReportWindow,
    SentimentVerdict, SummaryResult,
};
use crate::report::{assemble, persist, RunRecord};
use crate::store::ContentStore;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::Instant as Deadline;
use tracing::{info, warn};

/// Run-level settings.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Store prefix holding raw posts.
    pub raw_prefix: String,
    /// Store prefix reports are written under.
    pub report_prefix: String,
    /// Lookback window measured back from the invocation time.
    pub lookback: chrono::Duration,
    /// Maximum categorization calls in flight.
    pub concurrency: usize,
    /// Wall-clock budget for the model work of one run.
    pub run_timeout: Duration,
    pub show_progress: bool,
}

pub struct Pipeline {
    store: Arc<dyn ContentStore>,
    categorizer: Categorizer,
    summarizer: Summarizer,
    settings: PipelineSettings,
}

/// Result of the categorization fan-out.
#[derive(Debug, Default)]
struct FanOut {
    verdicts: Vec<SentimentVerdict>,
    failures: Vec<ItemFailure>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        categorizer: Categorizer,
        summarizer: Summarizer,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            categorizer,
            summarizer,
            settings,
        }
    }

    /// Load the window without calling any model.
    pub async fn preview(&self, now: DateTime<Utc>) -> Result<LoadOutcome, PipelineError> {
        load_window(
            self.store.as_ref(),
            &self.settings.raw_prefix,
            self.settings.lookback,
            now,
        )
        .await
    }

    /// Execute one run for the window ending at `now`.
    ///
    /// Only store failures (listing the window, writing the report) abort the
    /// run; everything else degrades the report status.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<AnalysisReport, PipelineError> {
        let started = Instant::now();
        let deadline = Deadline::now() + self.settings.run_timeout;

        let loaded = self.preview(now).await?;
        let items = loaded.items;

        info!(
            "Categorizing {} posts with {} (concurrency {}), summarizing with {}",
            items.len(),
            self.categorizer.model(),
            self.settings.concurrency,
            self.summarizer.model()
        );

        let (fan_out, summary) = tokio::join!(
            self.categorize_all(&items, deadline),
            self.summarize_until(&items, deadline),
        );

        let record = RunRecord {
            started_at: now,
            window: ReportWindow {
                start: now - self.settings.lookback,
                end: now,
            },
            models_used: ModelsUsed {
                categorization_model: self.categorizer.model().to_string(),
                summarization_model: self.summarizer.model().to_string(),
            },
            items_loaded: items.len(),
            items_skipped: loaded.skipped,
            aggregate: aggregate(&fan_out.verdicts),
            summary,
            failures: fan_out.failures,
            elapsed: started.elapsed(),
        };

        let mut report = assemble(record, &self.settings.report_prefix);
        persist(self.store.as_ref(), &mut report).await?;
        info!("Run finished: {} ({})", report.status, report.message);
        Ok(report)
    }

    /// Categorize every post, at most `concurrency` at a time.
    ///
    /// Failures are recorded per post and never affect siblings. Failures are
    /// returned in post order.
    async fn categorize_all(&self, items: &[RawItem], deadline: Deadline) -> FanOut {
        let mut fan_out = FanOut::default();
        if items.is_empty() {
            return fan_out;
        }

        let progress = self.progress_bar(items.len() as u64);
        let mut failed: HashMap<&str, ItemFailure> = HashMap::new();
        let mut done: usize = 0;

        let mut results = stream::iter(items)
            .map(|item| async move { (item, self.categorizer.categorize(item).await) })
            .buffer_unordered(self.settings.concurrency.max(1));

        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        let mut finished: HashSet<&str> = HashSet::new();
        loop {
            tokio::select! {
                next = results.next() => {
                    let Some((item, outcome)) = next else { break };
                    finished.insert(item.id.as_str());
                    match outcome {
                        Ok(verdict) => fan_out.verdicts.push(verdict),
                        Err(e) => {
                            warn!("Dropping {}: {}", item.id, e);
                            failed.insert(
                                item.id.as_str(),
                                ItemFailure {
                                    item_ref: item.id.clone(),
                                    kind: e.kind(),
                                    detail: e.to_string(),
                                },
                            );
                        }
                    }
                    done += 1;
                    progress.inc(1);
                }
                _ = &mut expiry => {
                    warn!(
                        "Run deadline reached with {} of {} posts uncategorized",
                        items.len() - done,
                        items.len()
                    );
                    break;
                }
            }
        }
        drop(results);
        progress.finish_and_clear();

        for item in items {
            if let Some(failure) = failed.remove(item.id.as_str()) {
                fan_out.failures.push(failure);
            } else if !finished.contains(item.id.as_str()) {
                fan_out.failures.push(ItemFailure {
                    item_ref: item.id.clone(),
                    kind: FailureKind::Deadline,
                    detail: "run deadline expired before categorization finished".to_string(),
                });
            }
        }

        info!(
            "Categorized {} of {} posts ({} dropped)",
            fan_out.verdicts.len(),
            items.len(),
            fan_out.failures.len()
        );
        fan_out
    }

    async fn summarize_until(
        &self,
        items: &[RawItem],
        deadline: Deadline,
    ) -> Result<SummaryResult, SummarizationFailure> {
        let outcome = match tokio::time::timeout_at(deadline, self.summarizer.summarize(items)).await
        {
            Ok(result) => result,
            Err(_) => Err(SummarizationFailure::Deadline),
        };
        if let Err(ref e) = outcome {
            warn!("Summarization failed: {}", e);
        }
        outcome
    }

    fn progress_bar(&self, len: u64) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} posts ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    }
}
