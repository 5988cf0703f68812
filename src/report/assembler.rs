//! Report assembly and persistence.
//!
//! Merges the aggregate, the summary and the run metadata into one
//! `AnalysisReport` and writes it to a time-partitioned store key.

use crate::error::{PipelineError, StoreError, SummarizationFailure};
use crate::models::{
    AnalysisReport, FailureKind, ItemFailure, ModelsUsed, ReportWindow, RunStatus,
    SentimentAggregate, SummaryResult,
};
use crate::store::ContentStore;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{info, warn};

/// Everything a finished run hands to the assembler.
#[derive(Debug)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub window: ReportWindow,
    pub models_used: ModelsUsed,
    pub items_loaded: usize,
    pub items_skipped: usize,
    pub aggregate: SentimentAggregate,
    pub summary: Result<SummaryResult, SummarizationFailure>,
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
}

/// Store key for a report produced at `at`.
///
/// Format: `<prefix>/<YYYY-MM-DD>/analysis-<HHMMSS>.json`, in UTC.
pub fn report_key(prefix: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}/analysis-{}.json",
        prefix.trim_end_matches('/'),
        at.format("%Y-%m-%d"),
        at.format("%H%M%S")
    )
}

/// Decide the run status.
///
/// A run is `failed` only when posts were loaded but neither a verdict nor a
/// summary came out of them.
pub fn determine_status(
    items_loaded: usize,
    verdicts: usize,
    failures: usize,
    summary_failed: bool,
) -> RunStatus {
    if items_loaded > 0 && verdicts == 0 && summary_failed {
        RunStatus::Failed
    } else if failures > 0 || summary_failed {
        RunStatus::Partial
    } else {
        RunStatus::Success
    }
}

fn status_message(record: &RunRecord, status: RunStatus) -> String {
    let total = record.aggregate.total;

    if record.items_loaded == 0 {
        return format!(
            "No posts found between {} and {}",
            record.window.start.format("%Y-%m-%d %H:%M UTC"),
            record.window.end.format("%Y-%m-%d %H:%M UTC")
        );
    }

    match status {
        RunStatus::Success => match record.aggregate.overall_sentiment {
            Some(overall) => format!(
                "Analyzed {} posts; overall sentiment is {}",
                total, overall
            ),
            None => format!("Analyzed {} posts", total),
        },
        RunStatus::Partial => {
            let mut parts = Vec::new();
            if !record.failures.is_empty() {
                let breakdown: Vec<String> = [
                    FailureKind::Transport,
                    FailureKind::Parse,
                    FailureKind::Deadline,
                ]
                .iter()
                .filter_map(|kind| {
                    let n = record.failures.iter().filter(|f| f.kind == *kind).count();
                    (n > 0).then(|| format!("{} {}", n, kind))
                })
                .collect();
                parts.push(format!(
                    "{} dropped ({})",
                    record.failures.len(),
                    breakdown.join(", ")
                ));
            }
            if record.summary.is_err() {
                parts.push("summarization failed".to_string());
            }
            format!(
                "Analyzed {} of {} posts; {}",
                total,
                record.items_loaded,
                parts.join("; ")
            )
        }
        RunStatus::Failed => format!(
            "None of {} posts could be categorized and summarization failed",
            record.items_loaded
        ),
    }
}

/// Build the final report for a finished run.
pub fn assemble(record: RunRecord, report_prefix: &str) -> AnalysisReport {
    let status = determine_status(
        record.items_loaded,
        record.aggregate.total,
        record.failures.len(),
        record.summary.is_err(),
    );
    let message = status_message(&record, status);

    let (summarization, summarization_error) = match record.summary {
        Ok(summary) => (summary, None),
        Err(e) => (SummaryResult::default(), Some(e.to_string())),
    };

    AnalysisReport {
        status,
        message,
        timestamp: record.started_at,
        models_used: record.models_used,
        categorization: record.aggregate,
        summarization,
        storage_key: report_key(report_prefix, record.started_at),
        window: record.window,
        items_loaded: record.items_loaded,
        items_skipped: record.items_skipped,
        failures: record.failures,
        summarization_error,
        duration_seconds: record.elapsed.as_secs_f64(),
    }
}

/// Write the report to its storage key. Single attempt; failure is fatal.
///
/// An existing report is never replaced: when the key is taken (two runs in
/// the same second) the report moves to `analysis-<HHMMSS>-2.json`,
/// `-3.json` and so on, and `storage_key` is updated to match.
pub async fn persist(
    store: &dyn ContentStore,
    report: &mut AnalysisReport,
) -> Result<(), PipelineError> {
    let key = free_key(store, &report.storage_key)
        .await
        .map_err(|source| PipelineError::PersistReport {
            key: report.storage_key.clone(),
            source,
        })?;
    report.storage_key = key;

    let bytes = serde_json::to_vec_pretty(report)?;
    store
        .put(&report.storage_key, bytes)
        .await
        .map_err(|source| PipelineError::PersistReport {
            key: report.storage_key.clone(),
            source,
        })?;
    info!("Report written to {}", report.storage_key);
    Ok(())
}

async fn free_key(store: &dyn ContentStore, key: &str) -> Result<String, StoreError> {
    if !store.exists(key).await? {
        return Ok(key.to_string());
    }

    let stem = key.strip_suffix(".json").unwrap_or(key);
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}.json", stem, n);
        if !store.exists(&candidate).await? {
            warn!("{} already exists, writing report to {}", key, candidate);
            return Ok(candidate);
        }
        n += 1;
    }
}
