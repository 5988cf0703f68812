//! Markdown digest generation.
//!
//! This module renders a human-readable digest from a persisted
//! `AnalysisReport`: sentiment breakdown, narrative summary, themes,
//! insights, notable posts and dropped posts.

use crate::analysis::aggregator::strongest_verdicts;
use crate::models::{AnalysisReport, ItemFailure, Sentiment, SentimentAggregate, SummaryResult};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

const NOTABLE_PER_LABEL: usize = 3;

/// Generate the complete Markdown digest.
pub fn generate_markdown_report(report: &AnalysisReport) -> String {
    let mut output = String::new();

    output.push_str("# PostPulse Digest\n\n");
    output.push_str(&generate_metadata_section(report));
    output.push_str(&generate_sentiment_section(&report.categorization));
    output.push_str(&generate_summary_section(
        &report.summarization,
        report.summarization_error.as_deref(),
    ));
    output.push_str(&generate_notable_section(&report.categorization));
    output.push_str(&generate_failures_section(&report.failures));
    output.push_str(&generate_footer(report));

    output
}

fn generate_metadata_section(report: &AnalysisReport) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Status:** {} ({})\n",
        report.status, report.message
    ));
    section.push_str(&format!(
        "- **Window:** {} to {}\n",
        report.window.start.format("%Y-%m-%d %H:%M UTC"),
        report.window.end.format("%Y-%m-%d %H:%M UTC")
    ));
    section.push_str(&format!(
        "- **Categorization Model:** `{}`\n",
        report.models_used.categorization_model
    ));
    section.push_str(&format!(
        "- **Summarization Model:** `{}`\n",
        report.models_used.summarization_model
    ));
    section.push_str(&format!("- **Posts Loaded:** {}\n", report.items_loaded));
    if report.items_skipped > 0 {
        section.push_str(&format!(
            "- **Malformed Records Skipped:** {}\n",
            report.items_skipped
        ));
    }
    section.push_str(&format!(
        "- **Run Duration:** {:.1}s\n\n",
        report.duration_seconds
    ));

    section
}

fn generate_sentiment_section(aggregate: &SentimentAggregate) -> String {
    let mut section = String::new();

    section.push_str("## Sentiment\n\n");
    if aggregate.total == 0 {
        section.push_str("No posts were categorized in this window.\n\n");
        return section;
    }

    section.push_str("| Sentiment | Posts | Share |\n");
    section.push_str("|:---|:---:|:---:|\n");
    for sentiment in Sentiment::ALL {
        let count = aggregate.distribution.get(&sentiment).copied().unwrap_or(0);
        let pct = aggregate.percentages.get(&sentiment).copied().unwrap_or(0.0);
        section.push_str(&format!(
            "| {} {} | {} | {:.2}% |\n",
            sentiment.emoji(),
            sentiment,
            count,
            pct
        ));
    }
    section.push_str(&format!("| **Total** | **{}** | |\n\n", aggregate.total));

    if let Some(overall) = aggregate.overall_sentiment {
        section.push_str(&format!(
            "**Overall:** {} {} (average confidence {:.2})\n\n",
            overall.emoji(),
            overall,
            aggregate.average_confidence
        ));
    }

    section
}

fn generate_summary_section(summary: &SummaryResult, error: Option<&str>) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    if let Some(error) = error {
        section.push_str(&format!("> Summary unavailable: {}\n\n", error));
        return section;
    }
    if summary.is_empty() {
        section.push_str("Nothing to summarize.\n\n");
        return section;
    }

    section.push_str(&summary.summary);
    section.push_str("\n\n");
    if !summary.overall_tone.is_empty() {
        section.push_str(&format!("*Tone: {}*\n\n", summary.overall_tone));
    }

    if !summary.main_themes.is_empty() {
        section.push_str("### Main Themes\n\n");
        for (i, theme) in summary.main_themes.iter().enumerate() {
            section.push_str(&format!("{}. {}\n", i + 1, theme));
        }
        section.push('\n');
    }

    if !summary.key_insights.is_empty() {
        section.push_str("### Key Insights\n\n");
        for insight in &summary.key_insights {
            section.push_str(&format!("- {}\n", insight));
        }
        section.push('\n');
    }

    section
}

/// Most confident posts for the two polar labels.
fn generate_notable_section(aggregate: &SentimentAggregate) -> String {
    let mut section = String::new();

    for sentiment in [Sentiment::Positive, Sentiment::Negative] {
        let top = strongest_verdicts(aggregate, sentiment, NOTABLE_PER_LABEL);
        if top.is_empty() {
            continue;
        }
        if section.is_empty() {
            section.push_str("## Notable Posts\n\n");
        }
        section.push_str(&format!("### {} {}\n\n", sentiment.emoji(), sentiment));
        for verdict in top {
            section.push_str(&format!(
                "- `{}` ({:.2}): {}\n",
                verdict.item_ref, verdict.confidence, verdict.reasoning
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_failures_section(failures: &[ItemFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Dropped Posts\n\n");
    section.push_str("| Post | Reason | Detail |\n");
    section.push_str("|:---|:---:|:---|\n");
    for failure in failures {
        section.push_str(&format!(
            "| `{}` | {} | {} |\n",
            failure.item_ref,
            failure.kind,
            failure.detail.replace('|', "\\|").replace('\n', " ")
        ));
    }
    section.push('\n');

    section
}

fn generate_footer(report: &AnalysisReport) -> String {
    format!(
        "---\n\n*Generated by PostPulse on {}. Stored at `{}`.*\n",
        report.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        report.storage_key
    )
}

/// Write the Markdown digest to a file.
pub fn write_report(report: &AnalysisReport, path: &Path) -> Result<()> {
    let content = generate_markdown_report(report);

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate;
    use crate::models::{
        FailureKind, ModelsUsed, ReportWindow, RunStatus, SentimentVerdict,
    };
    use chrono::{Duration, TimeZone, Utc};

    fn create_test_report() -> AnalysisReport {
        let at = Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap();
        let verdict = |id: &str, sentiment: Sentiment, confidence: f64| SentimentVerdict {
            sentiment,
            confidence,
            reasoning: format!("because {}", id),
            item_ref: id.to_string(),
            item_timestamp: at - Duration::hours(1),
        };
        let verdicts = vec![
            verdict("p1", Sentiment::Positive, 0.9),
            verdict("p2", Sentiment::Negative, 0.8),
            verdict("p3", Sentiment::Positive, 0.6),
        ];

        AnalysisReport {
            status: RunStatus::Partial,
            message: "Analyzed 3 of 4 posts; 1 dropped (1 parse)".to_string(),
            timestamp: at,
            models_used: ModelsUsed {
                categorization_model: "llama3.2:latest".to_string(),
                summarization_model: "llama3.1:8b".to_string(),
            },
            categorization: aggregate(&verdicts),
            summarization: SummaryResult {
                summary: "Mostly upbeat week.".to_string(),
                main_themes: vec!["co-op".to_string(), "housing".to_string()],
                key_insights: vec!["Acceptances are up".to_string()],
                overall_tone: "hopeful".to_string(),
                total_texts_summarized: 4,
            },
            storage_key: "reports/2024-06-08/analysis-120000.json".to_string(),
            window: ReportWindow {
                start: at - Duration::days(7),
                end: at,
            },
            items_loaded: 4,
            items_skipped: 1,
            failures: vec![ItemFailure {
                item_ref: "p4".to_string(),
                kind: FailureKind::Parse,
                detail: "confidence 1.5 outside [0, 1]".to_string(),
            }],
            summarization_error: None,
            duration_seconds: 12.34,
        }
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&create_test_report());

        assert!(markdown.contains("# PostPulse Digest"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Sentiment"));
        assert!(markdown.contains("| 🟢 Positive | 2 | 66.67% |"));
        assert!(markdown.contains("**Overall:** 🟢 Positive"));
        assert!(markdown.contains("1. co-op"));
        assert!(markdown.contains("- Acceptances are up"));
        assert!(markdown.contains("## Dropped Posts"));
        assert!(markdown.contains("| `p4` | parse |"));
        assert!(markdown.contains("Malformed Records Skipped:** 1"));
    }

    #[test]
    fn test_notable_posts_ordered_by_confidence() {
        let section = generate_notable_section(&create_test_report().categorization);
        let p1 = section.find("`p1`").unwrap();
        let p3 = section.find("`p3`").unwrap();
        assert!(p1 < p3);
        assert!(section.contains("### 🔴 Negative"));
    }

    #[test]
    fn test_summary_error_is_rendered() {
        let section = generate_summary_section(&SummaryResult::default(), Some("timed out"));
        assert!(section.contains("Summary unavailable: timed out"));
    }

    #[test]
    fn test_empty_aggregate() {
        let section = generate_sentiment_section(&aggregate(&[]));
        assert!(section.contains("No posts were categorized"));
        assert!(generate_notable_section(&aggregate(&[])).is_empty());
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("digest.md");
        write_report(&create_test_report(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# PostPulse Digest"));
    }
}
