//! Data models for the sentiment pipeline.
//!
//! This module contains the core data structures that flow through a run:
//! raw posts, per-post verdicts, the corpus-level aggregate, the narrative
//! summary, and the persisted report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sentiment label assigned to a single post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Approving, hopeful, or enthusiastic content
    Positive,
    /// Critical, frustrated, or pessimistic content
    Negative,
    /// Informational content with no clear lean
    Neutral,
    /// Content that carries both positive and negative signals
    Mixed,
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "Positive"),
            Sentiment::Negative => write!(f, "Negative"),
            Sentiment::Neutral => write!(f, "Neutral"),
            Sentiment::Mixed => write!(f, "Mixed"),
        }
    }
}

impl Sentiment {
    /// All labels, in report order.
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::Mixed,
    ];

    /// Parse a label as emitted by the model (case-insensitive).
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            "mixed" => Some(Sentiment::Mixed),
            _ => None,
        }
    }

    /// Rank used to break ties for the overall sentiment (lower wins).
    pub fn tie_break_rank(&self) -> u8 {
        match self {
            Sentiment::Positive => 0,
            Sentiment::Neutral => 1,
            Sentiment::Mixed => 2,
            Sentiment::Negative => 3,
        }
    }

    /// Returns an emoji representation of the sentiment.
    pub fn emoji(&self) -> &'static str {
        match self {
            Sentiment::Positive => "🟢",
            Sentiment::Negative => "🔴",
            Sentiment::Neutral => "⚪",
            Sentiment::Mixed => "🟡",
        }
    }
}

/// A post as deposited in the content store by the upstream fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    /// Stable identifier of the post.
    pub id: String,
    /// Post title.
    pub title: String,
    /// Post body (may be empty for link posts).
    pub body: String,
    /// When the post was authored.
    pub authored_at: DateTime<Utc>,
    /// Where the post came from (usually its URL).
    pub source_ref: String,
    /// Comment bodies, oldest first. Only the summarizer reads these.
    #[serde(default)]
    pub comments: Vec<String>,
}

/// Structured sentiment classification of one post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentVerdict {
    pub sentiment: Sentiment,
    /// Model confidence, always within `[0, 1]`.
    pub confidence: f64,
    /// Short rationale from the model.
    pub reasoning: String,
    /// Id of the originating post.
    pub item_ref: String,
    /// Authoring time of the originating post.
    pub item_timestamp: DateTime<Utc>,
}

/// Corpus-level reduction of all verdicts in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentAggregate {
    /// Count per label; every label is present.
    pub distribution: BTreeMap<Sentiment, usize>,
    /// Share per label in percent, rounded to two decimals.
    pub percentages: BTreeMap<Sentiment, f64>,
    /// Number of verdicts aggregated.
    pub total: usize,
    /// Mean confidence over all verdicts.
    pub average_confidence: f64,
    /// Dominant label; `None` when there were no verdicts.
    pub overall_sentiment: Option<Sentiment>,
    /// Verdicts ordered by post timestamp.
    pub details: Vec<SentimentVerdict>,
}

/// Narrative summary of the whole corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary: String,
    pub main_themes: Vec<String>,
    pub key_insights: Vec<String>,
    pub overall_tone: String,
    /// Number of posts that made it into the summarized corpus.
    pub total_texts_summarized: usize,
}

impl SummaryResult {
    /// Check if the summary has any content.
    pub fn is_empty(&self) -> bool {
        self.total_texts_summarized == 0 && self.summary.is_empty()
    }
}

/// Outcome of a run as reported to downstream readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Partial => write!(f, "partial"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a post was dropped from aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Model provider unreachable or erroring after all retries
    Transport,
    /// Model answered but the output did not match the expected structure
    Parse,
    /// The run deadline expired before the post was categorized
    Deadline,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "transport"),
            FailureKind::Parse => write!(f, "parse"),
            FailureKind::Deadline => write!(f, "deadline"),
        }
    }
}

/// Record of one post that produced no verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_ref: String,
    pub kind: FailureKind,
    pub detail: String,
}

/// Model identifiers used during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelsUsed {
    pub categorization_model: String,
    pub summarization_model: String,
}

/// Lookback window covered by the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// The persisted artifact of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub status: RunStatus,
    /// Human-readable outcome.
    pub message: String,
    /// When the run was invoked.
    pub timestamp: DateTime<Utc>,
    pub models_used: ModelsUsed,
    pub categorization: SentimentAggregate,
    pub summarization: SummaryResult,
    /// Store key the report is written under.
    pub storage_key: String,
    pub window: ReportWindow,
    /// Posts returned by the loader.
    pub items_loaded: usize,
    /// Records the loader skipped as malformed.
    pub items_skipped: usize,
    /// Posts dropped from aggregation.
    pub failures: Vec<ItemFailure>,
    /// Why the summary is missing; `null` when it succeeded.
    pub summarization_error: Option<String>,
    /// Wall-clock duration of the run in seconds.
    pub duration_seconds: f64,
}

impl AnalysisReport {
    /// Number of dropped posts of the given kind.
    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}
