//! Corpus summarization.
//!
//! All posts of the window are concatenated into one corpus document and
//! summarized with a single model call. Each post carries a few of its
//! comments. The corpus is capped in length by dropping the oldest posts first.

use super::content::{truncate_chars, ContentUnit};
use crate::error::{ParseFailure, SummarizationFailure};
use crate::llm::{complete_with_retry, extract_json_object, ModelProvider, ModelRequest, RetryPolicy};
use crate::models::{RawItem, SummaryResult};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Instruction template for the summarization model.
pub const SUMMARIZATION_SYSTEM_PROMPT: &str = r#"You are an analyst writing a weekly digest of community discussion.
You will receive a collection of posts, each prefixed with its date and
followed by some of its comments when it has any.

Respond with exactly one JSON object and nothing else:
{
  "summary": "<a concise narrative of what the community discussed>",
  "main_themes": ["<theme>", "..."],
  "key_insights": ["<insight>", "..."],
  "overall_tone": "<one short phrase>"
}

Order themes and insights from most to least significant."#;

const ENTRY_SEPARATOR: &str = "\n\n";
const MAX_COMMENTS_PER_POST: usize = 10;
const MAX_COMMENT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model: String,
    pub retry: RetryPolicy,
    pub max_item_chars: usize,
    /// Upper bound on the whole corpus document, in characters.
    pub max_corpus_chars: usize,
}

/// Corpus document plus the number of posts it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    pub text: String,
    pub included: usize,
}

#[derive(Debug, Deserialize)]
struct SummaryReply {
    summary: String,
    #[serde(default)]
    main_themes: Vec<String>,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    overall_tone: String,
}

pub struct Summarizer {
    provider: Arc<dyn ModelProvider>,
    config: SummarizerConfig,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn ModelProvider>, config: SummarizerConfig) -> Self {
        Self { provider, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Summarize `items`; an empty corpus yields an empty result without a model call.
    pub async fn summarize(&self, items: &[RawItem]) -> Result<SummaryResult, SummarizationFailure> {
        let corpus = build_corpus(items, self.config.max_item_chars, self.config.max_corpus_chars);
        if corpus.included == 0 {
            debug!("Empty corpus, skipping summarization");
            return Ok(SummaryResult::default());
        }
        if corpus.included < items.len() {
            info!(
                "Corpus capped: summarizing the newest {} of {} posts",
                corpus.included,
                items.len()
            );
        }

        let request = ModelRequest {
            model: self.config.model.clone(),
            system: SUMMARIZATION_SYSTEM_PROMPT.to_string(),
            prompt: format!("Posts:\n\n{}", corpus.text),
        };
        let raw = complete_with_retry(self.provider.as_ref(), &request, &self.config.retry).await?;
        let reply = parse_summary_response(&raw)?;

        Ok(SummaryResult {
            summary: reply.summary,
            main_themes: reply.main_themes,
            key_insights: reply.key_insights,
            overall_tone: reply.overall_tone,
            total_texts_summarized: corpus.included,
        })
    }
}

/// Build the corpus document from posts ordered oldest first.
///
/// Entries read `[YYYY-MM-DD] text`, followed by a comment block when the
/// post has comments, and are kept in chronological order.
/// When the cap is exceeded the oldest entries are dropped; if even the
/// newest entry alone does not fit it is truncated to the cap.
pub fn build_corpus(items: &[RawItem], max_item_chars: usize, max_corpus_chars: usize) -> Corpus {
    let mut entries: Vec<String> = Vec::new();
    let mut used = 0usize;

    for item in items.iter().rev() {
        let unit = ContentUnit::from_item(item, max_item_chars);
        if unit.is_empty() {
            continue;
        }
        let mut entry = format!("[{}] {}", item.authored_at.format("%Y-%m-%d"), unit.text);
        if !item.comments.is_empty() {
            entry.push_str("\nComments:\n");
            entry.push_str(&format_comments(&item.comments));
        }
        let len = entry.chars().count();
        let cost = if entries.is_empty() {
            len
        } else {
            len + ENTRY_SEPARATOR.len()
        };

        if used + cost > max_corpus_chars {
            if entries.is_empty() && max_corpus_chars > 0 {
                entries.push(truncate_chars(&entry, max_corpus_chars).to_string());
            }
            break;
        }
        used += cost;
        entries.push(entry);
    }

    entries.reverse();
    Corpus {
        included: entries.len(),
        text: entries.join(ENTRY_SEPARATOR),
    }
}

/// At most ten comments, each cut to 200 characters, plus a count of the rest.
fn format_comments(comments: &[String]) -> String {
    let mut lines: Vec<String> = comments
        .iter()
        .take(MAX_COMMENTS_PER_POST)
        .map(|comment| {
            let cut = truncate_chars(comment, MAX_COMMENT_CHARS);
            if cut.len() < comment.len() {
                format!("  - {}...", cut)
            } else {
                format!("  - {}", cut)
            }
        })
        .collect();

    if comments.len() > MAX_COMMENTS_PER_POST {
        lines.push(format!(
            "  ... and {} more comments",
            comments.len() - MAX_COMMENTS_PER_POST
        ));
    }
    lines.join("\n")
}

fn parse_summary_response(raw: &str) -> Result<SummaryReply, ParseFailure> {
    let value = extract_json_object(raw).map_err(|reason| ParseFailure::new(reason, raw))?;
    let mut reply: SummaryReply = serde_json::from_value(value)
        .map_err(|e| ParseFailure::new(format!("invalid summary JSON: {}", e), raw))?;

    reply.summary = reply.summary.trim().to_string();
    if reply.summary.is_empty() {
        return Err(ParseFailure::new("empty summary", raw));
    }
    reply.main_themes.retain(|t| !t.trim().is_empty());
    reply.key_insights.retain(|i| !i.trim().is_empty());
    Ok(reply)
}
