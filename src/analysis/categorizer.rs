//! Per-post sentiment categorization.
//!
//! One model call per post. The response text is parsed at a single
//! boundary (`parse_sentiment_response`) into either a typed reply or a
//! `ParseFailure` carrying the raw text.

use super::content::ContentUnit;
use crate::error::{CategorizationFailure, ParseFailure};
use crate::llm::{complete_with_retry, extract_json_object, ModelProvider, ModelRequest, RetryPolicy};
use crate::models::{RawItem, Sentiment, SentimentVerdict};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Instruction template for the classification model.
pub const CATEGORIZATION_SYSTEM_PROMPT: &str = r#"You are a sentiment analyst for social-media posts.
Classify the overall sentiment of the post you are given.

Respond with exactly one JSON object and nothing else:
{"sentiment": "positive" | "negative" | "neutral" | "mixed", "confidence": <number between 0 and 1>, "reasoning": "<one or two sentences>"}

Use "mixed" only when the post clearly carries both positive and negative sentiment."#;

/// Settings for the categorizer.
#[derive(Debug, Clone)]
pub struct CategorizerConfig {
    pub model: String,
    pub retry: RetryPolicy,
    /// Maximum characters of post text sent to the model.
    pub max_item_chars: usize,
}

/// A successfully parsed classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentReply {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub reasoning: String,
}

pub struct Categorizer {
    provider: Arc<dyn ModelProvider>,
    config: CategorizerConfig,
}

impl Categorizer {
    pub fn new(provider: Arc<dyn ModelProvider>, config: CategorizerConfig) -> Self {
        Self { provider, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Classify one post.
    pub async fn categorize(&self, item: &RawItem) -> Result<SentimentVerdict, CategorizationFailure> {
        let unit = ContentUnit::from_item(item, self.config.max_item_chars);
        let request = ModelRequest {
            model: self.config.model.clone(),
            system: CATEGORIZATION_SYSTEM_PROMPT.to_string(),
            prompt: format!("Post:\n{}", unit.text),
        };

        let raw = complete_with_retry(self.provider.as_ref(), &request, &self.config.retry).await?;
        let reply = parse_sentiment_response(&raw).map_err(|failure| {
            debug!("Unparseable output for {}: {:?}", unit.item_ref, failure.raw);
            failure
        })?;
        debug!(
            "{} => {} ({:.2})",
            unit.item_ref, reply.sentiment, reply.confidence
        );

        Ok(SentimentVerdict {
            sentiment: reply.sentiment,
            confidence: reply.confidence,
            reasoning: reply.reasoning,
            item_ref: item.id.clone(),
            item_timestamp: item.authored_at,
        })
    }
}

/// Parse the classification model's output.
///
/// Out-of-range confidence is rejected rather than clamped.
pub fn parse_sentiment_response(raw: &str) -> Result<SentimentReply, ParseFailure> {
    let value = extract_json_object(raw).map_err(|reason| ParseFailure::new(reason, raw))?;

    let label = value
        .get("sentiment")
        .and_then(Value::as_str)
        .ok_or_else(|| ParseFailure::new("missing sentiment", raw))?;
    let sentiment = Sentiment::from_label(label)
        .ok_or_else(|| ParseFailure::new(format!("unknown sentiment label {:?}", label), raw))?;

    let confidence = match value.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ParseFailure::new("missing or non-numeric confidence", raw))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(ParseFailure::new(
            format!("confidence {} outside [0, 1]", confidence),
            raw,
        ));
    }

    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| ParseFailure::new("missing reasoning", raw))?
        .to_string();

    Ok(SentimentReply {
        sentiment,
        confidence,
        reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::llm::mock::MockProvider;
    use chrono::{TimeZone, Utc};

    fn item() -> RawItem {
        RawItem {
            id: "abc".to_string(),
            title: "Finally got into the co-op program".to_string(),
            body: "So happy right now!".to_string(),
            authored_at: Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap(),
            source_ref: "https://reddit.com/r/UBC/abc".to_string(),
            comments: vec!["Congrats!".to_string()],
        }
    }

    fn categorizer(provider: Arc<MockProvider>) -> Categorizer {
        Categorizer::new(
            provider,
            CategorizerConfig {
                model: "classifier".to_string(),
                retry: RetryPolicy::immediate(3),
                max_item_chars: 4000,
            },
        )
    }

    const GOOD: &str = r#"{"sentiment": "positive", "confidence": 0.92, "reasoning": "Celebrates an acceptance."}"#;

    #[test]
    fn test_parse_valid_response() {
        let reply = parse_sentiment_response(GOOD).unwrap();
        assert_eq!(reply.sentiment, Sentiment::Positive);
        assert_eq!(reply.confidence, 0.92);
        assert_eq!(reply.reasoning, "Celebrates an acceptance.");
    }

    #[test]
    fn test_parse_fenced_response_with_string_confidence() {
        let raw = "```json\n{\"sentiment\": \"Mixed\", \"confidence\": \"0.5\", \"reasoning\": \"Both.\"}\n```";
        let reply = parse_sentiment_response(raw).unwrap();
        assert_eq!(reply.sentiment, Sentiment::Mixed);
        assert_eq!(reply.confidence, 0.5);
    }

    #[test]
    fn test_parse_response_followed_by_braced_prose() {
        let raw = "{\"sentiment\": \"positive\", \"confidence\": 0.9, \"reasoning\": \"ok\"}\nNote: labels are {positive, negative}.";
        let reply = parse_sentiment_response(raw).unwrap();
        assert_eq!(reply.sentiment, Sentiment::Positive);
        assert_eq!(reply.confidence, 0.9);
        assert_eq!(reply.reasoning, "ok");
    }

    #[test]
    fn test_out_of_range_confidence_is_rejected() {
        for bad in ["1.2", "-0.1", "87"] {
            let raw = format!(
                r#"{{"sentiment": "negative", "confidence": {}, "reasoning": "x"}}"#,
                bad
            );
            let err = parse_sentiment_response(&raw).unwrap_err();
            assert!(err.reason.contains("outside"), "{}", err.reason);
            assert_eq!(err.raw, raw);
        }
    }

    #[test]
    fn test_missing_fields_are_parse_failures() {
        assert!(parse_sentiment_response("positive").is_err());
        assert!(parse_sentiment_response(r#"{"sentiment": "positive", "reasoning": "x"}"#).is_err());
        assert!(parse_sentiment_response(r#"{"sentiment": "happy", "confidence": 0.5, "reasoning": "x"}"#).is_err());
        assert!(parse_sentiment_response(r#"{"sentiment": "neutral", "confidence": 0.5, "reasoning": "  "}"#).is_err());
        assert!(parse_sentiment_response(r#"{"sentiment": "neutral", "confidence": 0.5,"#).is_err());
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Err(ModelError::Server {
                status: 503,
                body: "overloaded".into(),
            }),
            Err(ModelError::Timeout(30)),
            Ok(GOOD.to_string()),
        ]));

        let verdict = categorizer(provider.clone()).categorize(&item()).await.unwrap();
        assert_eq!(verdict.sentiment, Sentiment::Positive);
        assert_eq!(verdict.item_ref, "abc");
        assert_eq!(verdict.item_timestamp, item().authored_at);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_is_transport_failure() {
        let provider = Arc::new(MockProvider::responding(|_| Err(ModelError::Throttled(429))));

        let err = categorizer(provider.clone()).categorize(&item()).await.unwrap_err();
        assert!(matches!(err, CategorizationFailure::Transport(ref t) if t.attempts == 3));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_parse_failure_is_not_retried() {
        let provider = Arc::new(MockProvider::responding(|_| {
            Ok(r#"{"sentiment": "positive", "confidence": 1.5, "reasoning": "x"}"#.to_string())
        }));

        let err = categorizer(provider.clone()).categorize(&item()).await.unwrap_err();
        assert!(matches!(err, CategorizationFailure::Parse(_)));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_prompt_contains_title_and_body() {
        let provider = Arc::new(MockProvider::responding(|_| Ok(GOOD.to_string())));
        categorizer(provider.clone()).categorize(&item()).await.unwrap();

        let prompts = provider.prompts();
        assert!(prompts[0].contains("Finally got into the co-op program. So happy right now!"));
        assert!(!prompts[0].contains("Congrats!"));
    }
}
