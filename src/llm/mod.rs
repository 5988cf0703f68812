//! Language-model provider abstraction.
//!
//! The pipeline only needs "send an instruction and a prompt to a model,
//! get text back". Parsing that text is owned by the caller.

#[cfg(test)]
pub mod mock;
pub mod ollama;
pub mod retry;

pub use ollama::OllamaProvider;
pub use retry::{complete_with_retry, RetryPolicy};

use crate::error::ModelError;
use async_trait::async_trait;
use serde_json::Value;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// Fixed instruction template.
    pub system: String,
    /// Content to act on.
    pub prompt: String,
}

/// A model provider that turns a request into free-form text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;

    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Decode the first JSON object embedded in model output.
///
/// Models frequently wrap the object in prose or Markdown fences. Decoding
/// starts at each `{` in turn and reads exactly one value, so braces in the
/// text after the object are never part of it.
pub fn extract_json_object(text: &str) -> Result<Value, String> {
    let mut first_error = None;

    for (start, _) in text.match_indices('{') {
        let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value)) if value.is_object() => return Ok(value),
            Some(Err(e)) => {
                first_error.get_or_insert(e);
            }
            _ => {}
        }
    }

    match first_error {
        Some(e) => Err(format!("invalid JSON: {}", e)),
        None => Err("no JSON object".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_object() {
        assert_eq!(extract_json_object(r#"{"a": 1}"#), Ok(json!({"a": 1})));
    }

    #[test]
    fn test_extract_fenced_object() {
        let text = "Here you go:\n```json\n{\"a\": {\"b\": 2}}\n```\nHope it helps.";
        assert_eq!(extract_json_object(text), Ok(json!({"a": {"b": 2}})));
    }

    #[test]
    fn test_extract_ignores_braces_in_trailing_prose() {
        let text = "{\"a\": 1}\nNote: labels are {positive, negative}.";
        assert_eq!(extract_json_object(text), Ok(json!({"a": 1})));
    }

    #[test]
    fn test_extract_skips_braces_in_leading_prose() {
        let text = "Pick one of {positive, negative}:\n{\"a\": 2}";
        assert_eq!(extract_json_object(text), Ok(json!({"a": 2})));
    }

    #[test]
    fn test_extract_without_object() {
        assert_eq!(extract_json_object("positive"), Err("no JSON object".to_string()));
        assert!(extract_json_object("} backwards {").is_err());
        assert!(extract_json_object("{\"a\": ").unwrap_err().starts_with("invalid JSON"));
    }
}
