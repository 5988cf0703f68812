//! Ollama chat API provider.

use super::{ModelProvider, ModelRequest};
use crate::error::ModelError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Provider backed by a local or remote Ollama server.
pub struct OllamaProvider {
    http_client: reqwest::Client,
    base_url: String,
    temperature: f32,
    timeout_seconds: u64,
}

impl OllamaProvider {
    pub fn new(base_url: &str, temperature: f32, timeout_seconds: u64) -> Result<Self, ModelError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| ModelError::Client(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature,
            timeout_seconds,
        })
    }

    fn classify_send_error(&self, e: reqwest::Error) -> ModelError {
        if e.is_timeout() {
            ModelError::Timeout(self.timeout_seconds)
        } else if e.is_connect() {
            ModelError::Connect(self.base_url.clone())
        } else {
            ModelError::Request(e.to_string())
        }
    }
}

/// Map a non-success HTTP status to a model error.
fn classify_status(status: u16, body: String) -> ModelError {
    match status {
        429 => ModelError::Throttled(status),
        500..=599 => ModelError::Server { status, body },
        _ => ModelError::Rejected { status, body },
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);

        let body = OllamaChatRequest {
            model: &request.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        debug!(
            "Sending chat request to {} ({} prompt chars)",
            request.model,
            request.prompt.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_send_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Envelope(e.to_string()))?;

        Ok(chat_response.message.content)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        assert!(matches!(classify_status(429, String::new()), ModelError::Throttled(429)));
        assert!(matches!(
            classify_status(502, "bad gateway".into()),
            ModelError::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(404, "model not found".into()),
            ModelError::Rejected { status: 404, .. }
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let provider = OllamaProvider::new("http://localhost:11434/", 0.1, 30).unwrap();
        assert_eq!(provider.base_url, "http://localhost:11434");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_request_serialization() {
        let body = OllamaChatRequest {
            model: "llama3.2:3b",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            stream: false,
            options: OllamaOptions { temperature: 0.1 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.2:3b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
