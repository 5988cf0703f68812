//! Error taxonomy for the pipeline.
//!
//! Item-level failures (`CategorizationFailure`) are recovered locally and end
//! up in the report. Only `PipelineError` aborts a run.

use crate::models::FailureKind;
use thiserror::Error;

/// Failure talking to the content store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),
    #[error("store I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure talking to a model provider.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("request timed out after {0}s")]
    Timeout(u64),
    #[error("cannot connect to model provider at {0}")]
    Connect(String),
    #[error("model provider throttled the request (HTTP {0})")]
    Throttled(u16),
    #[error("model provider error {status}: {body}")]
    Server { status: u16, body: String },
    #[error("model provider rejected the request {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("malformed provider response: {0}")]
    Envelope(String),
    #[error("failed to send request: {0}")]
    Request(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl ModelError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::Timeout(_)
                | ModelError::Connect(_)
                | ModelError::Throttled(_)
                | ModelError::Server { .. }
                | ModelError::Request(_)
        )
    }
}

/// A model call that failed at the transport level, after retries.
#[derive(Error, Debug)]
#[error("transport failure after {attempts} attempt(s): {source}")]
pub struct TransportFailure {
    pub attempts: u32,
    #[source]
    pub source: ModelError,
}

/// Model output that did not match the expected structure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unparseable model output: {reason}")]
pub struct ParseFailure {
    pub reason: String,
    /// The raw model text, kept for diagnostics.
    pub raw: String,
}

impl ParseFailure {
    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

/// Why one post could not be categorized.
#[derive(Error, Debug)]
pub enum CategorizationFailure {
    #[error(transparent)]
    Transport(#[from] TransportFailure),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
}

impl CategorizationFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            CategorizationFailure::Transport(_) => FailureKind::Transport,
            CategorizationFailure::Parse(_) => FailureKind::Parse,
        }
    }
}

/// Why the corpus summary could not be produced.
#[derive(Error, Debug)]
pub enum SummarizationFailure {
    #[error(transparent)]
    Transport(#[from] TransportFailure),
    #[error(transparent)]
    Parse(#[from] ParseFailure),
    #[error("run deadline expired before summarization finished")]
    Deadline,
}

/// Conditions that make a run fail as a whole.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot list items under {prefix:?}: {source}")]
    ListWindow {
        prefix: String,
        #[source]
        source: StoreError,
    },
    #[error("cannot persist report to {key}: {source}")]
    PersistReport {
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ModelError::Timeout(5).is_retryable());
        assert!(ModelError::Throttled(429).is_retryable());
        assert!(ModelError::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ModelError::Rejected {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!ModelError::Envelope("bad json".into()).is_retryable());
    }

    #[test]
    fn test_failure_kind_mapping() {
        let parse: CategorizationFailure = ParseFailure::new("missing field", "{}").into();
        assert_eq!(parse.kind(), FailureKind::Parse);

        let transport: CategorizationFailure = TransportFailure {
            attempts: 3,
            source: ModelError::Timeout(10),
        }
        .into();
        assert_eq!(transport.kind(), FailureKind::Transport);
        assert!(transport.to_string().contains("3 attempt"));
    }
}
