//! Scriptable model provider for tests.

use super::{ModelProvider, ModelRequest};
use crate::error::ModelError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync>;

pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, ModelError>>>,
    responder: Option<Responder>,
    slow_marker: Option<(String, Duration)>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Replay `responses` in order, one per call.
    pub fn scripted(responses: Vec<Result<String, ModelError>>) -> Self {
        Self {
            script: Mutex::new(responses.into()),
            responder: None,
            slow_marker: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with `f(request)`.
    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&ModelRequest) -> Result<String, ModelError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(f)),
            ..Self::scripted(Vec::new())
        }
    }

    /// Delay calls whose prompt contains `marker`.
    pub fn slow_on(mut self, marker: &str, delay: Duration) -> Self {
        self.slow_marker = Some((marker.to_string(), delay));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if let Some((marker, delay)) = &self.slow_marker {
            if request.prompt.contains(marker.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }

        if let Some(responder) = &self.responder {
            return responder(request);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ModelError::Request("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
