//! The completion provider abstraction and its test double.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, ContentBlock, StopReason, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Run `f` with exponential backoff, retrying only transient errors.
///
/// A provider-supplied `retry_after` takes precedence over the computed backoff.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut backoff = initial_backoff;
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() || attempt >= max_retries => return Err(e),
            Err(e) => {
                let wait = e.retry_after().unwrap_or(backoff);
                attempt += 1;
                tracing::warn!(
                    backend = backend_name,
                    attempt,
                    max_retries,
                    backoff_ms = wait.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(wait).await;
                backoff *= 2;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A completion provider.
///
/// Implementations send the transcript, tool definitions and optional
/// response format to a model and return either tool calls or a final answer.
/// Backends are expected to handle tools natively: tool calls come back as
/// structured `tool_use` blocks, never as text to be parsed.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    fn name(&self) -> &str;

    /// Cheap connectivity and configuration check.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// A backend that can be shared across tasks.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// One scripted reply from [`MockBackend`].
#[derive(Debug)]
pub enum MockResponse {
    Success(CompletionResponse),
    Error(LlmError),
    /// Sleep before answering. Used to exercise timeouts and cancellation.
    Delayed(Duration, CompletionResponse),
}

impl From<CompletionResponse> for MockResponse {
    fn from(response: CompletionResponse) -> Self {
        MockResponse::Success(response)
    }
}

/// A scripted backend for tests.
///
/// Replies are handed out in order. Every request is recorded so tests can
/// inspect the transcript the caller sent. Running out of replies is a
/// backend error.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: Mutex<VecDeque<MockResponse>>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self::with_results(responses.into_iter().map(MockResponse::from).collect())
    }

    pub fn with_results(responses: Vec<MockResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses.into()),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// A backend answering once with `text`.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![Self::text_response(text)])
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A final-answer response as the mock would build it.
    pub fn text_response(text: impl Into<String>) -> CompletionResponse {
        CompletionResponse::new(
            "mock_msg",
            "mock-model",
            vec![ContentBlock::text(text)],
            StopReason::EndTurn,
            Usage::new(10, 20),
        )
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().push(request);

        let next = self.responses.lock().pop_front();
        match next {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            Some(MockResponse::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            None => Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
