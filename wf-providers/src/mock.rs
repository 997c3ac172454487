//! Deterministic mock client for tests and dry runs.
//!
//! Grounded on the pack's `MockLlm` (fixed or stateful canned responses);
//! here the state is a queue of scripted responses consumed one per call,
//! repeating the last entry once exhausted so a workflow with more steps
//! than scripted responses still runs to completion instead of panicking.

use async_trait::async_trait;
use tokio::sync::Mutex;
use wf_core::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, TokenUsage};

/// Returns scripted responses in order, one per `complete()` call.
#[derive(Debug)]
pub struct MockLlmClient {
    provider: String,
    model: String,
    responses: Mutex<Vec<String>>,
}

impl MockLlmClient {
    /// A client that always returns the same response.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::scripted(vec![response.into()])
    }

    /// A client that returns each response in order, then repeats the last
    /// one for any further calls.
    pub fn scripted(responses: Vec<String>) -> Self {
        Self {
            provider: "mock".into(),
            model: "mock-model".into(),
            responses: Mutex::new(responses),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut responses = self.responses.lock().await;
        let text = if responses.len() > 1 {
            responses.remove(0)
        } else {
            responses
                .first()
                .cloned()
                .ok_or(LlmError::Empty)?
        };
        Ok(CompletionResponse {
            text,
            usage: TokenUsage::default(),
        })
    }
}
