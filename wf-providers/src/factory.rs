//! [`wf_core::agent_runner::ClientFactory`] wiring a runtime descriptor's
//! `provider` tag to a concrete client.

use crate::{MockLlmClient, OpenAiClient};
use async_trait::async_trait;
use std::sync::Arc;
use wf_core::agent_runner::ClientFactory;
use wf_core::llm::LlmClient;
use wf_core::spec::RuntimeDescriptor;

/// Builds a client per runtime descriptor: `provider: "mock"` gets a fixed
/// [`MockLlmClient`]; anything else is treated as an OpenAI-compatible
/// endpoint, using `region_or_host` as a custom API base when present.
pub struct RuntimeClientFactory {
    mock_response: String,
}

impl RuntimeClientFactory {
    pub fn new() -> Self {
        Self {
            mock_response: "ok".into(),
        }
    }

    /// The response `provider: "mock"` runtimes get when no per-test client
    /// is registered directly with `AgentRunner::new`.
    pub fn with_mock_response(mut self, response: impl Into<String>) -> Self {
        self.mock_response = response.into();
        self
    }
}

impl Default for RuntimeClientFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientFactory for RuntimeClientFactory {
    async fn build(&self, runtime: &RuntimeDescriptor) -> Arc<dyn LlmClient> {
        if runtime.provider.eq_ignore_ascii_case("mock") {
            return Arc::new(MockLlmClient::fixed(self.mock_response.clone()).with_model(runtime.model.clone()));
        }
        Arc::new(OpenAiClient::new(
            runtime.model.clone(),
            runtime.region_or_host.as_deref(),
        ))
    }
}
