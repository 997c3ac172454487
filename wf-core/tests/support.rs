//! Shared test scaffolding for the pattern-executor integration suite:
//! a spec builder per pattern and a [`ClientFactory`] that always hands
//! out one scripted [`MockLlmClient`] regardless of the runtime descriptor,
//! so a scenario can script exactly the sequence of agent responses it
//! expects to consume.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use wf_core::agent_runner::{AgentRunner, ClientFactory};
use wf_core::llm::LlmClient;
use wf_core::spec::{AgentDef, RuntimeDescriptor, SamplingParams, Spec};
use wf_providers::MockLlmClient;

/// Ignores the runtime descriptor entirely and always returns the same
/// client, so tests can script a fixed response sequence independent of
/// how many distinct agent ids a spec names.
pub struct FixedClientFactory(pub Arc<dyn LlmClient>);

#[async_trait]
impl ClientFactory for FixedClientFactory {
    async fn build(&self, _runtime: &RuntimeDescriptor) -> Arc<dyn LlmClient> {
        self.0.clone()
    }
}

pub fn runner_with_scripted_responses(responses: Vec<&str>) -> AgentRunner {
    let client = Arc::new(MockLlmClient::scripted(
        responses.into_iter().map(str::to_string).collect(),
    ));
    AgentRunner::new(Arc::new(FixedClientFactory(client)))
}

pub fn agent(system_prompt: &str) -> AgentDef {
    AgentDef {
        system_prompt: system_prompt.into(),
        tools: None,
        input_schema: None,
        output_schema: None,
    }
}

pub fn runtime() -> RuntimeDescriptor {
    RuntimeDescriptor {
        provider: "mock".into(),
        model: "mock-model".into(),
        region_or_host: None,
        sampling: SamplingParams::default(),
        max_parallel: None,
    }
}

pub fn base_spec(name: &str, agents: HashMap<String, AgentDef>, pattern: wf_core::spec::Pattern) -> Spec {
    Spec {
        version: "1".into(),
        name: name.into(),
        metadata: None,
        runtime: runtime(),
        agents,
        pattern,
        inputs: None,
        artifacts: None,
        budgets: None,
        context_policy: None,
    }
}

pub fn empty_inputs() -> HashMap<String, serde_json::Value> {
    HashMap::new()
}
