//! Concrete [`wf_core::llm::LlmClient`] implementations.
//!
//! `wf-core` never depends on a concrete provider; this crate supplies the
//! two a host actually wires up: [`openai::OpenAiClient`] for any
//! OpenAI-compatible Chat Completions endpoint, and [`mock::MockLlmClient`]
//! for tests and local dry runs. [`factory::RuntimeClientFactory`] is the
//! `wf_core::agent_runner::ClientFactory` a host registers with the
//! `AgentRunner`: it picks a client per runtime descriptor by `provider` tag.

pub mod factory;
pub mod mock;
pub mod openai;

pub use factory::RuntimeClientFactory;
pub use mock::MockLlmClient;
pub use openai::OpenAiClient;
