//! The LLM client seam: the opaque "invoke agent" operation the spec treats
//! as an external collaborator. `wf-core` only depends on the [`LlmClient`]
//! trait; concrete providers (OpenAI-compatible HTTP, a deterministic mock
//! for tests) live in `wf-providers`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

/// A message role in a conversation sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token accounting reported by (or estimated for) a single completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A request to complete a conversation against one configured agent.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: Option<f32>,
}

/// A provider's response to a [`CompletionRequest`].
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned an empty completion")]
    Empty,
}

/// The opaque "invoke agent" operation. Implemented per-provider in
/// `wf-providers`; `wf-core` never depends on a concrete provider crate.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    /// Provider tag, e.g. `"openai"`, `"anthropic"`, `"bedrock"`.
    fn provider(&self) -> &str;
    /// Model id this client was built for.
    fn model(&self) -> &str;
    /// Run one completion. Implementations report token usage when the
    /// provider returns it; otherwise the caller estimates via
    /// [`crate::agent_runner::token_counter`].
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_usage_total_sums_input_and_output() {
        let usage = TokenUsage {
            input_tokens: 120,
            output_tokens: 40,
        };
        assert_eq!(usage.total(), 160);
    }

    #[test]
    fn message_constructors_set_expected_role() {
        assert_eq!(Message::system("s").role, Role::System);
        assert_eq!(Message::user("u").role, Role::User);
        assert_eq!(Message::assistant("a").role, Role::Assistant);
    }
}
