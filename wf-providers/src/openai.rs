//! OpenAI-compatible Chat Completions client (spec.md §2 "invoke agent").
//!
//! Grounded on the pack's `ChatOpenAI` (graphweave): one non-streaming
//! `complete()` call per invocation, since the engine's unit of work is
//! "render a prompt, get a response back," not token-by-token streaming —
//! streaming is a host/CLI concern this crate doesn't need.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, trace};
use wf_core::llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Role, TokenUsage};

/// One OpenAI-compatible Chat Completions endpoint, bound to a model.
///
/// `region_or_host` on the runtime descriptor (if present) is used as a
/// custom API base so the same client type serves any OpenAI-compatible
/// proxy, not only `api.openai.com`.
#[derive(Debug)]
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    provider: String,
    model: String,
}

impl OpenAiClient {
    /// Builds a client for `model` using `OPENAI_API_KEY` from the
    /// environment and, when given, a custom API base.
    pub fn new(model: impl Into<String>, api_base: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        Self {
            client: Client::with_config(config),
            provider: "openai".into(),
            model: model.into(),
        }
    }

    pub fn with_config(config: OpenAIConfig, model: impl Into<String>) -> Self {
        Self {
            client: Client::with_config(config),
            provider: "openai".into(),
            model: model.into(),
        }
    }

    fn to_openai_messages(request: &CompletionRequest) -> Vec<ChatCompletionRequestMessage> {
        let mut messages = vec![ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessage::from(request.system_prompt.as_str()),
        )];
        messages.extend(request.messages.iter().map(|m| match m.role {
            Role::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessage::from(m.content.as_str()),
            ),
            Role::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage::from(m.content.as_str()),
            ),
            Role::Assistant => ChatCompletionRequestMessage::Assistant(m.content.as_str().into()),
        }));
        messages
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        &self.provider
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let openai_messages = Self::to_openai_messages(&request);

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(request.model.clone());
        args.messages(openai_messages);
        if let Some(temperature) = request.temperature {
            args.temperature(temperature);
        }

        let chat_request = args
            .build()
            .map_err(|e| LlmError::Request(format!("request build failed: {e}")))?;

        debug!(model = %request.model, message_count = request.messages.len(), "openai_chat_create");

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::Empty)?;
        let text = choice.message.content.unwrap_or_default();
        if text.is_empty() {
            return Err(LlmError::Empty);
        }

        let usage = response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens as u64,
                output_tokens: u.completion_tokens as u64,
            })
            .unwrap_or_default();

        trace!(text = %text, "openai_chat_response");

        Ok(CompletionResponse { text, usage })
    }
}
