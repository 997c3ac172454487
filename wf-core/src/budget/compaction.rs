//! Context compaction: summarize-oldest, preserve-N-most-recent (spec.md
//! §4.2, §4.4), grounded on the pack's `ContextCompactor` (same
//! categorize → select-recent → summarize → rebuild shape, renamed fields
//! to match this spec's `context_policy` config).

use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, Role};
use crate::spec::ContextPolicyConfig;

#[derive(Debug, Clone)]
pub struct CompactionConfig {
    pub summary_ratio: f64,
    pub preserve_recent_messages: usize,
    pub summary_model: String,
}

impl CompactionConfig {
    pub fn from_policy(policy: &ContextPolicyConfig, model: &str) -> Self {
        Self {
            summary_ratio: policy.summary_ratio,
            preserve_recent_messages: policy.preserve_recent_messages,
            summary_model: model.to_string(),
        }
    }
}

const SUMMARIZER_SYSTEM_PROMPT: &str =
    "Summarize the following conversation concisely, preserving decisions, facts, and open questions.";

/// Compacts a message history once: system messages are always kept, the
/// most recent `preserve_recent_messages` non-system messages are kept
/// verbatim, and everything older is replaced by one LLM-generated summary
/// message (spec.md §4.2 "summarize-oldest, preserve N most-recent").
pub struct ContextCompactor;

impl ContextCompactor {
    /// True once the budget tracker has crossed the warn ratio and the
    /// spec's context policy has compaction enabled (spec.md §4.4).
    pub fn needs_compaction(warned: bool, policy: Option<&ContextPolicyConfig>) -> bool {
        warned && policy.is_some_and(|p| p.compaction_enabled)
    }

    pub async fn compact(
        messages: &[Message],
        llm: &dyn LlmClient,
        config: &CompactionConfig,
    ) -> Result<Vec<Message>, LlmError> {
        let (system, rest): (Vec<&Message>, Vec<&Message>) =
            messages.iter().partition(|m| m.role == Role::System);

        if rest.len() <= config.preserve_recent_messages {
            return Ok(messages.to_vec());
        }

        let split_at = rest.len() - config.preserve_recent_messages;
        let (to_summarize, recent) = rest.split_at(split_at);

        let transcript = to_summarize
            .iter()
            .map(|m| format!("{:?}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n");

        let request = CompletionRequest {
            system_prompt: SUMMARIZER_SYSTEM_PROMPT.to_string(),
            messages: vec![Message::user(transcript)],
            model: config.summary_model.clone(),
            temperature: Some(0.3),
        };
        let response = llm.complete(request).await?;

        let mut compacted = Vec::with_capacity(system.len() + 1 + recent.len());
        compacted.extend(system.into_iter().cloned());
        compacted.push(Message::assistant(format!(
            "[compacted summary of {} earlier messages]\n{}",
            to_summarize.len(),
            response.text
        )));
        compacted.extend(recent.iter().map(|&m| m.clone()));
        Ok(compacted)
    }
}
