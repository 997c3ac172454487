//! Deterministic token estimation, used when a provider doesn't report
//! usage (spec.md §4.2 "estimated via a deterministic tokenizer... fall
//! back to a Claude/GPT-compatible BPE when unknown").
//!
//! Grounded on the original's `TokenCounter`: per-message overhead of 4
//! tokens plus 2 tokens of reply-priming, and an encoding chosen by model
//! id substring match that falls back to a single universal encoding for
//! every unrecognized id. No BPE vocabulary/merge-table crate is available
//! in this workspace's dependency set, so the "encoding" here is a
//! deterministic word/subword heuristic rather than an exact
//! `cl100k_base` table — acceptable per spec.md §9 ("an estimate for
//! budget, not a contract for billing").

use crate::llm::Message;

const TOKENS_PER_MESSAGE: u64 = 4;
const REPLY_PRIMING_TOKENS: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Stands in for `cl100k_base`: selected for Claude/Anthropic and
    /// GPT-3.5/4 model ids, and used as the universal fallback for any
    /// other id (mirroring the original's `KeyError` fallback path).
    Cl100kCompatible,
}

/// Picks an encoding from a model id. Every branch currently resolves to
/// the same compatible encoding, matching the original's behavior where
/// `encoding_for_model` misses fall back to `cl100k_base` regardless of
/// which branch was taken.
pub fn encoding_for_model(model_id: &str) -> Encoding {
    let lower = model_id.to_lowercase();
    if lower.contains("claude") || lower.contains("anthropic") {
        Encoding::Cl100kCompatible
    } else if lower.contains("gpt-4") || lower.contains("gpt-3.5") {
        Encoding::Cl100kCompatible
    } else {
        Encoding::Cl100kCompatible
    }
}

/// Estimates token count for a single string under the given encoding.
pub fn count_text(text: &str, _encoding: Encoding) -> u64 {
    if text.is_empty() {
        return 0;
    }
    // Approximate a BPE's behavior: roughly one token per 4 characters,
    // with a floor of one token per whitespace-delimited word so very
    // short, punctuation-heavy strings don't round to zero.
    let by_chars = (text.chars().count() as f64 / 4.0).ceil() as u64;
    let by_words = text.split_whitespace().count() as u64;
    by_chars.max(by_words).max(1)
}

/// Estimates total tokens for a message list using the original's
/// per-message overhead convention: 4 tokens/message + 2 tokens reply
/// priming, plus each message's role and content.
pub fn count_messages(messages: &[Message], model_id: &str) -> u64 {
    let encoding = encoding_for_model(model_id);
    let mut total = 0u64;
    for message in messages {
        total += TOKENS_PER_MESSAGE;
        total += count_text(&format!("{:?}", message.role), encoding);
        total += count_text(&message.content, encoding);
    }
    total + REPLY_PRIMING_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn empty_text_counts_zero() {
        assert_eq!(count_text("", Encoding::Cl100kCompatible), 0);
    }

    #[test]
    fn non_empty_text_counts_at_least_one() {
        assert!(count_text("!", Encoding::Cl100kCompatible) >= 1);
    }

    #[test]
    fn claude_and_gpt_and_unknown_all_select_compatible_encoding() {
        assert_eq!(encoding_for_model("claude-3-opus"), Encoding::Cl100kCompatible);
        assert_eq!(encoding_for_model("gpt-4o"), Encoding::Cl100kCompatible);
        assert_eq!(encoding_for_model("some-future-model"), Encoding::Cl100kCompatible);
    }

    #[test]
    fn count_messages_includes_per_message_and_reply_priming_overhead() {
        let messages = vec![Message::user("hi")];
        let total = count_messages(&messages, "gpt-4o");
        // At minimum: 4 (per-message) + role tokens + content token + 2 (priming).
        assert!(total >= TOKENS_PER_MESSAGE + REPLY_PRIMING_TOKENS + 1);
    }
}
