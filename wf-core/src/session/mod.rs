//! Session: the mutable, persisted state of a single workflow run (spec.md
//! §3 "Session").

pub mod lock;
pub mod store;

use crate::llm::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

pub use store::{FileSessionStore, SessionFilter};

/// Errors from checkpoint persistence, grounded on the pack's
/// `CheckpointError` (same four variants, renamed for a session id rather
/// than a thread id key).
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("session id is required for this operation")]
    SessionIdRequired,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("session not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Paused,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: Uuid,
    pub workflow_name: String,
    pub spec_hash: String,
    pub pattern_tag: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn new(workflow_name: &str, spec_hash: &str, pattern_tag: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            workflow_name: workflow_name.to_string(),
            spec_hash: spec_hash.to_string(),
            pattern_tag: pattern_tag.to_string(),
            status: SessionStatus::Running,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// HITL state, present only while the session is paused (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitlState {
    pub active: bool,
    pub task_id: String,
    pub prompt: String,
    pub context_display: String,
    pub default_response: Option<String>,
    pub timeout_at: Option<DateTime<Utc>>,
}

/// The mutable runtime state of one workflow run, persisted across pauses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub metadata: SessionMetadata,
    pub variables: HashMap<String, serde_json::Value>,
    /// Pattern-specific record (spec.md §4.6); kept as a loosely typed
    /// value here so the store doesn't need one schema per pattern — each
    /// executor owns serializing/deserializing its own shape into this
    /// field (see `crate::pattern::common::PatternState`).
    pub pattern_state: serde_json::Value,
    pub token_usage: TokenUsage,
    pub hitl_state: Option<HitlState>,
}

impl SessionState {
    pub fn new(
        workflow_name: &str,
        spec_hash: &str,
        pattern_tag: &str,
        variables: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            metadata: SessionMetadata::new(workflow_name, spec_hash, pattern_tag),
            variables,
            pattern_state: serde_json::Value::Null,
            token_usage: TokenUsage::default(),
            hitl_state: None,
        }
    }

    /// Invariant: status `paused` iff HITL state is active (spec.md §3).
    pub fn is_consistent(&self) -> bool {
        let hitl_active = self.hitl_state.as_ref().is_some_and(|h| h.active);
        (self.metadata.status == SessionStatus::Paused) == hitl_active
    }

    pub fn pause(&mut self, hitl: HitlState) {
        debug_assert!(hitl.active);
        self.hitl_state = Some(hitl);
        self.metadata.status = SessionStatus::Paused;
        self.metadata.touch();
    }

    pub fn resume(&mut self) {
        self.hitl_state = None;
        self.metadata.status = SessionStatus::Running;
        self.metadata.touch();
    }

    pub fn complete(&mut self) {
        self.metadata.status = SessionStatus::Completed;
        self.metadata.touch();
    }

    pub fn fail(&mut self) {
        self.metadata.status = SessionStatus::Failed;
        self.metadata.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_running_and_consistent() {
        let s = SessionState::new("demo", "hash", "chain", HashMap::new());
        assert_eq!(s.metadata.status, SessionStatus::Running);
        assert!(s.is_consistent());
    }

    #[test]
    fn pause_sets_status_and_hitl_active() {
        let mut s = SessionState::new("demo", "hash", "chain", HashMap::new());
        s.pause(HitlState {
            active: true,
            task_id: "step-2".into(),
            prompt: "approve?".into(),
            context_display: "".into(),
            default_response: None,
            timeout_at: None,
        });
        assert_eq!(s.metadata.status, SessionStatus::Paused);
        assert!(s.is_consistent());
    }

    #[test]
    fn resume_clears_hitl_state_and_runs() {
        let mut s = SessionState::new("demo", "hash", "chain", HashMap::new());
        s.pause(HitlState {
            active: true,
            task_id: "t".into(),
            prompt: "p".into(),
            context_display: "".into(),
            default_response: None,
            timeout_at: None,
        });
        s.resume();
        assert_eq!(s.metadata.status, SessionStatus::Running);
        assert!(s.hitl_state.is_none());
        assert!(s.is_consistent());
    }
}
