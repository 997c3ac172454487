//! File-based session repository (spec.md §4.3, §6.2).
//!
//! Each session is a directory under a configurable root:
//! `metadata.json`, `variables.json`, `pattern_state.json`,
//! `token_usage.json`, `spec_snapshot.yaml`, `.lock`. HITL state (spec.md §3)
//! rides inside `metadata.json` alongside the rest of the session metadata
//! rather than its own file. Concurrent writers to the same session id are
//! serialized by the directory lock; writers to different sessions never
//! block each other (spec.md §4.3).

use super::lock::{self, DEFAULT_LOCK_TIMEOUT};
use super::{CheckpointError, HitlState, SessionMetadata, SessionState, SessionStatus};
use crate::llm::TokenUsage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// On-disk shape of `metadata.json`: the session's metadata fields plus its
/// HITL state (spec.md §3 groups HITL state under "Session metadata"), so a
/// session directory never needs a file beyond the ones spec.md §6.2 lists.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct MetadataOnDisk {
    #[serde(flatten)]
    metadata: SessionMetadata,
    hitl_state: Option<HitlState>,
}

/// Filter applied by [`FileSessionStore::list`].
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
    pub status: Option<SessionStatus>,
    pub workflow_name: Option<String>,
}

impl SessionFilter {
    fn matches(&self, meta: &SessionMetadata) -> bool {
        if let Some(status) = self.status {
            if meta.status != status {
                return false;
            }
        }
        if let Some(name) = &self.workflow_name {
            if &meta.workflow_name != name {
                return false;
            }
        }
        true
    }
}

pub struct FileSessionStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!("session_{session_id}"))
    }

    /// Creates a new session directory and writes its initial files.
    pub async fn create(
        &self,
        workflow_name: String,
        spec_text: String,
        spec_hash: String,
        pattern_tag: String,
        variables: HashMap<String, serde_json::Value>,
    ) -> Result<SessionState, CheckpointError> {
        let session = SessionState::new(&workflow_name, &spec_hash, &pattern_tag, variables);
        let dir = self.session_dir(session.metadata.session_id);
        let lock_timeout = self.lock_timeout;
        let session_clone = session.clone();
        tokio::task::spawn_blocking(move || {
            write_all(&dir, &session_clone, Some(&spec_text), lock_timeout)
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))??;
        Ok(session)
    }

    /// Loads a session. Returns `Ok(None)` both when the session directory
    /// doesn't exist and when any required file fails JSON validation —
    /// per spec.md §4.3, a malformed file means "not resumable", not an
    /// error to propagate.
    pub async fn load(&self, session_id: Uuid) -> Result<Option<SessionState>, CheckpointError> {
        let dir = self.session_dir(session_id);
        let lock_timeout = self.lock_timeout;
        tokio::task::spawn_blocking(move || read_all(&dir, lock_timeout))
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    /// Writes metadata and pattern fields under the session directory lock.
    pub async fn save(&self, session: &SessionState) -> Result<(), CheckpointError> {
        let dir = self.session_dir(session.metadata.session_id);
        let lock_timeout = self.lock_timeout;
        let session_clone = session.clone();
        tokio::task::spawn_blocking(move || write_all(&dir, &session_clone, None, lock_timeout))
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    pub async fn list(&self, filter: SessionFilter) -> Result<Vec<SessionMetadata>, CheckpointError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || list_all(&root, &filter))
            .await
            .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    pub async fn delete(&self, session_id: Uuid) -> Result<(), CheckpointError> {
        let dir = self.session_dir(session_id);
        tokio::task::spawn_blocking(move || {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)
                    .map_err(|e| CheckpointError::Storage(e.to_string()))?;
            }
            Ok(())
        })
        .await
        .map_err(|e| CheckpointError::Storage(e.to_string()))?
    }

    /// Deletes sessions last updated before `now - max_age`, per spec.md §3
    /// Lifecycle: "Sessions older than a configurable age are eligible for
    /// cleanup; completed sessions may be preserved indefinitely." Grounded
    /// on `original_source`'s `cleanup_expired_sessions` (same
    /// age-cutoff-on-`updated_at` plus `keep_completed` contract; this
    /// engine has no separate "invalid timestamp" branch because
    /// `updated_at` is a typed `DateTime<Utc>` rather than a string to
    /// reparse). Returns the number of sessions deleted.
    pub async fn cleanup_expired(
        &self,
        max_age: chrono::Duration,
        keep_completed: bool,
    ) -> Result<usize, CheckpointError> {
        let cutoff = chrono::Utc::now() - max_age;
        let sessions = self.list(SessionFilter::default()).await?;

        let mut deleted = 0;
        for meta in sessions {
            if meta.updated_at >= cutoff {
                continue;
            }
            if keep_completed && meta.status == SessionStatus::Completed {
                tracing::debug!(session_id = %meta.session_id, "session_cleanup_kept_completed");
                continue;
            }
            match self.delete(meta.session_id).await {
                Ok(()) => {
                    deleted += 1;
                    tracing::info!(session_id = %meta.session_id, status = ?meta.status, "session_cleaned");
                }
                Err(e) => {
                    tracing::warn!(session_id = %meta.session_id, error = %e, "session_cleanup_failed");
                }
            }
        }

        tracing::info!(deleted_count = deleted, "session_cleanup_complete");
        Ok(deleted)
    }
}

fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

fn write_all(
    dir: &Path,
    session: &SessionState,
    spec_text: Option<&str>,
    lock_timeout: Duration,
) -> Result<(), CheckpointError> {
    std::fs::create_dir_all(dir).map_err(|e| CheckpointError::Storage(e.to_string()))?;
    let _guard =
        lock::acquire(dir, lock_timeout).map_err(|e| CheckpointError::Storage(e.to_string()))?;

    let metadata_on_disk = MetadataOnDisk {
        metadata: session.metadata.clone(),
        hitl_state: session.hitl_state.clone(),
    };
    let metadata_json = serde_json::to_string_pretty(&metadata_on_disk)
        .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    atomic_write(&dir.join("metadata.json"), &metadata_json)
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

    let variables_json = serde_json::to_string_pretty(&session.variables)
        .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    atomic_write(&dir.join("variables.json"), &variables_json)
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

    let pattern_state_json = serde_json::to_string_pretty(&session.pattern_state)
        .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    atomic_write(&dir.join("pattern_state.json"), &pattern_state_json)
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

    let token_usage_json = serde_json::to_string_pretty(&session.token_usage)
        .map_err(|e| CheckpointError::Serialization(e.to_string()))?;
    atomic_write(&dir.join("token_usage.json"), &token_usage_json)
        .map_err(|e| CheckpointError::Storage(e.to_string()))?;

    if let Some(spec_text) = spec_text {
        atomic_write(&dir.join("spec_snapshot.yaml"), spec_text)
            .map_err(|e| CheckpointError::Storage(e.to_string()))?;
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

fn read_all(dir: &Path, lock_timeout: Duration) -> Result<Option<SessionState>, CheckpointError> {
    if !dir.exists() {
        return Ok(None);
    }
    let _guard =
        lock::acquire(dir, lock_timeout).map_err(|e| CheckpointError::Storage(e.to_string()))?;

    let metadata_on_disk: Option<MetadataOnDisk> = read_json(&dir.join("metadata.json"));
    let variables: Option<HashMap<String, serde_json::Value>> =
        read_json(&dir.join("variables.json"));
    let pattern_state: Option<serde_json::Value> = read_json(&dir.join("pattern_state.json"));
    let token_usage: Option<TokenUsage> = read_json(&dir.join("token_usage.json"));

    let (Some(metadata_on_disk), Some(variables), Some(pattern_state), Some(token_usage)) =
        (metadata_on_disk, variables, pattern_state, token_usage)
    else {
        tracing::warn!(dir = %dir.display(), "session_load_malformed_file");
        return Ok(None);
    };

    Ok(Some(SessionState {
        metadata: metadata_on_disk.metadata,
        variables,
        pattern_state,
        token_usage,
        hitl_state: metadata_on_disk.hitl_state,
    }))
}

fn list_all(root: &Path, filter: &SessionFilter) -> Result<Vec<SessionMetadata>, CheckpointError> {
    if !root.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(root).map_err(|e| CheckpointError::Storage(e.to_string()))? {
        let entry = entry.map_err(|e| CheckpointError::Storage(e.to_string()))?;
        if !entry.path().is_dir() {
            continue;
        }
        if let Some(meta) = read_json::<SessionMetadata>(&entry.path().join("metadata.json")) {
            if filter.matches(&meta) {
                out.push(meta);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_load_round_trips_byte_for_byte_on_json_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let created = store
            .create(
                "demo".into(),
                "name: demo\n".into(),
                "deadbeef".into(),
                "chain".into(),
                HashMap::new(),
            )
            .await
            .unwrap();

        let loaded = store.load(created.metadata.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.metadata.session_id, created.metadata.session_id);
        assert_eq!(loaded.metadata.spec_hash, created.metadata.spec_hash);
        assert_eq!(loaded.metadata.pattern_tag, "chain");
    }

    #[tokio::test]
    async fn load_missing_session_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let loaded = store.load(Uuid::new_v4()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn load_with_malformed_json_returns_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let created = store
            .create(
                "demo".into(),
                "name: demo\n".into(),
                "hash".into(),
                "chain".into(),
                HashMap::new(),
            )
            .await
            .unwrap();
        let session_dir = dir
            .path()
            .join(format!("session_{}", created.metadata.session_id));
        std::fs::write(session_dir.join("pattern_state.json"), "{not valid json").unwrap();

        let loaded = store.load(created.metadata.session_id).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_updates_pattern_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let mut session = store
            .create(
                "demo".into(),
                "name: demo\n".into(),
                "hash".into(),
                "chain".into(),
                HashMap::new(),
            )
            .await
            .unwrap();
        session.pattern_state = serde_json::json!({"completed_steps": 2});
        store.save(&session).await.unwrap();

        let loaded = store.load(session.metadata.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.pattern_state["completed_steps"], 2);
    }

    #[tokio::test]
    async fn list_filters_by_status() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let mut running = store
            .create("a".into(), "x".into(), "h1".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();
        let mut completed = store
            .create("b".into(), "x".into(), "h2".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();
        completed.complete();
        store.save(&completed).await.unwrap();
        running.metadata.touch();
        store.save(&running).await.unwrap();

        let completed_only = store
            .list(SessionFilter {
                status: Some(SessionStatus::Completed),
                workflow_name: None,
            })
            .await
            .unwrap();
        assert_eq!(completed_only.len(), 1);
        assert_eq!(completed_only[0].workflow_name, "b");
    }

    #[tokio::test]
    async fn delete_removes_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());
        let created = store
            .create("a".into(), "x".into(), "h".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();
        store.delete(created.metadata.session_id).await.unwrap();
        assert!(store.load(created.metadata.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_expired_deletes_stale_sessions_past_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut stale = store
            .create("a".into(), "x".into(), "h1".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();
        stale.metadata.updated_at = chrono::Utc::now() - chrono::Duration::days(10);
        store.save(&stale).await.unwrap();

        let fresh = store
            .create("b".into(), "x".into(), "h2".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();

        let deleted = store
            .cleanup_expired(chrono::Duration::days(7), true)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(store.load(stale.metadata.session_id).await.unwrap().is_none());
        assert!(store.load(fresh.metadata.session_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cleanup_expired_preserves_completed_sessions_when_keep_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut stale_completed = store
            .create("a".into(), "x".into(), "h1".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();
        stale_completed.complete();
        stale_completed.metadata.updated_at = chrono::Utc::now() - chrono::Duration::days(30);
        store.save(&stale_completed).await.unwrap();

        let deleted = store
            .cleanup_expired(chrono::Duration::days(7), true)
            .await
            .unwrap();

        assert_eq!(deleted, 0);
        assert!(store
            .load(stale_completed.metadata.session_id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn cleanup_expired_deletes_stale_completed_sessions_when_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let mut stale_completed = store
            .create("a".into(), "x".into(), "h1".into(), "chain".into(), HashMap::new())
            .await
            .unwrap();
        stale_completed.complete();
        stale_completed.metadata.updated_at = chrono::Utc::now() - chrono::Duration::days(30);
        store.save(&stale_completed).await.unwrap();

        let deleted = store
            .cleanup_expired(chrono::Duration::days(7), false)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(store
            .load(stale_completed.metadata.session_id)
            .await
            .unwrap()
            .is_none());
    }
}
