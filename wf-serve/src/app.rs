//! Axum app: shared state and router (spec.md §4.7, §6 surfaced over HTTP).
//!
//! Three routes, all backed by the same `wf_core::Dispatcher` the CLI uses:
//! `POST /runs` starts a spec, `POST /runs/:session_id/resume` continues a
//! paused one, and `GET /sessions` / `GET /sessions/:session_id` list or
//! inspect session metadata.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use wf_core::dispatcher::Dispatcher;
use wf_core::pattern::HitlResponse;
use wf_core::session::FileSessionStore;

use crate::run;

pub(crate) struct AppState {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) store: FileSessionStore,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/runs", post(run::start_run))
        .route("/runs/:session_id/resume", post(run::resume_run))
        .route("/sessions", get(run::list_sessions))
        .route("/sessions/:session_id", get(run::get_session))
        .with_state(state)
}

/// Request body for `POST /runs`: the spec text (so the dispatcher can hash
/// it the same way it would from a file) plus caller-supplied inputs.
#[derive(Debug, Deserialize)]
pub(crate) struct StartRunRequest {
    pub spec_yaml: String,
    #[serde(default)]
    pub inputs: std::collections::HashMap<String, serde_json::Value>,
}

/// Request body for `POST /runs/:session_id/resume`.
#[derive(Debug, Deserialize)]
pub(crate) struct ResumeRunRequest {
    pub spec_yaml: String,
    #[serde(default)]
    pub hitl_task_id: Option<String>,
    #[serde(default)]
    pub hitl_response: Option<String>,
}

impl ResumeRunRequest {
    pub(crate) fn hitl(self) -> Option<HitlResponse> {
        match (self.hitl_task_id, self.hitl_response) {
            (Some(task_id), Some(value)) => Some(HitlResponse { task_id, value }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub(crate) struct ListSessionsQuery {
    pub status: Option<String>,
    pub workflow: Option<String>,
}
