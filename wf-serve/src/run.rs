//! HTTP handlers: start/resume a run, list/inspect sessions.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;
use wf_core::session::SessionFilter;
use wf_core::spec::Spec;

use crate::app::{AppState, ListSessionsQuery, ResumeRunRequest, StartRunRequest};
use crate::response::{self, RunResponse};

fn parse_spec(spec_yaml: &str) -> Result<Spec, (StatusCode, Json<response::ErrorResponse>)> {
    serde_yaml::from_str(spec_yaml).map_err(|e| response::bad_request(format!("invalid spec: {e}")))
}

pub(crate) async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(req): Json<StartRunRequest>,
) -> Result<(StatusCode, Json<RunResponse>), (StatusCode, Json<response::ErrorResponse>)> {
    let spec = parse_spec(&req.spec_yaml)?;
    let result = state
        .dispatcher
        .start(&spec, &req.spec_yaml, req.inputs, Some(&state.store))
        .await;
    let status = response::status_for(&result);
    Ok((status, Json(RunResponse::from(&result))))
}

pub(crate) async fn resume_run(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ResumeRunRequest>,
) -> Result<(StatusCode, Json<RunResponse>), (StatusCode, Json<response::ErrorResponse>)> {
    let spec_yaml = req.spec_yaml.clone();
    let spec = parse_spec(&req.spec_yaml)?;
    let hitl_response = req.hitl();
    let result = state
        .dispatcher
        .resume(&spec, &spec_yaml, session_id, hitl_response, &state.store)
        .await;
    let status = response::status_for(&result);
    Ok((status, Json(RunResponse::from(&result))))
}

pub(crate) async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<wf_core::session::SessionMetadata>>, (StatusCode, Json<response::ErrorResponse>)> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()
        .map_err(response::bad_request)?;
    let filter = SessionFilter {
        status,
        workflow_name: query.workflow,
    };
    let sessions = state
        .store
        .list(filter)
        .await
        .map_err(|e| response::bad_request(e.to_string()))?;
    Ok(Json(sessions))
}

pub(crate) async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<wf_core::session::SessionMetadata>, (StatusCode, Json<response::ErrorResponse>)> {
    let session = state
        .store
        .load(session_id)
        .await
        .map_err(|e| response::bad_request(e.to_string()))?
        .ok_or_else(|| response::not_found(format!("no such session: {session_id}")))?;
    Ok(Json(session.metadata))
}

fn parse_status(raw: &str) -> Result<wf_core::session::SessionStatus, String> {
    use wf_core::session::SessionStatus::*;
    match raw.to_ascii_lowercase().as_str() {
        "running" => Ok(Running),
        "paused" => Ok(Paused),
        "completed" => Ok(Completed),
        "failed" => Ok(Failed),
        other => Err(format!("unknown status '{other}'")),
    }
}
