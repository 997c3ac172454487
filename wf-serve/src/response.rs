//! Shared JSON shapes for the REST handlers.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use wf_core::dispatcher::RunResult;

#[derive(Debug, Serialize)]
pub(crate) struct RunResponse {
    pub success: bool,
    pub exit_code: i32,
    pub pattern: String,
    pub session_id: Option<uuid::Uuid>,
    pub last_response: Option<String>,
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub artifacts_written: Vec<String>,
}

impl From<&RunResult> for RunResponse {
    fn from(result: &RunResult) -> Self {
        Self {
            success: result.success,
            exit_code: result.exit_code,
            pattern: result.pattern_tag.clone(),
            session_id: result.session_id,
            last_response: result.last_response.clone(),
            error: result.error.clone(),
            duration_seconds: result.duration_seconds,
            artifacts_written: result.artifacts_written.clone(),
        }
    }
}

/// Maps a `RunResult` to an HTTP status: 200 when it ran to completion, 202
/// when it paused for human input, 422 for any other failure.
pub(crate) fn status_for(result: &RunResult) -> StatusCode {
    if result.success {
        StatusCode::OK
    } else if result.exit_code == wf_core::error::exit_code::EX_HITL_PAUSE {
        StatusCode::ACCEPTED
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
}

pub(crate) fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message.into() }))
}

pub(crate) fn not_found(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error: message.into() }))
}
