//! Error kinds for the workflow engine and their exit-code mapping.
//!
//! Errors are not caught inside pattern executors; they unwind to the
//! dispatcher, which checkpoints the session and builds the run result.

use thiserror::Error;

/// Exit codes surfaced in [`crate::dispatcher::RunResult::exit_code`].
///
/// Named constants rather than raw integers, mirroring the origin CLI's
/// exit-code module: always match on these, never on a bare `u8`.
pub mod exit_code {
    /// Successful execution.
    pub const EX_OK: i32 = 0;
    /// Command-line usage error. Surfaced by hosts, not by this crate.
    pub const EX_USAGE: i32 = 2;
    /// JSON-Schema validation error. Surfaced by hosts, not by this crate.
    pub const EX_SCHEMA: i32 = 3;
    /// A HITL gate suspended execution; not a failure.
    pub const EX_HITL_PAUSE: i32 = 4;
    /// Provider/model/tool runtime failure.
    pub const EX_RUNTIME: i32 = 10;
    /// Artifact write or session I/O failure.
    pub const EX_IO: i32 = 12;
    /// Spec uses a feature this engine does not support.
    pub const EX_UNSUPPORTED: i32 = 18;
    /// Cumulative token usage reached the configured budget.
    pub const EX_BUDGET_EXCEEDED: i32 = 19;
    /// Unexpected error not covered by a more specific code.
    pub const EX_UNKNOWN: i32 = 70;
}

/// Errors raised during workflow execution.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("spec uses unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("template error: {0}")]
    Template(#[from] crate::template::TemplateError),

    #[error("agent invocation failed: {0}")]
    RuntimeFailure(String),

    #[error("structured output was not valid JSON after retry: {0}")]
    StructuredOutputParseError(String),

    #[error("router chose undefined route: {0}")]
    RouteInvalid(String),

    #[error("graph exceeded max_iterations ({0})")]
    IterationLimitExceeded(u32),

    #[error("cumulative token usage exceeded budget ({input}+{output} >= {max})")]
    BudgetExceeded {
        input: u64,
        output: u64,
        max: u64,
    },

    /// Not really an error: unwinds the pattern executor to let the
    /// dispatcher checkpoint the session as `paused` and return the
    /// HITL-pause exit code, mirroring the source's use of an exception
    /// as the unwind channel for a non-error condition.
    #[error("hitl pause requested for task {task_id}")]
    HitlPauseRequested { task_id: String },

    #[error("session lock timeout: {0}")]
    SessionLockTimeout(#[from] crate::session::lock::LockTimeout),

    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] crate::session::CheckpointError),

    #[error("graph build error: {0}")]
    GraphBuild(#[from] GraphBuildError),

    #[error("session validation error: {0}")]
    SessionValidation(String),
}

impl WorkflowError {
    /// Maps an error to the exit code a dispatcher-level host should return.
    pub fn exit_code(&self) -> i32 {
        use exit_code::*;
        match self {
            WorkflowError::UnsupportedFeature(_) => EX_UNSUPPORTED,
            WorkflowError::Template(_) => EX_RUNTIME,
            WorkflowError::RuntimeFailure(_) => EX_RUNTIME,
            WorkflowError::StructuredOutputParseError(_) => EX_RUNTIME,
            WorkflowError::RouteInvalid(_) => EX_RUNTIME,
            WorkflowError::IterationLimitExceeded(_) => EX_RUNTIME,
            WorkflowError::BudgetExceeded { .. } => EX_BUDGET_EXCEEDED,
            WorkflowError::HitlPauseRequested { .. } => EX_HITL_PAUSE,
            WorkflowError::SessionLockTimeout(_) => EX_RUNTIME,
            WorkflowError::Io(_) => EX_IO,
            WorkflowError::Checkpoint(_) => EX_IO,
            WorkflowError::GraphBuild(_) => EX_UNSUPPORTED,
            WorkflowError::SessionValidation(_) => EX_UNKNOWN,
        }
    }

    /// True when this error is the HITL-pause unwind signal rather than a
    /// genuine failure. The dispatcher uses this to decide whether to
    /// finalize the session as `paused` (not `failed`).
    pub fn is_hitl_pause(&self) -> bool {
        matches!(self, WorkflowError::HitlPauseRequested { .. })
    }
}

/// Errors building or validating a graph/DAG pattern's shape at load time.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("duplicate node/task id: {0}")]
    DuplicateId(String),
    #[error("edge references unknown id: {0}")]
    UnknownId(String),
    #[error("cycle detected among task dependencies")]
    Cycle,
    #[error("no edge matched and no else fallback at node {0}")]
    NoEdgeMatched(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_exceeded_maps_to_ex_budget_exceeded() {
        let err = WorkflowError::BudgetExceeded {
            input: 100,
            output: 50,
            max: 100,
        };
        assert_eq!(err.exit_code(), exit_code::EX_BUDGET_EXCEEDED);
    }

    #[test]
    fn hitl_pause_maps_to_dedicated_code_and_is_detected() {
        let err = WorkflowError::HitlPauseRequested {
            task_id: "step-2".into(),
        };
        assert_eq!(err.exit_code(), exit_code::EX_HITL_PAUSE);
        assert!(err.is_hitl_pause());
    }

    #[test]
    fn runtime_failure_is_not_hitl_pause() {
        let err = WorkflowError::RuntimeFailure("provider timeout".into());
        assert!(!err.is_hitl_pause());
        assert_eq!(err.exit_code(), exit_code::EX_RUNTIME);
    }
}
