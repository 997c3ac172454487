//! Orchestrator-workers pattern (spec.md §4.6.7): an orchestrator agent
//! plans a list of subtasks as a JSON array, workers execute each
//! subtask, and a reduce step combines their responses. The orchestrator
//! may re-plan for up to `max_rounds` rounds, seeing prior workers'
//! output before deciding whether to delegate more work.

use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::spec::pattern::OrchestratorWorkersConfig;
use crate::template::Namespace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorWorkersState {
    pub round: u32,
    pub worker_responses: Vec<String>,
    pub reduce_response: Option<String>,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &OrchestratorWorkersConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;

    let mut state: OrchestratorWorkersState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    for response in &state.worker_responses {
        namespace.push_worker(response);
    }

    if state.round == 0 && state.worker_responses.is_empty() {
        ctx.emit(
            "workflow_start",
            serde_json::json!({ "max_rounds": config.orchestrator.max_rounds }),
        )
        .await;
    }

    while state.round < config.orchestrator.max_rounds {
        ctx.emit("round_start", serde_json::json!({ "round": state.round }))
            .await;

        let plan_prompt = namespace.to_value().to_string();
        let tasks = plan(ctx, config, &plan_prompt).await?;

        if tasks.is_empty() {
            break;
        }

        // `max_workers` bounds how many worker invocations are in flight at
        // once, not how many subtasks the round may contain (spec.md
        // §4.6.7 step 2) — every planned task runs, batched the same way
        // `workflow_dag.rs` batches ready tasks per round.
        for batch in tasks.chunks(config.orchestrator.max_workers.max(1)) {
            for task in batch {
                let response = ctx.invoke_agent(&config.worker.agent, &task.task).await?;
                namespace.push_worker(&response);
                state.worker_responses.push(response);

                ctx.checkpoint(serde_json::to_value(&state).expect("OrchestratorWorkersState serializes"))
                    .await?;
            }
        }

        state.round += 1;
        ctx.checkpoint(serde_json::to_value(&state).expect("OrchestratorWorkersState serializes"))
            .await?;
        ctx.emit("round_complete", serde_json::json!({ "round": state.round }))
            .await;
    }

    if state.reduce_response.is_none() {
        let rendered =
            super::common::render_unit(ctx.renderer, &config.reduce.input_template, &namespace)?;
        let response = ctx.invoke_agent(&config.reduce.agent, &rendered).await?;
        namespace.set_last_response(&response);
        state.reduce_response = Some(response);
        ctx.checkpoint(serde_json::to_value(&state).expect("OrchestratorWorkersState serializes"))
            .await?;
    } else if let Some(response) = &state.reduce_response {
        namespace.set_last_response(response);
    }

    ctx.emit("workflow_complete", serde_json::json!({})).await;

    Ok(ExecutionOutcome {
        last_response: state.reduce_response.clone().unwrap_or_default(),
        namespace,
    })
}

#[derive(Debug, Deserialize)]
struct PlannedTask {
    task: String,
}

async fn plan(
    ctx: &mut ExecCtx<'_>,
    config: &OrchestratorWorkersConfig,
    plan_prompt: &str,
) -> Result<Vec<PlannedTask>, WorkflowError> {
    // One syntactic retry allowed (spec.md §4.6.7).
    let mut last_err = None;
    for attempt in 0..2 {
        let plan_response = ctx.invoke_agent(&config.orchestrator.agent, plan_prompt).await?;
        match parse_plan(&plan_response) {
            Ok(tasks) => return Ok(tasks),
            Err(e) => {
                tracing::warn!(attempt, "orchestrator_response_unparseable");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.expect("loop ran at least once"))
}

fn parse_plan(response: &str) -> Result<Vec<PlannedTask>, WorkflowError> {
    serde_json::from_str(response.trim()).map_err(|e| {
        WorkflowError::StructuredOutputParseError(format!(
            "orchestrator response not a valid JSON array of {{task}} objects: {e}"
        ))
    })
}
