//! Parallel-branches pattern (spec.md §4.6.2): independent branches of
//! chain steps, each contributing `branches.<id>.response`, followed by a
//! single reduce step over all of them.
//!
//! Branches are logically independent (no branch reads another's output)
//! but share one `ExecCtx`, so they run interleaved rather than on
//! separate OS threads — every branch still goes through the same session
//! lock to checkpoint, which would serialize real concurrent writes
//! anyway. `runtime.max_parallel` bounds how many branches are in flight:
//! branches run in batches of at most that many (sorted by branch id for
//! deterministic reruns), each batch's branches run to completion before
//! the next batch starts, the same per-round `.take(max_parallel)`
//! batching `workflow_dag.rs` uses for ready tasks.

use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::pattern::chain::ChainState;
use crate::spec::pattern::{ChainStep, ParallelConfig, UnitType};
use crate::template::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParallelState {
    pub branches: BTreeMap<String, ChainState>,
    pub reduce_response: Option<String>,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &ParallelConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;

    let mut state: ParallelState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    for (branch_id, branch_state) in &state.branches {
        if let Some(last) = branch_state.responses.last() {
            namespace.set_branch(branch_id, last);
        }
    }

    if state.branches.is_empty() && state.reduce_response.is_none() {
        ctx.emit(
            "workflow_start",
            serde_json::json!({ "branch_count": config.branches.len() }),
        )
        .await;
    }

    let mut branch_ids: Vec<&String> = config.branches.keys().collect();
    branch_ids.sort();

    let max_parallel = ctx.spec.runtime.max_parallel();

    // A HITL gate in one branch (spec.md §4.6.2) must not stop the others:
    // each branch runs to completion or to its own HITL pause before the
    // pattern decides anything. Only once every branch has been attempted
    // this pass do we either proceed (all clear) or propagate a pause (at
    // least one branch is still blocked).
    let mut pending_pause: Option<WorkflowError> = None;

    for batch in branch_ids.chunks(max_parallel.max(1)) {
        for branch_id in batch {
            let branch_id: &String = branch_id;
            let steps = &config.branches[branch_id.as_str()];
            let mut branch_state = state.branches.remove(branch_id.as_str()).unwrap_or_default();

            if branch_state.completed_steps >= steps.len() {
                state.branches.insert(branch_id.clone(), branch_state);
                continue;
            }

            ctx.emit("branch_start", serde_json::json!({ "branch_id": branch_id }))
                .await;

            let mut branch_paused = false;
            for (idx, step) in steps.iter().enumerate() {
                if idx < branch_state.completed_steps {
                    continue;
                }

                let response = match run_branch_step(ctx, step, &mut namespace).await {
                    Ok(response) => response,
                    Err(err @ WorkflowError::HitlPauseRequested { .. }) => {
                        pending_pause.get_or_insert(err);
                        branch_paused = true;
                        break;
                    }
                    Err(err) => return Err(err),
                };
                namespace.set_branch(branch_id, &response);
                branch_state.responses.push(response);
                branch_state.completed_steps = idx + 1;

                state.branches.insert(branch_id.clone(), branch_state.clone());
                ctx.checkpoint(serde_json::to_value(&state).expect("ParallelState serializes"))
                    .await?;
            }

            state.branches.insert(branch_id.clone(), branch_state);
            if branch_paused {
                continue;
            }

            ctx.emit("branch_complete", serde_json::json!({ "branch_id": branch_id }))
                .await;
        }
    }

    if let Some(err) = pending_pause {
        return Err(err);
    }

    if let Some(reduce) = &config.reduce {
        if state.reduce_response.is_none() {
            let rendered =
                super::common::render_unit(ctx.renderer, &reduce.input_template, &namespace)?;
            let response = ctx.invoke_agent(&reduce.agent, &rendered).await?;
            namespace.set_last_response(&response);
            state.reduce_response = Some(response);
            ctx.checkpoint(serde_json::to_value(&state).expect("ParallelState serializes"))
                .await?;
        } else if let Some(response) = &state.reduce_response {
            namespace.set_last_response(response);
        }
    } else if let Some(last) = state
        .branches
        .values()
        .filter_map(|b| b.responses.last())
        .last()
    {
        namespace.set_last_response(last);
    }

    ctx.emit("workflow_complete", serde_json::json!({})).await;

    let last_response = state.reduce_response.clone().unwrap_or_else(|| {
        state
            .branches
            .values()
            .filter_map(|b| b.responses.last())
            .last()
            .cloned()
            .unwrap_or_default()
    });

    Ok(ExecutionOutcome {
        last_response,
        namespace,
    })
}

async fn run_branch_step(
    ctx: &mut ExecCtx<'_>,
    step: &ChainStep,
    namespace: &mut Namespace,
) -> Result<String, WorkflowError> {
    let rendered =
        super::common::render_unit_with_vars(ctx.renderer, &step.input_template, namespace, step.vars.as_ref())?;
    match step.unit_type {
        UnitType::Agent => {
            let agent_id = step
                .agent
                .as_deref()
                .ok_or_else(|| WorkflowError::RuntimeFailure(format!("step {} has no agent", step.id)))?;
            ctx.invoke_agent(agent_id, &rendered).await
        }
        UnitType::Hitl => {
            ctx.handle_hitl_gate(
                &step.id,
                &rendered,
                &namespace.to_value().to_string(),
                step.hitl.default_response.clone(),
                step.hitl.timeout_seconds,
            )
            .await
        }
    }
}
