//! Chain pattern (spec.md §4.6.1): an ordered list of steps, template
//! context accumulating `steps[i].response` as each completes.

use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::spec::pattern::{ChainConfig, ChainStep, UnitType};
use crate::template::Namespace;
use serde::{Deserialize, Serialize};

/// The chain's checkpoint: a completed-steps counter plus the responses
/// collected so far (spec.md §4.6.1 "completed-steps counter is the
/// checkpoint; resume skips all indices below the counter").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainState {
    pub completed_steps: usize,
    pub responses: Vec<String>,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &ChainConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;

    let mut state: ChainState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    for response in &state.responses {
        namespace.push_step(response);
    }
    if let Some(last) = state.responses.last() {
        namespace.set_last_response(last);
    }

    if state.completed_steps == 0 {
        ctx.emit("workflow_start", serde_json::json!({ "step_count": config.steps.len() }))
            .await;
    }

    for (idx, step) in config.steps.iter().enumerate() {
        if idx < state.completed_steps {
            continue;
        }

        ctx.emit("step_start", serde_json::json!({ "step_id": step.id, "index": idx }))
            .await;

        let response = run_step(ctx, step, &mut namespace).await.map_err(|e| {
            if !e.is_hitl_pause() {
                // Fall through without persisting this attempt's partial
                // state; checkpoint already reflects the last completed step.
            }
            e
        })?;

        namespace.push_step(&response);
        namespace.set_last_response(&response);
        state.responses.push(response);
        state.completed_steps = idx + 1;

        ctx.checkpoint(serde_json::to_value(&state).expect("ChainState serializes"))
            .await?;
        ctx.emit(
            "step_complete",
            serde_json::json!({ "step_id": step.id, "index": idx }),
        )
        .await;
    }

    ctx.emit("workflow_complete", serde_json::json!({})).await;

    Ok(ExecutionOutcome {
        last_response: state.responses.last().cloned().unwrap_or_default(),
        namespace,
    })
}

async fn run_step(
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
            let response = ctx
                .handle_hitl_gate(
                    &step.id,
                    &rendered,
                    &namespace.to_value().to_string(),
                    step.hitl.default_response.clone(),
                    step.hitl.timeout_seconds,
                )
                .await?;
            namespace.set_hitl_response(&response);
            Ok(response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_state_defaults_to_zero_completed() {
        let state = ChainState::default();
        assert_eq!(state.completed_steps, 0);
        assert!(state.responses.is_empty());
    }

    #[test]
    fn chain_state_round_trips_through_json() {
        let state = ChainState {
            completed_steps: 2,
            responses: vec!["r1".into(), "r2".into()],
        };
        let value = serde_json::to_value(&state).unwrap();
        let back: ChainState = serde_json::from_value(value).unwrap();
        assert_eq!(back.completed_steps, 2);
        assert_eq!(back.responses, vec!["r1", "r2"]);
    }
}
