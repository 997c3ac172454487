//! Routing pattern (spec.md §4.6.4): a router agent chooses one of several
//! named routes by returning `{"route": "<name>"}`; the chosen route's
//! steps then run as an ordinary chain.

use super::chain::ChainState;
use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::spec::pattern::{ChainStep, RoutingConfig, UnitType};
use crate::template::Namespace;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingState {
    pub chosen_route: Option<String>,
    pub chain: ChainState,
}

#[derive(Debug, Deserialize)]
struct RouterDecision {
    route: String,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &RoutingConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;

    let mut state: RoutingState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    if state.chosen_route.is_none() {
        ctx.emit("workflow_start", serde_json::json!({})).await;

        let route = choose_route(ctx, config, &namespace).await?;
        if !config.routes.contains_key(&route) {
            return Err(WorkflowError::RouteInvalid(route));
        }
        namespace.set_chosen_route(&route);
        state.chosen_route = Some(route.clone());
        ctx.checkpoint(serde_json::to_value(&state).expect("RoutingState serializes"))
            .await?;
        ctx.emit("route_chosen", serde_json::json!({ "route": route }))
            .await;
    } else if let Some(route) = &state.chosen_route {
        namespace.set_chosen_route(route);
    }

    let route = state.chosen_route.clone().expect("route chosen above");
    let steps = &config.routes[&route];

    for response in &state.chain.responses {
        namespace.push_step(response);
    }

    for (idx, step) in steps.iter().enumerate() {
        if idx < state.chain.completed_steps {
            continue;
        }

        ctx.emit("step_start", serde_json::json!({ "step_id": step.id, "index": idx }))
            .await;
        let response = run_step(ctx, step, &mut namespace).await?;
        namespace.push_step(&response);
        namespace.set_last_response(&response);
        state.chain.responses.push(response);
        state.chain.completed_steps = idx + 1;

        ctx.checkpoint(serde_json::to_value(&state).expect("RoutingState serializes"))
            .await?;
        ctx.emit(
            "step_complete",
            serde_json::json!({ "step_id": step.id, "index": idx }),
        )
        .await;
    }

    ctx.emit("workflow_complete", serde_json::json!({})).await;

    Ok(ExecutionOutcome {
        last_response: state.chain.responses.last().cloned().unwrap_or_default(),
        namespace,
    })
}

async fn choose_route(
    ctx: &mut ExecCtx<'_>,
    config: &RoutingConfig,
    namespace: &Namespace,
) -> Result<String, WorkflowError> {
    let rendered = super::common::render_unit(ctx.renderer, &config.router.input_template, namespace)?;

    let mut last_err = None;
    for attempt in 0..=config.router.max_retries {
        let response = ctx.invoke_agent(&config.router.agent, &rendered).await?;
        match parse_route(&response) {
            Ok(route) => return Ok(route),
            Err(e) => {
                tracing::warn!(attempt, "router_response_unparseable");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        WorkflowError::StructuredOutputParseError("router produced no response".into())
    }))
}

fn parse_route(response: &str) -> Result<String, WorkflowError> {
    let trimmed = response.trim();
    let decision: RouterDecision = serde_json::from_str(trimmed).map_err(|e| {
        WorkflowError::StructuredOutputParseError(format!("router response not valid JSON: {e}"))
    })?;
    Ok(decision.route)
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
