//! Graph-with-loops pattern (spec.md §4.6.5): nodes connected by
//! unconditional or conditional edges, walked starting from the first
//! declared node until a node has no matching outgoing edge, bounded by
//! `max_iterations` total node visits to guard against runaway loops.

use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::spec::pattern::{GraphConfig, GraphEdge, GraphNode, UnitType};
use crate::template::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphState {
    pub visits: u32,
    pub current_node: Option<String>,
    pub node_responses: BTreeMap<String, String>,
    pub done: bool,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &GraphConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;

    let mut state: GraphState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    for (node_id, response) in &state.node_responses {
        namespace.set_node(node_id, response);
    }

    let entry = config
        .nodes
        .first()
        .map(|n| n.id.clone())
        .ok_or_else(|| WorkflowError::RuntimeFailure("graph has no nodes".into()))?;

    if state.current_node.is_none() && !state.done {
        state.current_node = Some(entry);
        ctx.emit("workflow_start", serde_json::json!({})).await;
    }

    while !state.done {
        let Some(current_id) = state.current_node.clone() else {
            break;
        };

        if state.visits >= config.max_iterations {
            return Err(WorkflowError::IterationLimitExceeded(config.max_iterations));
        }

        let node = config
            .nodes
            .iter()
            .find(|n| n.id == current_id)
            .ok_or_else(|| WorkflowError::RuntimeFailure(format!("unknown node id: {current_id}")))?;

        ctx.emit("node_start", serde_json::json!({ "node_id": current_id }))
            .await;

        let response = run_node(ctx, node, &mut namespace).await?;
        namespace.set_node(&current_id, &response);
        state.node_responses.insert(current_id.clone(), response);
        state.visits += 1;

        let next = next_node(ctx, config, &current_id, &namespace).await?;
        state.current_node = next.clone();
        if next.is_none() {
            state.done = true;
        }

        ctx.checkpoint(serde_json::to_value(&state).expect("GraphState serializes"))
            .await?;
        ctx.emit(
            "node_complete",
            serde_json::json!({ "node_id": current_id, "next": next }),
        )
        .await;
    }

    ctx.emit("workflow_complete", serde_json::json!({})).await;

    let last_response = state
        .node_responses
        .values()
        .last()
        .cloned()
        .unwrap_or_default();

    Ok(ExecutionOutcome {
        last_response,
        namespace,
    })
}

async fn next_node(
    ctx: &ExecCtx<'_>,
    config: &GraphConfig,
    from: &str,
    namespace: &Namespace,
) -> Result<Option<String>, WorkflowError> {
    let edges: Vec<&GraphEdge> = config.edges.iter().filter(|e| e.from == from).collect();

    if edges.is_empty() {
        // No outgoing edges at all: `from` is a terminal node (spec.md
        // §4.6.5 "any node with no outgoing edges is terminal").
        return Ok(None);
    }

    for edge in edges {
        if let Some(to) = &edge.to {
            return Ok(Some(to.clone()));
        }
        if let Some(arms) = &edge.choose {
            for arm in arms {
                if arm.when == "else" {
                    return Ok(Some(arm.to.clone()));
                }
                if ctx.renderer.render_bool(&arm.when, namespace)? {
                    return Ok(Some(arm.to.clone()));
                }
            }
        }
    }
    // Edges were declared for `from` but none matched and no `else`
    // fallback was present (spec.md §8 boundary: "fails with a clear
    // 'no edge matched' error").
    Err(WorkflowError::GraphBuild(
        crate::error::GraphBuildError::NoEdgeMatched(from.to_string()),
    ))
}

async fn run_node(
    ctx: &mut ExecCtx<'_>,
    node: &GraphNode,
    namespace: &mut Namespace,
) -> Result<String, WorkflowError> {
    let template = node.input_template.as_deref().unwrap_or("{{ last_response }}");
    let rendered = super::common::render_unit(ctx.renderer, template, namespace)?;

    match node.unit_type {
        UnitType::Agent => {
            let agent_id = node
                .agent
                .as_deref()
                .ok_or_else(|| WorkflowError::RuntimeFailure(format!("node {} has no agent", node.id)))?;
            ctx.invoke_agent(agent_id, &rendered).await
        }
        UnitType::Hitl => {
            let response = ctx
                .handle_hitl_gate(
                    &node.id,
                    &rendered,
                    &namespace.to_value().to_string(),
                    node.hitl.default_response.clone(),
                    node.hitl.timeout_seconds,
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
    fn graph_state_defaults_not_done() {
        let state = GraphState::default();
        assert!(!state.done);
        assert!(state.current_node.is_none());
    }

    #[test]
    fn graph_state_round_trips() {
        let mut state = GraphState::default();
        state.visits = 3;
        state.current_node = Some("b".into());
        state.node_responses.insert("a".into(), "resp".into());
        let value = serde_json::to_value(&state).unwrap();
        let back: GraphState = serde_json::from_value(value).unwrap();
        assert_eq!(back.visits, 3);
        assert_eq!(back.node_responses["a"], "resp");
    }
}
