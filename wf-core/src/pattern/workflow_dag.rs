//! DAG / workflow pattern (spec.md §4.6.3): tasks with explicit `deps`,
//! executed once every dependency has completed, contributing
//! `tasks.<id>.response`.

use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::spec::pattern::{DagTask, UnitType, WorkflowConfig};
use crate::template::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DagState {
    pub completed: BTreeMap<String, String>,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &WorkflowConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;
    validate_dag(config)?;

    let mut state: DagState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    for (task_id, response) in &state.completed {
        namespace.set_task(task_id, response);
    }

    if state.completed.is_empty() {
        ctx.emit(
            "workflow_start",
            serde_json::json!({ "task_count": config.tasks.len() }),
        )
        .await;
    }

    let max_parallel = ctx.spec.runtime.max_parallel();

    while state.completed.len() < config.tasks.len() {
        let mut ready: Vec<&DagTask> = config
            .tasks
            .iter()
            .filter(|t| {
                !state.completed.contains_key(&t.id)
                    && t.deps.iter().all(|d| state.completed.contains_key(d))
            })
            .collect();
        ready.sort_by(|a, b| a.id.cmp(&b.id));

        if ready.is_empty() {
            return Err(WorkflowError::GraphBuild(
                crate::error::GraphBuildError::Cycle,
            ));
        }

        for task in ready.into_iter().take(max_parallel.max(1)) {
            ctx.emit("task_start", serde_json::json!({ "task_id": task.id }))
                .await;

            let response = run_task(ctx, task, &mut namespace).await?;
            namespace.set_task(&task.id, &response);
            state.completed.insert(task.id.clone(), response);

            ctx.checkpoint(serde_json::to_value(&state).expect("DagState serializes"))
                .await?;
            ctx.emit("task_complete", serde_json::json!({ "task_id": task.id }))
                .await;
        }
    }

    ctx.emit("workflow_complete", serde_json::json!({})).await;

    let last_response = config
        .tasks
        .last()
        .and_then(|t| state.completed.get(&t.id))
        .cloned()
        .unwrap_or_default();

    Ok(ExecutionOutcome {
        last_response,
        namespace,
    })
}

fn validate_dag(config: &WorkflowConfig) -> Result<(), WorkflowError> {
    let mut seen = std::collections::HashSet::new();
    for task in &config.tasks {
        if !seen.insert(task.id.as_str()) {
            return Err(WorkflowError::GraphBuild(
                crate::error::GraphBuildError::DuplicateId(task.id.clone()),
            ));
        }
    }
    for task in &config.tasks {
        for dep in &task.deps {
            if !seen.contains(dep.as_str()) {
                return Err(WorkflowError::GraphBuild(
                    crate::error::GraphBuildError::UnknownId(dep.clone()),
                ));
            }
        }
    }
    Ok(())
}

async fn run_task(
    ctx: &mut ExecCtx<'_>,
    task: &DagTask,
    namespace: &mut Namespace,
) -> Result<String, WorkflowError> {
    let rendered = super::common::render_unit(ctx.renderer, &task.input_template, namespace)?;
    match task.unit_type {
        UnitType::Agent => {
            let agent_id = task
                .agent
                .as_deref()
                .ok_or_else(|| WorkflowError::RuntimeFailure(format!("task {} has no agent", task.id)))?;
            ctx.invoke_agent(agent_id, &rendered).await
        }
        UnitType::Hitl => {
            ctx.handle_hitl_gate(
                &task.id,
                &rendered,
                &namespace.to_value().to_string(),
                task.hitl.default_response.clone(),
                task.hitl.timeout_seconds,
            )
            .await
        }
    }
}
