//! Dispatcher (spec.md §4.7, C7): validates inputs, creates or loads a
//! session, dispatches to the matching pattern executor, renders
//! artifacts, and builds the run result. The one place that knows about
//! all seven patterns and all eight other components at once.

use crate::agent_runner::AgentRunner;
use crate::budget::BudgetTracker;
use crate::error::{exit_code, WorkflowError};
use crate::events::EventBus;
use crate::pattern::{self, ExecCtx, ExecutionOutcome, HitlResponse};
use crate::session::{FileSessionStore, SessionState};
use crate::spec::hash::compute_spec_hash;
use crate::spec::pattern::Pattern;
use crate::spec::Spec;
use crate::template::{Namespace, Renderer};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Everything the seven pattern executors share, owned for the lifetime of
/// a process (spec.md §9 "Agent & client caching": caches outlive a single
/// run so repeated runs against the same runtime reuse clients).
pub struct Dispatcher {
    pub runner: AgentRunner,
    pub renderer: Renderer,
    pub events: EventBus,
}

impl Dispatcher {
    pub fn new(runner: AgentRunner) -> Self {
        Self {
            runner,
            renderer: Renderer::default(),
            events: EventBus::new(),
        }
    }

    /// Starts a brand new run. Writes a fresh session if `store` is given.
    pub async fn start(
        &self,
        spec: &Spec,
        spec_text: &str,
        inputs: HashMap<String, serde_json::Value>,
        store: Option<&FileSessionStore>,
    ) -> RunResult {
        let started_at = Utc::now();

        let missing = spec.missing_required_inputs(&inputs);
        if !missing.is_empty() {
            return RunResult::failure(
                spec,
                None,
                WorkflowError::RuntimeFailure(format!("missing required inputs: {}", missing.join(", "))),
                crate::llm::TokenUsage::default(),
                started_at,
            );
        }

        let variables = spec.merge_inputs(inputs);
        let spec_hash = compute_spec_hash(spec_text);

        let mut session = if let Some(store) = store {
            match store
                .create(
                    spec.name.clone(),
                    spec_text.to_string(),
                    spec_hash,
                    spec.pattern_tag().to_string(),
                    variables.clone(),
                )
                .await
            {
                Ok(s) => Some(s),
                Err(e) => {
                    return RunResult::failure(spec, None, WorkflowError::Checkpoint(e), crate::llm::TokenUsage::default(), started_at)
                }
            }
        } else {
            None
        };

        let mut namespace = Namespace::with_inputs(&variables);
        namespace.set_name(&spec.name);
        self.execute(spec, namespace, session.as_mut(), store, None, started_at)
            .await
    }

    /// Resumes a paused session, optionally supplying a HITL response for
    /// the gate it paused at (spec.md §4.5 point 2, §6.4 "Resume protocol").
    pub async fn resume(
        &self,
        spec: &Spec,
        spec_text: &str,
        session_id: Uuid,
        hitl_response: Option<HitlResponse>,
        store: &FileSessionStore,
    ) -> RunResult {
        let started_at = Utc::now();

        let loaded = match store.load(session_id).await {
            Ok(Some(s)) => s,
            Ok(None) => {
                return RunResult::failure(
                    spec,
                    Some(session_id),
                    WorkflowError::SessionValidation(format!("no such session: {session_id}")),
                    crate::llm::TokenUsage::default(),
                    started_at,
                )
            }
            Err(e) => {
                return RunResult::failure(spec, Some(session_id), WorkflowError::Checkpoint(e), crate::llm::TokenUsage::default(), started_at)
            }
        };

        let mut session = loaded;
        if session.metadata.status == crate::session::SessionStatus::Completed {
            return RunResult::failure(
                spec,
                Some(session_id),
                WorkflowError::SessionValidation("session already completed".into()),
                crate::llm::TokenUsage::default(),
                started_at,
            );
        }

        let expected_hash = compute_spec_hash(spec_text);
        if session.metadata.spec_hash != expected_hash {
            tracing::warn!(
                session_id = %session_id,
                "resuming session whose spec hash no longer matches the supplied spec (spec_hash_policy: warn)"
            );
        }

        let mut namespace = Namespace::with_inputs(&session.variables);
        namespace.set_name(&spec.name);
        self.execute(
            spec,
            namespace,
            Some(&mut session),
            Some(store),
            hitl_response,
            started_at,
        )
        .await
    }

    async fn execute(
        &self,
        spec: &Spec,
        namespace: Namespace,
        session: Option<&mut SessionState>,
        store: Option<&FileSessionStore>,
        hitl_response: Option<HitlResponse>,
        started_at: DateTime<Utc>,
    ) -> RunResult {
        let mut budget = BudgetTracker::new(spec.budgets.as_ref());
        let session_id = session.as_deref().map(|s| s.metadata.session_id);

        let mut ctx = ExecCtx {
            spec,
            runner: &self.runner,
            renderer: &self.renderer,
            events: &self.events,
            budget: &mut budget,
            session,
            store,
            hitl_response,
        };

        let outcome = dispatch(&mut ctx, &spec.pattern, namespace).await;

        match outcome {
            Ok(result) => {
                let tokens = budget.cumulative();
                if let Some(session) = ctx.session.as_deref_mut() {
                    session.complete();
                    session.token_usage = tokens.clone();
                    if let Some(store) = ctx.store {
                        if let Err(e) = store.save(session).await {
                            return RunResult::failure(spec, session_id, WorkflowError::Checkpoint(e), tokens, started_at);
                        }
                    }
                }
                let artifacts_written = match render_artifacts(&self.renderer, spec, &result.namespace) {
                    Ok(paths) => paths,
                    Err(e) => return RunResult::failure(spec, session_id, e, tokens, started_at),
                };
                RunResult::success(spec, session_id, result, artifacts_written, tokens, started_at)
            }
            Err(err) => {
                let tokens = budget.cumulative();
                if err.is_hitl_pause() {
                    if let Some(session) = ctx.session.as_deref_mut() {
                        session.token_usage = tokens.clone();
                        if let Some(store) = ctx.store {
                            let _ = store.save(session).await;
                        }
                    }
                    return RunResult::paused(spec, session_id, err, tokens, started_at);
                }
                if let Some(session) = ctx.session.as_deref_mut() {
                    session.fail();
                    session.token_usage = tokens.clone();
                    if let Some(store) = ctx.store {
                        let _ = store.save(session).await;
                    }
                }
                RunResult::failure(spec, session_id, err, tokens, started_at)
            }
        }
    }
}

async fn dispatch(
    ctx: &mut ExecCtx<'_>,
    pattern_config: &Pattern,
    namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    match pattern_config {
        Pattern::Chain(config) => pattern::chain::run(ctx, config, namespace).await,
        Pattern::Parallel(config) => pattern::parallel::run(ctx, config, namespace).await,
        Pattern::Workflow(config) => pattern::workflow_dag::run(ctx, config, namespace).await,
        Pattern::Routing(config) => pattern::routing::run(ctx, config, namespace).await,
        Pattern::Graph(config) => pattern::graph::run(ctx, config, namespace).await,
        Pattern::EvaluatorOptimizer(config) => {
            pattern::evaluator_optimizer::run(ctx, config, namespace).await
        }
        Pattern::OrchestratorWorkers(config) => {
            pattern::orchestrator_workers::run(ctx, config, namespace).await
        }
    }
}

fn render_artifacts(
    renderer: &Renderer,
    spec: &Spec,
    namespace: &Namespace,
) -> Result<Vec<String>, WorkflowError> {
    let Some(artifacts) = &spec.artifacts else {
        return Ok(Vec::new());
    };
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = renderer.render(&artifact.path_template, namespace)?;
        let body = renderer.render(&artifact.body_template, namespace)?;
        if let Some(parent) = std::path::Path::new(&path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, body)?;
        written.push(path);
    }
    Ok(written)
}

/// What a single dispatch call returns, regardless of outcome (spec.md
/// §4.7, §6.3).
#[derive(Debug, Clone)]
pub struct RunResult {
    pub success: bool,
    pub exit_code: i32,
    pub pattern_tag: String,
    pub session_id: Option<Uuid>,
    pub last_response: Option<String>,
    pub error: Option<String>,
    pub tokens: crate::llm::TokenUsage,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub artifacts_written: Vec<String>,
}

impl RunResult {
    fn success(
        spec: &Spec,
        session_id: Option<Uuid>,
        outcome: ExecutionOutcome,
        artifacts_written: Vec<String>,
        tokens: crate::llm::TokenUsage,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            success: true,
            exit_code: exit_code::EX_OK,
            pattern_tag: spec.pattern_tag().to_string(),
            session_id,
            last_response: Some(outcome.last_response),
            error: None,
            tokens,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            artifacts_written,
        }
    }

    fn paused(
        spec: &Spec,
        session_id: Option<Uuid>,
        err: WorkflowError,
        tokens: crate::llm::TokenUsage,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            success: false,
            exit_code: err.exit_code(),
            pattern_tag: spec.pattern_tag().to_string(),
            session_id,
            last_response: None,
            error: Some(err.to_string()),
            tokens,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            artifacts_written: Vec::new(),
        }
    }

    fn failure(
        spec: &Spec,
        session_id: Option<Uuid>,
        err: WorkflowError,
        tokens: crate::llm::TokenUsage,
        started_at: DateTime<Utc>,
    ) -> Self {
        let completed_at = Utc::now();
        Self {
            success: false,
            exit_code: err.exit_code(),
            pattern_tag: spec.pattern_tag().to_string(),
            session_id,
            last_response: None,
            error: Some(err.to_string()),
            tokens,
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            artifacts_written: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::pattern::{ChainConfig, ChainStep, UnitType};
    use crate::spec::pattern::HitlFields;
    use crate::spec::{AgentDef, InputsSpec, RuntimeDescriptor, SamplingParams};

    fn sample_spec() -> Spec {
        let mut agents = HashMap::new();
        agents.insert(
            "writer".to_string(),
            AgentDef {
                system_prompt: "be helpful".into(),
                tools: None,
                input_schema: None,
                output_schema: None,
            },
        );
        Spec {
            version: "1".into(),
            name: "demo".into(),
            metadata: None,
            runtime: RuntimeDescriptor {
                provider: "mock".into(),
                model: "mock-model".into(),
                region_or_host: None,
                sampling: SamplingParams::default(),
                max_parallel: None,
            },
            agents,
            pattern: Pattern::Chain(ChainConfig {
                steps: vec![ChainStep {
                    id: "s1".into(),
                    agent: Some("writer".into()),
                    input_template: "{{ topic }}".into(),
                    vars: None,
                    unit_type: UnitType::Agent,
                    hitl: HitlFields::default(),
                }],
            }),
            inputs: Some(InputsSpec {
                required: vec!["topic".into()],
                optional: vec![],
                values: HashMap::new(),
            }),
            artifacts: None,
            budgets: None,
            context_policy: None,
        }
    }

    #[test]
    fn run_result_failure_carries_error_message_and_exit_code() {
        let spec = sample_spec();
        let result = RunResult::failure(
            &spec,
            None,
            WorkflowError::RuntimeFailure("boom".into()),
            crate::llm::TokenUsage::default(),
            Utc::now(),
        );
        assert!(!result.success);
        assert_eq!(result.exit_code, exit_code::EX_RUNTIME);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[test]
    fn run_result_paused_uses_hitl_exit_code() {
        let spec = sample_spec();
        let result = RunResult::paused(
            &spec,
            None,
            WorkflowError::HitlPauseRequested { task_id: "s1".into() },
            crate::llm::TokenUsage::default(),
            Utc::now(),
        );
        assert_eq!(result.exit_code, exit_code::EX_HITL_PAUSE);
        assert!(!result.success);
    }
}
