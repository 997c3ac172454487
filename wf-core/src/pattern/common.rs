//! Shared executor plumbing (spec.md §4.6 preamble, §9 "Pattern
//! polymorphism"): session validation, the common checkpoint call, event
//! emission, and the HITL gate protocol every pattern executor uses.
//! Factored into free functions/methods the seven executors call, not a
//! base class.

use crate::agent_runner::AgentRunner;
use crate::budget::BudgetTracker;
use crate::error::WorkflowError;
use crate::events::{EventBus, WorkflowEvent};
use crate::hitl::{self};
use crate::session::{FileSessionStore, HitlState, SessionState};
use crate::spec::Spec;
use crate::template::{Namespace, Renderer};
use chrono::{Duration as ChronoDuration, Utc};

/// A HITL response supplied by the caller on re-entry, bound to exactly
/// one task id (spec.md §4.5 point 2).
#[derive(Debug, Clone)]
pub struct HitlResponse {
    pub task_id: String,
    pub value: String,
}

/// Everything a pattern executor needs, bundled so the seven executors
/// share one calling convention (spec.md §9 "Context namespaces": the
/// namespace itself is threaded by value by each executor, not stored
/// here).
pub struct ExecCtx<'a> {
    pub spec: &'a Spec,
    pub runner: &'a AgentRunner,
    pub renderer: &'a Renderer,
    pub events: &'a EventBus,
    pub budget: &'a mut BudgetTracker,
    pub session: Option<&'a mut SessionState>,
    pub store: Option<&'a FileSessionStore>,
    pub hitl_response: Option<HitlResponse>,
}

impl<'a> ExecCtx<'a> {
    /// Both state and store must be given, or both absent (spec.md §4.6).
    pub fn validate_session(&self) -> Result<(), WorkflowError> {
        if self.session.is_some() != self.store.is_some() {
            return Err(WorkflowError::SessionValidation(
                "session_state and session_repo must both be provided or both be None".into(),
            ));
        }
        Ok(())
    }

    fn session_id_string(&self) -> Option<String> {
        self.session
            .as_ref()
            .map(|s| s.metadata.session_id.to_string())
    }

    pub async fn emit(&self, event_type: &str, data: serde_json::Value) {
        let mut event = WorkflowEvent::new(event_type, &self.spec.name, self.spec.pattern_tag())
            .with_data(data);
        if let Some(id) = self.session_id_string() {
            event = event.with_session(id);
        }
        self.events.emit(event).await;
    }

    /// Writes `pattern_state` into the session and persists it under the
    /// directory lock — the "common checkpoint call after each completed
    /// unit" every executor makes (spec.md §4.6).
    pub async fn checkpoint(&mut self, pattern_state: serde_json::Value) -> Result<(), WorkflowError> {
        if let (Some(session), Some(store)) = (self.session.as_deref_mut(), self.store) {
            session.pattern_state = pattern_state;
            session.metadata.touch();
            store.save(session).await?;
        }
        Ok(())
    }

    /// Invokes the agent runner, accumulating tokens into the budget
    /// tracker and compacting when the warn ratio was just crossed
    /// (spec.md §4.2, §4.4).
    pub async fn invoke_agent(
        &mut self,
        agent_id: &str,
        rendered_prompt: &str,
    ) -> Result<String, WorkflowError> {
        let agent_def = self
            .spec
            .agents
            .get(agent_id)
            .ok_or_else(|| WorkflowError::RuntimeFailure(format!("unknown agent id: {agent_id}")))?;

        let warned_before = self.budget.is_warned();
        let (text, usage) = self
            .runner
            .invoke(
                agent_id,
                agent_def,
                &self.spec.runtime,
                rendered_prompt,
                self.spec.context_policy.as_ref(),
                warned_before,
            )
            .await?;

        if let Some(level) = self.budget.record(usage)? {
            let _ = level;
            self.emit(
                "budget_warning",
                serde_json::json!({ "cumulative": self.budget.cumulative() }),
            )
            .await;
        }
        Ok(text)
    }

    /// Handles a HITL gate: resolves an already-supplied response, checks
    /// timeout on resume, or pauses the session and unwinds via
    /// [`WorkflowError::HitlPauseRequested`] (spec.md §4.5).
    pub async fn handle_hitl_gate(
        &mut self,
        task_id: &str,
        prompt: &str,
        context_display: &str,
        default_response: Option<String>,
        timeout_seconds: Option<i64>,
    ) -> Result<String, WorkflowError> {
        if let Some(response) = self.hitl_response.take() {
            if response.task_id == task_id {
                if let Some(session) = self.session.as_deref_mut() {
                    session.resume();
                }
                return Ok(response.value);
            }
            // Not the gate we're waiting on; put it back for a later gate.
            self.hitl_response = Some(response);
        }

        if let Some(session) = self.session.as_deref() {
            if let Some(hitl) = &session.hitl_state {
                if hitl.active && hitl.task_id == task_id {
                    if let Some(substitute) = hitl::check_timeout(hitl, Utc::now()) {
                        tracing::warn!(
                            task_id,
                            "{}",
                            hitl::format_timeout_warning(
                                hitl.timeout_at.unwrap_or_else(Utc::now),
                                &substitute
                            )
                        );
                        if let Some(session) = self.session.as_deref_mut() {
                            session.resume();
                        }
                        return Ok(substitute);
                    }
                }
            }
        }

        let timeout_at = timeout_seconds.map(|secs| Utc::now() + ChronoDuration::seconds(secs));
        let hitl_state = HitlState {
            active: true,
            task_id: task_id.to_string(),
            prompt: prompt.to_string(),
            context_display: context_display.to_string(),
            default_response,
            timeout_at,
        };
        if let Some(session) = self.session.as_deref_mut() {
            session.pause(hitl_state);
        }
        self.emit("hitl_pause", serde_json::json!({ "task_id": task_id })).await;
        Err(WorkflowError::HitlPauseRequested {
            task_id: task_id.to_string(),
        })
    }
}

/// Renders a unit's input template against the accumulated namespace.
pub fn render_unit(
    renderer: &Renderer,
    template: &str,
    namespace: &Namespace,
) -> Result<String, WorkflowError> {
    Ok(renderer.render(template, namespace)?)
}

/// Renders a unit's input template with a step's optional `vars` object
/// overlaid on top of the accumulated namespace (spec.md §4.6.1 "an
/// ordered list of steps `{agent, input-template, optional vars,
/// type=agent|hitl}`"). The overlay is visible only to this render call —
/// it is applied to a clone, never written back — so one step's `vars`
/// never leaks into a later step's context.
pub fn render_unit_with_vars(
    renderer: &Renderer,
    template: &str,
    namespace: &Namespace,
    vars: Option<&serde_json::Value>,
) -> Result<String, WorkflowError> {
    let Some(serde_json::Value::Object(overrides)) = vars else {
        return render_unit(renderer, template, namespace);
    };
    let mut overlay = namespace.clone();
    for (key, value) in overrides {
        overlay.set(key.clone(), value.clone());
    }
    render_unit(renderer, template, &overlay)
}
