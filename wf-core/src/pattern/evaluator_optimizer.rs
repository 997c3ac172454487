//! Evaluator-optimizer pattern (spec.md §4.6.6): a producer drafts, an
//! evaluator scores and critiques, and the producer revises until the
//! score clears `accept.min_score` or `accept.max_iterations` is spent.

use super::common::ExecCtx;
use super::ExecutionOutcome;
use crate::error::WorkflowError;
use crate::template::Namespace;
use crate::spec::pattern::EvaluatorOptimizerConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_REVISE_TEMPLATE: &str =
    "Revise the previous answer using this feedback.\nPrevious answer: {{ last_response }}\nIssues: {{ evaluation.issues }}\nSuggested fixes: {{ evaluation.fixes }}";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluatorOptimizerState {
    pub iteration: u32,
    pub produced: Option<String>,
    pub score: Option<i64>,
    pub accepted: bool,
    pub iteration_history: Vec<IterationHistoryEntry>,
}

/// One completed iteration's record (spec.md §4.6.6 checkpoint shape), kept
/// so a resumed run can show the full revision trail, not just the latest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationHistoryEntry {
    pub iteration: u32,
    pub score: i64,
    pub issues: Vec<String>,
    pub fixes: Vec<String>,
    pub draft_preview: String,
}

const DRAFT_PREVIEW_LEN: usize = 200;

fn draft_preview(produced: &str) -> String {
    if produced.chars().count() <= DRAFT_PREVIEW_LEN {
        produced.to_string()
    } else {
        let truncated: String = produced.chars().take(DRAFT_PREVIEW_LEN).collect();
        format!("{truncated}...")
    }
}

#[derive(Debug, Deserialize)]
struct EvaluationResult {
    score: i64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    fixes: Vec<String>,
}

pub async fn run(
    ctx: &mut ExecCtx<'_>,
    config: &EvaluatorOptimizerConfig,
    mut namespace: Namespace,
) -> Result<ExecutionOutcome, WorkflowError> {
    ctx.validate_session()?;

    let mut state: EvaluatorOptimizerState = ctx
        .session
        .as_deref()
        .map(|s| serde_json::from_value(s.pattern_state.clone()).unwrap_or_default())
        .unwrap_or_default();

    if let Some(produced) = &state.produced {
        namespace.set_last_response(produced);
    }

    if state.iteration == 0 {
        ctx.emit(
            "workflow_start",
            serde_json::json!({ "max_iterations": config.accept.max_iterations }),
        )
        .await;
    }

    while !state.accepted && state.iteration < config.accept.max_iterations {
        ctx.emit(
            "iteration_start",
            serde_json::json!({ "iteration": state.iteration }),
        )
        .await;

        let producer_prompt = if state.iteration == 0 {
            namespace.to_value().to_string()
        } else {
            let template = revise_prompt_template(config);
            super::common::render_unit(ctx.renderer, template, &namespace)?
        };
        let produced = ctx.invoke_agent(&config.producer.agent, &producer_prompt).await?;
        namespace.set_last_response(&produced);
        state.produced = Some(produced);

        let eval_prompt =
            super::common::render_unit(ctx.renderer, &config.evaluator.input_template, &namespace)?;
        let evaluation = evaluate(ctx, config, &eval_prompt).await?;

        namespace.set_evaluation(evaluation.score, &evaluation.issues, &evaluation.fixes);
        state.score = Some(evaluation.score);
        state.iteration_history.push(IterationHistoryEntry {
            iteration: state.iteration,
            score: evaluation.score,
            issues: evaluation.issues.clone(),
            fixes: evaluation.fixes.clone(),
            draft_preview: draft_preview(&state.produced.clone().unwrap_or_default()),
        });
        state.iteration += 1;
        state.accepted = evaluation.score >= config.accept.min_score;

        ctx.checkpoint(serde_json::to_value(&state).expect("EvaluatorOptimizerState serializes"))
            .await?;
        ctx.emit(
            "iteration_complete",
            serde_json::json!({ "iteration": state.iteration, "score": evaluation.score, "accepted": state.accepted }),
        )
        .await;
    }

    ctx.emit("workflow_complete", serde_json::json!({ "accepted": state.accepted }))
        .await;

    Ok(ExecutionOutcome {
        last_response: state.produced.clone().unwrap_or_default(),
        namespace,
    })
}

/// The revise-prompt template for iterations after the first: the spec's
/// configured override when present, else the built-in default (spec.md
/// §4.6.6 "optional revise-prompt template").
fn revise_prompt_template(config: &EvaluatorOptimizerConfig) -> &str {
    config.revise_prompt.as_deref().unwrap_or(DEFAULT_REVISE_TEMPLATE)
}

async fn evaluate(
    ctx: &mut ExecCtx<'_>,
    config: &EvaluatorOptimizerConfig,
    eval_prompt: &str,
) -> Result<EvaluationResult, WorkflowError> {
    // One syntactic retry allowed per iteration (spec.md §4.6.6).
    let mut last_err = None;
    for attempt in 0..2 {
        let eval_response = ctx.invoke_agent(&config.evaluator.agent, eval_prompt).await?;
        match parse_evaluation(&eval_response) {
            Ok(evaluation) => return Ok(evaluation),
            Err(e) => {
                tracing::warn!(attempt, "evaluator_response_unparseable");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.expect("loop ran at least once"))
}

fn parse_evaluation(response: &str) -> Result<EvaluationResult, WorkflowError> {
    serde_json::from_str(response.trim()).map_err(|e| {
        WorkflowError::StructuredOutputParseError(format!("evaluator response not valid JSON: {e}"))
    })
}
