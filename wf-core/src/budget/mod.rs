//! Budget & Context Policy (spec.md §4.4, C4): tracks cumulative token
//! usage, triggers compaction at the warn ratio, aborts at the ceiling.

pub mod compaction;

use crate::error::WorkflowError;
use crate::llm::TokenUsage;
use crate::spec::BudgetsConfig;

pub use compaction::{CompactionConfig, ContextCompactor};

/// Tracks a workflow's monotonically growing token usage against an
/// optional ceiling. One instance per dispatcher run, shared by reference
/// across pattern executors (spec.md §5 "Token usage is mutated only by
/// the executor; all updates happen between await points").
#[derive(Debug, Clone, Default)]
pub struct BudgetTracker {
    cumulative: TokenUsage,
    max_tokens: Option<u64>,
    warn_ratio: f64,
    warned: bool,
}

impl BudgetTracker {
    pub fn new(config: Option<&BudgetsConfig>) -> Self {
        Self {
            cumulative: TokenUsage::default(),
            max_tokens: config.and_then(|c| c.max_tokens),
            warn_ratio: config.map(|c| c.warn_ratio).unwrap_or(0.8),
            warned: false,
        }
    }

    pub fn cumulative(&self) -> TokenUsage {
        self.cumulative
    }

    /// True once the warn ratio has been crossed at any point this run;
    /// used to gate compaction before the *next* invocation (spec.md §4.2
    /// "Before invocation, if... cumulative tokens cross the policy's
    /// threshold, the runner applies conversation compaction").
    pub fn is_warned(&self) -> bool {
        self.warned
    }

    /// Adds one invocation's token deltas (real input/output counts, not a
    /// simplified even split — see SPEC_FULL.md §C) and evaluates the warn
    /// and abort thresholds. Returns `Some(WarnLevel::Warn)` the first time
    /// the warn ratio is crossed, so the caller can emit a warning event
    /// and optionally trigger compaction; returns
    /// `Err(BudgetExceeded)` once the ceiling is reached or passed.
    pub fn record(&mut self, delta: TokenUsage) -> Result<Option<WarnLevel>, WorkflowError> {
        self.cumulative.input_tokens += delta.input_tokens;
        self.cumulative.output_tokens += delta.output_tokens;

        let Some(max) = self.max_tokens else {
            return Ok(None);
        };
        let total = self.cumulative.total();
        if total >= max {
            return Err(WorkflowError::BudgetExceeded {
                input: self.cumulative.input_tokens,
                output: self.cumulative.output_tokens,
                max,
            });
        }
        if !self.warned && (total as f64) >= (max as f64) * self.warn_ratio {
            self.warned = true;
            return Ok(Some(WarnLevel::Warn));
        }
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarnLevel {
    Warn,
}
