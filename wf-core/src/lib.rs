//! # wf-core
//!
//! Execution engine for declarative multi-agent LLM workflows. A workflow is
//! a spec file (YAML or JSON) naming agents, a runtime, and exactly one of
//! seven patterns; this crate loads it, runs it unit by unit, checkpoints
//! progress to disk after every unit, and can resume a paused or interrupted
//! run from where it left off.
//!
//! ## Main modules
//!
//! - [`spec`]: [`spec::Spec`], [`spec::pattern::Pattern`] — the spec data
//!   model and the closed seven-variant pattern union.
//! - [`session`]: [`session::SessionState`], [`session::FileSessionStore`] —
//!   on-disk session layout, atomic writes, advisory locking
//!   ([`session::lock`]).
//! - [`template`]: [`template::Renderer`], [`template::Namespace`] —
//!   sandboxed template rendering and the per-pattern namespace keys units
//!   read and write.
//! - [`agent_runner`]: [`agent_runner::AgentRunner`], [`agent_runner::ClientFactory`]
//!   — agent invocation, per-fingerprint client caching, token accounting
//!   ([`agent_runner::token_counter`]).
//! - [`llm`]: [`llm::LlmClient`] trait, [`llm::Message`], [`llm::CompletionRequest`]
//!   — the seam concrete providers implement; this crate never depends on one.
//! - [`budget`]: [`budget::BudgetTracker`] — cumulative token tracking, warn
//!   ratio, and context compaction ([`budget::compaction`]).
//! - [`hitl`]: [`hitl::HitlHandler`] trait — the human-in-the-loop gate
//!   contract and timeout semantics.
//! - [`events`]: [`events::EventBus`] — synchronous subscriber fan-out for
//!   workflow lifecycle events.
//! - [`pattern`]: [`pattern::chain`], [`pattern::parallel`], [`pattern::workflow_dag`],
//!   [`pattern::routing`], [`pattern::graph`], [`pattern::evaluator_optimizer`],
//!   [`pattern::orchestrator_workers`] — one executor per pattern, sharing
//!   [`pattern::common::ExecCtx`].
//! - [`dispatcher`]: [`dispatcher::Dispatcher`], [`dispatcher::RunResult`] —
//!   ties every other component together: validates inputs, creates or loads
//!   a session, dispatches to the matching pattern executor, renders
//!   artifacts, builds the run result.
//! - [`error`]: [`error::WorkflowError`], [`error::exit_code`] — the error
//!   enum pattern executors unwind through and its mapping to process exit
//!   codes.

pub mod agent_runner;
pub mod budget;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod hitl;
pub mod llm;
pub mod pattern;
pub mod session;
pub mod spec;
pub mod template;

pub use dispatcher::{Dispatcher, RunResult};
pub use error::{Result, WorkflowError};
pub use spec::Spec;
