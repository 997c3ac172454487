//! The seven closed pattern variants (spec.md §4.6), represented as a
//! tagged union rather than open inheritance, per spec.md §9 "Pattern
//! polymorphism" — grounded on the same `#[serde(tag = "type")]` shape the
//! pack's workflow-definition tagged enum uses for its own step variants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a unit invokes an agent or suspends for a human response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    Agent,
    Hitl,
}

/// HITL-specific fields a unit may carry when `unit_type == Hitl`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitlFields {
    #[serde(default)]
    pub default_response: Option<String>,
    /// Relative timeout in seconds from when the gate is first reached;
    /// converted to an absolute `timeout_at` instant when the HITL state
    /// is composed (spec.md §4.5 point 1).
    #[serde(default)]
    pub timeout_seconds: Option<i64>,
}

/// One step in a chain, branch, or route (spec.md §4.6.1/.2/.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStep {
    pub id: String,
    #[serde(default)]
    pub agent: Option<String>,
    pub input_template: String,
    #[serde(default)]
    pub vars: Option<serde_json::Value>,
    #[serde(default = "default_unit_type")]
    pub unit_type: UnitType,
    #[serde(flatten)]
    pub hitl: HitlFields,
}

fn default_unit_type() -> UnitType {
    UnitType::Agent
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub steps: Vec<ChainStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceStep {
    pub agent: String,
    pub input_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelConfig {
    /// Branch id -> ordered step list. `IndexMap` is unnecessary here: the
    /// spec guarantees consumers look branches up by name, never by
    /// position (spec.md §5 "Ordering").
    pub branches: HashMap<String, Vec<ChainStep>>,
    #[serde(default)]
    pub reduce: Option<ReduceStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagTask {
    pub id: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default = "default_unit_type")]
    pub unit_type: UnitType,
    #[serde(default)]
    pub description: Option<String>,
    pub input_template: String,
    #[serde(default)]
    pub deps: Vec<String>,
    #[serde(flatten)]
    pub hitl: HitlFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub tasks: Vec<DagTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    pub agent: String,
    pub input_template: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub router: RouterConfig,
    pub routes: HashMap<String, Vec<ChainStep>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub input_template: Option<String>,
    #[serde(default = "default_unit_type")]
    pub unit_type: UnitType,
    #[serde(flatten)]
    pub hitl: HitlFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChooseArm {
    /// A boolean template expression, or the literal `"else"` fallback.
    pub when: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub choose: Option<Vec<ChooseArm>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerConfig {
    pub agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub agent: String,
    pub input_template: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptConfig {
    pub min_score: i64,
    #[serde(default = "default_eo_max_iterations")]
    pub max_iterations: u32,
}

fn default_eo_max_iterations() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorOptimizerConfig {
    pub producer: ProducerConfig,
    pub evaluator: EvaluatorConfig,
    pub accept: AcceptConfig,
    #[serde(default)]
    pub revise_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    pub agent: String,
    pub max_workers: usize,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

fn default_max_rounds() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerTemplateConfig {
    pub agent: String,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorWorkersConfig {
    pub orchestrator: OrchestratorConfig,
    pub worker: WorkerTemplateConfig,
    pub reduce: ReduceStep,
}

/// The closed set of compositional shapes a workflow may take. A tagged
/// union, matched exhaustively by a dispatcher function per variant — not
/// an open trait hierarchy (spec.md §9 "Pattern polymorphism").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pattern {
    Chain(ChainConfig),
    Parallel(ParallelConfig),
    Workflow(WorkflowConfig),
    Routing(RoutingConfig),
    Graph(GraphConfig),
    EvaluatorOptimizer(EvaluatorOptimizerConfig),
    OrchestratorWorkers(OrchestratorWorkersConfig),
}

impl Pattern {
    pub fn tag(&self) -> &'static str {
        match self {
            Pattern::Chain(_) => "chain",
            Pattern::Parallel(_) => "parallel",
            Pattern::Workflow(_) => "workflow",
            Pattern::Routing(_) => "routing",
            Pattern::Graph(_) => "graph",
            Pattern::EvaluatorOptimizer(_) => "evaluator_optimizer",
            Pattern::OrchestratorWorkers(_) => "orchestrator_workers",
        }
    }
}
