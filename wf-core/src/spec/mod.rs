//! The immutable workflow specification (spec.md §3 "Spec").
//!
//! Loading YAML/JSON and JSON-Schema validation are out of scope here (they
//! are the host's job); this module defines the typed shape a validated spec
//! deserializes into and the pattern-specific config types §4.6 describes.

pub mod hash;
pub mod pattern;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use pattern::Pattern;

/// Sampling parameters forwarded to the provider. Left loose (no bounds
/// checking) since validating these is the host's JSON-Schema job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// `runtime`: provider tag, model id, optional region/host, sampling, and
/// the concurrency default used by fan-out patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeDescriptor {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub region_or_host: Option<String>,
    #[serde(default)]
    pub sampling: SamplingParams,
    /// Default semaphore capacity for parallel fan-out (spec.md §5);
    /// defaults to 4 when absent.
    #[serde(default)]
    pub max_parallel: Option<usize>,
}

impl RuntimeDescriptor {
    pub fn max_parallel(&self) -> usize {
        self.max_parallel.unwrap_or(4)
    }

    /// The fingerprint the Agent Runner's agent cache and model-client LRU
    /// key off of (spec.md §4.2, §9 "Agent & client caching").
    pub fn fingerprint(&self) -> String {
        format!(
            "{}|{}|{}|{:?}|{:?}|{:?}",
            self.provider,
            self.model,
            self.region_or_host.as_deref().unwrap_or(""),
            self.sampling.temperature,
            self.sampling.top_p,
            self.sampling.max_tokens,
        )
    }
}

/// `agents.<id>`: a named LLM persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDef {
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Option<Vec<String>>,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

/// `inputs`: required/optional input names plus supplied default values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputsSpec {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
}

/// One artifact: an output path template and a body template, both
/// rendered from the final execution context (spec.md glossary).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactDef {
    pub path_template: String,
    pub body_template: String,
}

/// `budgets`: token ceiling and warn threshold (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetsConfig {
    pub max_tokens: Option<u64>,
    #[serde(default = "default_warn_ratio")]
    pub warn_ratio: f64,
}

fn default_warn_ratio() -> f64 {
    0.8
}

/// `context_policy`: compaction trigger configuration (spec.md §4.4, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPolicyConfig {
    #[serde(default)]
    pub compaction_enabled: bool,
    #[serde(default = "default_summary_ratio")]
    pub summary_ratio: f64,
    #[serde(default = "default_preserve_recent")]
    pub preserve_recent_messages: usize,
}

fn default_summary_ratio() -> f64 {
    0.5
}

fn default_preserve_recent() -> usize {
    4
}

impl Default for ContextPolicyConfig {
    fn default() -> Self {
        Self {
            compaction_enabled: false,
            summary_ratio: default_summary_ratio(),
            preserve_recent_messages: default_preserve_recent(),
        }
    }
}

/// The top-level, immutable workflow specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spec {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub runtime: RuntimeDescriptor,
    pub agents: HashMap<String, AgentDef>,
    pub pattern: Pattern,
    #[serde(default)]
    pub inputs: Option<InputsSpec>,
    #[serde(default)]
    pub artifacts: Option<Vec<ArtifactDef>>,
    #[serde(default)]
    pub budgets: Option<BudgetsConfig>,
    #[serde(default)]
    pub context_policy: Option<ContextPolicyConfig>,
}

impl Spec {
    /// The closed pattern tag, used for session metadata and event payloads.
    pub fn pattern_tag(&self) -> &'static str {
        self.pattern.tag()
    }

    /// Missing required inputs given a caller-supplied input map, merged
    /// against `inputs.values` defaults. Returns an empty vec when nothing
    /// is missing (spec.md §4.7 "validate missing required inputs").
    pub fn missing_required_inputs(
        &self,
        supplied: &HashMap<String, serde_json::Value>,
    ) -> Vec<String> {
        let Some(inputs) = &self.inputs else {
            return Vec::new();
        };
        inputs
            .required
            .iter()
            .filter(|name| !supplied.contains_key(*name) && !inputs.values.contains_key(*name))
            .cloned()
            .collect()
    }

    /// Merges default values, then caller-supplied values (which win),
    /// into one variable map (spec.md §3 "Variables: merged inputs").
    pub fn merge_inputs(
        &self,
        supplied: HashMap<String, serde_json::Value>,
    ) -> HashMap<String, serde_json::Value> {
        let mut merged = self
            .inputs
            .as_ref()
            .map(|i| i.values.clone())
            .unwrap_or_default();
        merged.extend(supplied);
        merged
    }
}
