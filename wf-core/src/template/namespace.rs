//! The per-pattern context namespace templates render against (spec.md
//! §4.1, §9 "Context namespaces").
//!
//! An immutable-by-convention record built up one field at a time as units
//! complete; each pattern executor clones the namespace from the previous
//! unit and adds exactly one new field before rendering the next unit's
//! template. This is what makes resume a matter of replaying unit outputs:
//! the namespace at unit N is fully reconstructible from the persisted
//! pattern state.

use serde_json::{Map, Value};

/// The context templates render against. Wraps a flat JSON object; pattern
/// executors use the typed setters below rather than touching the map
/// directly, so every namespace key spec.md §4.1 documents
/// (`steps`, `branches`, `tasks`, `nodes`, `router`, `evaluation`, `workers`,
/// `last_response`, `hitl_response`, `name`) has exactly one writer.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    fields: Map<String, Value>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the namespace with the workflow's merged input variables,
    /// each exposed at the top level (e.g. `{{ topic }}`).
    pub fn with_inputs(inputs: &std::collections::HashMap<String, Value>) -> Self {
        let mut ns = Self::new();
        for (k, v) in inputs {
            ns.fields.insert(k.clone(), v.clone());
        }
        ns
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn set_name(&mut self, name: &str) {
        self.set("name", Value::String(name.to_string()));
    }

    fn array_mut(&mut self, key: &str) -> &mut Vec<Value> {
        let entry = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        entry.as_array_mut().expect("namespace array field corrupted")
    }

    fn object_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let entry = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        entry.as_object_mut().expect("namespace object field corrupted")
    }

    /// `{{ steps[n].response }}` — chain pattern (spec.md §4.6.1).
    pub fn push_step(&mut self, response: &str) {
        self.array_mut("steps")
            .push(serde_json::json!({ "response": response }));
    }

    /// `{{ branches.<id>.response }}` — parallel pattern (spec.md §4.6.2).
    pub fn set_branch(&mut self, branch_id: &str, response: &str) {
        self.object_mut("branches")
            .insert(branch_id.to_string(), serde_json::json!({ "response": response }));
    }

    /// `{{ tasks.<id>.response }}` — DAG pattern (spec.md §4.6.3).
    pub fn set_task(&mut self, task_id: &str, response: &str) {
        self.object_mut("tasks")
            .insert(task_id.to_string(), serde_json::json!({ "response": response }));
    }

    /// `{{ nodes.<id>.response }}` — graph pattern, latest response wins on
    /// revisits (spec.md §4.6.5).
    pub fn set_node(&mut self, node_id: &str, response: &str) {
        self.object_mut("nodes")
            .insert(node_id.to_string(), serde_json::json!({ "response": response }));
    }

    /// `{{ router.chosen_route }}` — routing pattern (spec.md §4.6.4).
    pub fn set_chosen_route(&mut self, route: &str) {
        self.set(
            "router",
            serde_json::json!({ "chosen_route": route }),
        );
    }

    /// `{{ evaluation.score / .issues / .fixes }}` — evaluator-optimizer
    /// pattern (spec.md §4.6.6).
    pub fn set_evaluation(&mut self, score: i64, issues: &[String], fixes: &[String]) {
        self.set(
            "evaluation",
            serde_json::json!({ "score": score, "issues": issues, "fixes": fixes }),
        );
    }

    /// `{{ workers[n].response }}` — orchestrator-workers pattern (spec.md
    /// §4.6.7).
    pub fn push_worker(&mut self, response: &str) {
        self.array_mut("workers")
            .push(serde_json::json!({ "response": response }));
    }

    /// `{{ last_response }}` — the most recent agent response regardless of
    /// pattern, used by artifact templates and reduce steps.
    pub fn set_last_response(&mut self, response: &str) {
        self.set("last_response", Value::String(response.to_string()));
    }

    /// `{{ hitl_response }}` — bound only for the unit that consumed it
    /// (spec.md §4.5 point 2).
    pub fn set_hitl_response(&mut self, response: &str) {
        self.set("hitl_response", Value::String(response.to_string()));
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}
