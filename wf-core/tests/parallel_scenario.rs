//! End-to-end parallel-branches scenario (spec.md §4.6.2, §8): three
//! independent branches feeding a single reduce step.

mod support;

use std::collections::HashMap;

use wf_core::dispatcher::Dispatcher;
use wf_core::spec::pattern::{ChainStep, HitlFields, ParallelConfig, Pattern, ReduceStep, UnitType};

fn branch(id: &str, agent: &str) -> Vec<ChainStep> {
    vec![ChainStep {
        id: id.into(),
        agent: Some(agent.into()),
        input_template: format!("research {{{{ topic }}}} angle {id}"),
        vars: None,
        unit_type: UnitType::Agent,
        hitl: HitlFields::default(),
    }]
}

fn three_branch_spec() -> wf_core::spec::Spec {
    let mut agents = HashMap::new();
    agents.insert("researcher".to_string(), support::agent("researches angles"));
    agents.insert("combiner".to_string(), support::agent("combines findings"));

    let mut branches = HashMap::new();
    branches.insert("a".to_string(), branch("a", "researcher"));
    branches.insert("b".to_string(), branch("b", "researcher"));
    branches.insert("c".to_string(), branch("c", "researcher"));

    let pattern = Pattern::Parallel(ParallelConfig {
        branches,
        reduce: Some(ReduceStep {
            agent: "combiner".into(),
            input_template: "combine: {{ branches.a.response }}, {{ branches.b.response }}, {{ branches.c.response }}".into(),
        }),
    });
    support::base_spec("parallel-demo", agents, pattern)
}

#[tokio::test]
async fn parallel_runs_all_branches_then_reduces() {
    let spec = three_branch_spec();
    // Branches run in sorted id order (a, b, c), then the reduce step.
    let runner = support::runner_with_scripted_responses(vec!["alpha", "beta", "gamma", "combined"]);
    let dispatcher = Dispatcher::new(runner);

    let mut inputs = support::empty_inputs();
    inputs.insert("topic".into(), serde_json::json!("distributed systems"));

    let result = dispatcher.start(&spec, "name: parallel-demo\n", inputs, None).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.pattern_tag, "parallel");
    assert_eq!(result.last_response.as_deref(), Some("combined"));
}
