//! End-to-end chain scenario (spec.md §4.6.1, §8): three steps, no HITL,
//! later steps referencing an earlier step's response by index.

mod support;

use std::collections::HashMap;

use wf_core::dispatcher::Dispatcher;
use wf_core::spec::pattern::{ChainConfig, ChainStep, HitlFields, Pattern, UnitType};

fn three_step_chain_spec() -> wf_core::spec::Spec {
    let mut agents = HashMap::new();
    agents.insert("writer".to_string(), support::agent("writes drafts"));
    agents.insert("editor".to_string(), support::agent("tightens prose"));

    let pattern = Pattern::Chain(ChainConfig {
        steps: vec![
            ChainStep {
                id: "draft".into(),
                agent: Some("writer".into()),
                input_template: "write about {{ topic }}".into(),
                vars: None,
                unit_type: UnitType::Agent,
                hitl: HitlFields::default(),
            },
            ChainStep {
                id: "tighten".into(),
                agent: Some("editor".into()),
                input_template: "tighten: {{ steps[0].response }}".into(),
                vars: None,
                unit_type: UnitType::Agent,
                hitl: HitlFields::default(),
            },
            ChainStep {
                id: "finalize".into(),
                agent: Some("editor".into()),
                input_template: "finalize: {{ last_response }}".into(),
                vars: None,
                unit_type: UnitType::Agent,
                hitl: HitlFields::default(),
            },
        ],
    });
    support::base_spec("chain-demo", agents, pattern)
}

#[tokio::test]
async fn chain_runs_all_steps_in_order_to_completion() {
    let spec = three_step_chain_spec();
    let runner = support::runner_with_scripted_responses(vec!["draft text", "tight text", "final text"]);
    let dispatcher = Dispatcher::new(runner);

    let mut inputs = support::empty_inputs();
    inputs.insert("topic".into(), serde_json::json!("rust ownership"));

    let result = dispatcher.start(&spec, "name: chain-demo\n", inputs, None).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.pattern_tag, "chain");
    assert_eq!(result.last_response.as_deref(), Some("final text"));
}

#[tokio::test]
async fn chain_step_can_reference_workflow_name() {
    let mut agents = HashMap::new();
    agents.insert("writer".to_string(), support::agent("writes drafts"));

    let pattern = Pattern::Chain(ChainConfig {
        steps: vec![ChainStep {
            id: "draft".into(),
            agent: Some("writer".into()),
            input_template: "workflow {{ name }}: write about {{ topic }}".into(),
            vars: None,
            unit_type: UnitType::Agent,
            hitl: HitlFields::default(),
        }],
    });
    let spec = support::base_spec("chain-demo", agents, pattern);

    let runner = support::runner_with_scripted_responses(vec!["draft text"]);
    let dispatcher = Dispatcher::new(runner);

    let mut inputs = support::empty_inputs();
    inputs.insert("topic".into(), serde_json::json!("rust ownership"));

    let result = dispatcher.start(&spec, "name: chain-demo\n", inputs, None).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.last_response.as_deref(), Some("draft text"));
}
