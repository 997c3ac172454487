//! End-to-end routing scenario (spec.md §4.6.4, §8): a router agent
//! chooses a route by returning `{"route": "<name>"}`, and the chosen
//! route's steps run as a sub-chain.

mod support;

use std::collections::HashMap;

use wf_core::dispatcher::Dispatcher;
use wf_core::spec::pattern::{ChainStep, HitlFields, Pattern, RouterConfig, RoutingConfig, UnitType};

fn step(id: &str, agent: &str) -> ChainStep {
    ChainStep {
        id: id.into(),
        agent: Some(agent.into()),
        input_template: format!("handle {id}"),
        vars: None,
        unit_type: UnitType::Agent,
        hitl: HitlFields::default(),
    }
}

fn routing_spec() -> wf_core::spec::Spec {
    let mut agents = HashMap::new();
    agents.insert("router".to_string(), support::agent("routes requests"));
    agents.insert("summarizer".to_string(), support::agent("summarizes"));
    agents.insert("escalator".to_string(), support::agent("escalates"));

    let mut routes = HashMap::new();
    routes.insert("summarize".to_string(), vec![step("s1", "summarizer")]);
    routes.insert("escalate".to_string(), vec![step("e1", "escalator")]);

    let pattern = Pattern::Routing(RoutingConfig {
        router: RouterConfig {
            agent: "router".into(),
            input_template: "{{ topic }}".into(),
            max_retries: 3,
        },
        routes,
    });
    support::base_spec("routing-demo", agents, pattern)
}

#[tokio::test]
async fn routing_selects_route_and_runs_its_steps() {
    let spec = routing_spec();
    let runner = support::runner_with_scripted_responses(vec![r#"{"route": "summarize"}"#, "summarized!"]);
    let dispatcher = Dispatcher::new(runner);

    let result = dispatcher
        .start(&spec, "name: routing-demo\n", support::empty_inputs(), None)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.pattern_tag, "routing");
    assert_eq!(result.last_response.as_deref(), Some("summarized!"));
}

#[tokio::test]
async fn routing_retries_once_on_malformed_json_then_succeeds() {
    let spec = routing_spec();
    let runner = support::runner_with_scripted_responses(vec![
        "not json at all",
        r#"{"route": "escalate"}"#,
        "escalated!",
    ]);
    let dispatcher = Dispatcher::new(runner);

    let result = dispatcher
        .start(&spec, "name: routing-demo\n", support::empty_inputs(), None)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.last_response.as_deref(), Some("escalated!"));
}

#[tokio::test]
async fn routing_fails_on_undefined_route_name() {
    let spec = routing_spec();
    let runner = support::runner_with_scripted_responses(vec![r#"{"route": "nonexistent"}"#]);
    let dispatcher = Dispatcher::new(runner);

    let result = dispatcher
        .start(&spec, "name: routing-demo\n", support::empty_inputs(), None)
        .await;

    assert!(!result.success);
    assert_eq!(result.exit_code, wf_core::error::exit_code::EX_RUNTIME);
}
