//! End-to-end HITL pause/resume scenario (spec.md §4.5, §8): a chain with
//! a HITL step in the middle pauses the session, then resumes with a
//! supplied response and runs to completion.

mod support;

use std::collections::HashMap;

use wf_core::dispatcher::Dispatcher;
use wf_core::error::exit_code;
use wf_core::pattern::HitlResponse;
use wf_core::session::{FileSessionStore, SessionStatus};
use wf_core::spec::pattern::{ChainConfig, ChainStep, HitlFields, Pattern, UnitType};

fn chain_with_approval_gate_spec() -> wf_core::spec::Spec {
    let mut agents = HashMap::new();
    agents.insert("writer".to_string(), support::agent("drafts announcements"));

    let pattern = Pattern::Chain(ChainConfig {
        steps: vec![
            ChainStep {
                id: "draft".into(),
                agent: Some("writer".into()),
                input_template: "draft an announcement about {{ topic }}".into(),
                vars: None,
                unit_type: UnitType::Agent,
                hitl: HitlFields::default(),
            },
            ChainStep {
                id: "approve".into(),
                agent: None,
                input_template: "approve this draft: {{ last_response }}".into(),
                vars: None,
                unit_type: UnitType::Hitl,
                hitl: HitlFields { default_response: None, timeout_seconds: None },
            },
            ChainStep {
                id: "publish".into(),
                agent: Some("writer".into()),
                input_template: "publish: {{ hitl_response }}".into(),
                vars: None,
                unit_type: UnitType::Agent,
                hitl: HitlFields::default(),
            },
        ],
    });
    support::base_spec("hitl-demo", agents, pattern)
}

#[tokio::test]
async fn chain_pauses_on_hitl_then_resumes_to_completion() {
    let spec = chain_with_approval_gate_spec();
    let runner = support::runner_with_scripted_responses(vec!["draft text", "published text"]);
    let dispatcher = Dispatcher::new(runner);

    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::new(dir.path());

    let mut inputs = support::empty_inputs();
    inputs.insert("topic".into(), serde_json::json!("the new release"));

    let paused = dispatcher
        .start(&spec, "name: hitl-demo\n", inputs, Some(&store))
        .await;

    assert!(!paused.success);
    assert_eq!(paused.exit_code, exit_code::EX_HITL_PAUSE);
    let session_id = paused.session_id.expect("paused run still has a session id");

    let session = store.load(session_id).await.unwrap().unwrap();
    assert_eq!(session.metadata.status, SessionStatus::Paused);
    let hitl = session.hitl_state.expect("paused session carries hitl state");
    assert_eq!(hitl.task_id, "approve");

    let resumed = dispatcher
        .resume(
            &spec,
            "name: hitl-demo\n",
            session_id,
            Some(HitlResponse { task_id: "approve".into(), value: "approved".into() }),
            &store,
        )
        .await;

    assert!(resumed.success, "{:?}", resumed.error);
    assert_eq!(resumed.last_response.as_deref(), Some("published text"));

    let final_session = store.load(session_id).await.unwrap().unwrap();
    assert_eq!(final_session.metadata.status, SessionStatus::Completed);
}
