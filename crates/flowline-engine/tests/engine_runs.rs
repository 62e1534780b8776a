//! End-to-end traversal tests over mock collaborators.

mod common;

use common::{
    TestEngine, WorkflowBuilder, block, condition, group, step_blocks, step_output, trigger,
};
use flowline_engine::{
    EngineConfig, EngineError, LOOP_END, LOOP_NEXT, MockHttpClient, SecretCipher, StartRequest,
};
use flowline_store::{ExecutionStorage, SecretStorage};
use flowline_types::{
    ConditionGroup, Credential, Operator, RunStatus, Session, StepStatus, Variable,
    WorkflowStatus,
};
use serde_json::json;

#[tokio::test]
async fn test_linear_chain_visits_each_block_once() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("linear")
            .block(trigger("start", json!({})))
            .block(block("first", "log", json!({"message": "one"})))
            .block(block("second", "log", json!({"message": "two"})))
            .edge("start", "first")
            .edge("first", "second")
            .build(),
    );

    let snapshot = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Success);
    assert_eq!(step_blocks(&snapshot), vec!["start", "first", "second"]);
    assert!(snapshot.steps.iter().all(|s| s.status == StepStatus::Success));
    assert_eq!(snapshot.run.output["second"]["output"]["message"], "two");
}

fn if_workflow() -> flowline_types::Workflow {
    let mut check = block("check", "if", json!({}));
    check.condition_groups = vec![group(
        0,
        vec![condition("{{$params.x}}", Operator::Equals, json!(5))],
    )];
    WorkflowBuilder::new("branch")
        .block(trigger("start", json!({})))
        .block(check)
        .block(block("yes", "log", json!({"message": "yes"})))
        .block(block("no", "log", json!({"message": "no"})))
        .edge("start", "check")
        .labeled("check", "yes", "true")
        .labeled("check", "no", "false")
        .build()
}

#[tokio::test]
async fn test_if_follows_only_matching_edge() {
    let t = TestEngine::new();
    let id = t.install(if_workflow());

    let snapshot = t
        .engine
        .start(StartRequest::new(id.clone(), json!({"x": 5})))
        .await
        .unwrap();
    assert_eq!(step_blocks(&snapshot), vec!["start", "check", "yes"]);
    assert_eq!(step_output(&snapshot, "check"), &json!({"result": true}));

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"x": 4})))
        .await
        .unwrap();
    assert_eq!(step_blocks(&snapshot), vec!["start", "check", "no"]);
}

#[tokio::test]
async fn test_switch_first_true_group_wins() {
    let t = TestEngine::new();
    let mut route = block("route", "switch", json!({}));
    route.condition_groups = vec![
        group(0, vec![condition("{{$params.n}}", Operator::LessThan, json!(10))]),
        group(1, vec![condition("{{$params.n}}", Operator::GreaterThan, json!(0))]),
        ConditionGroup {
            case: Some("huge".into()),
            ..group(2, vec![condition("{{$params.n}}", Operator::GreaterThan, json!(1000))])
        },
    ];
    let id = t.install(
        WorkflowBuilder::new("switch")
            .block(trigger("start", json!({})))
            .block(route)
            .block(block("small", "doNothing", json!({})))
            .block(block("positive", "doNothing", json!({})))
            .block(block("huge", "doNothing", json!({})))
            .block(block("fallback", "doNothing", json!({})))
            .edge("start", "route")
            .labeled("route", "small", "case1")
            .labeled("route", "positive", "case2")
            .labeled("route", "huge", "huge")
            .labeled("route", "fallback", "default")
            .build(),
    );

    // 5 matches both of the first two groups; the lower index wins
    let snapshot = t
        .engine
        .start(StartRequest::new(id.clone(), json!({"n": 5})))
        .await
        .unwrap();
    assert_eq!(step_blocks(&snapshot), vec!["start", "route", "small"]);

    let snapshot = t
        .engine
        .start(StartRequest::new(id.clone(), json!({"n": 5000})))
        .await
        .unwrap();
    assert_eq!(step_blocks(&snapshot), vec!["start", "route", "positive"]);

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"n": -3})))
        .await
        .unwrap();
    assert_eq!(step_output(&snapshot, "route"), &json!({"case": "case1"}));

    let snapshot = t
        .engine
        .start(StartRequest::new(
            t.install(
                WorkflowBuilder::new("switch-default")
                    .block(trigger("start", json!({})))
                    .block({
                        let mut b = block("route", "switch", json!({}));
                        b.condition_groups = vec![group(
                            0,
                            vec![condition("{{$params.n}}", Operator::IsEmpty, json!(null))],
                        )];
                        b
                    })
                    .block(block("fallback", "doNothing", json!({})))
                    .edge("start", "route")
                    .labeled("route", "fallback", "default")
                    .build(),
            ),
            json!({"n": 1}),
        ))
        .await
        .unwrap();
    assert_eq!(step_blocks(&snapshot), vec!["start", "route", "fallback"]);
}

#[tokio::test]
async fn test_if_without_outcome_edge_fails_run() {
    let t = TestEngine::new();
    let mut check = block("check", "if", json!({}));
    check.condition_groups = vec![group(
        0,
        vec![condition("{{$params.x}}", Operator::Equals, json!(5))],
    )];
    let id = t.install(
        WorkflowBuilder::new("half-branch")
            .block(trigger("start", json!({})))
            .block(check)
            .block(block("no", "log", json!({"message": "no"})))
            .edge("start", "check")
            .labeled("check", "no", "false")
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id.clone(), json!({"x": 5})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Error);
    let error = snapshot.run.error.as_deref().unwrap();
    assert!(error.contains("Definition error"), "{}", error);
    assert!(error.contains("has no 'true' edge"), "{}", error);
    assert_eq!(step_blocks(&snapshot), vec!["start", "check"]);
    assert_eq!(snapshot.steps[1].status, StepStatus::Error);

    // The labeled side still runs
    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"x": 4})))
        .await
        .unwrap();
    assert_eq!(snapshot.run.status, RunStatus::Success);
    assert_eq!(step_blocks(&snapshot), vec!["start", "check", "no"]);
}

#[tokio::test]
async fn test_switch_default_without_edge_fails_run() {
    let t = TestEngine::new();
    let mut route = block("route", "switch", json!({}));
    route.condition_groups = vec![group(
        0,
        vec![condition("{{$params.n}}", Operator::GreaterThan, json!(10))],
    )];
    let id = t.install(
        WorkflowBuilder::new("no-default")
            .block(trigger("start", json!({})))
            .block(route)
            .block(block("big", "doNothing", json!({})))
            .edge("start", "route")
            .labeled("route", "big", "case1")
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"n": 1})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Error);
    let error = snapshot.run.error.as_deref().unwrap();
    assert!(error.contains("Definition error"), "{}", error);
    assert!(error.contains("has no 'default' edge"), "{}", error);
    assert_eq!(step_blocks(&snapshot), vec!["start", "route"]);
}

#[tokio::test]
async fn test_placeholders_mix_params_and_block_output() {
    let t = TestEngine::with_http(MockHttpClient::with_json(200, json!({"title": "Hi"})));
    let mut fetch = block(
        "fetch",
        "httpRequest",
        json!({"url": "https://api.test/items/{{$params.id}}", "method": "get"}),
    );
    fetch.variable_name = "httpRequest".into();
    let id = t.install(
        WorkflowBuilder::new("template")
            .block(trigger("start", json!({})))
            .block(fetch)
            .block(block(
                "say",
                "log",
                json!({"message": "{{$params.id}}-{{httpRequest.body.title}}"}),
            ))
            .edge("start", "fetch")
            .edge("fetch", "say")
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"id": 7})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Success);
    assert_eq!(step_output(&snapshot, "say")["message"], "7-Hi");
    assert_eq!(t.http.requests()[0].url, "https://api.test/items/7");
    // step input keeps the template
    assert_eq!(
        snapshot.steps[2].input["message"],
        "{{$params.id}}-{{httpRequest.body.title}}"
    );
}

#[tokio::test]
async fn test_missing_required_trigger_field_fails_at_trigger() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("strict")
            .block(trigger(
                "start",
                json!({"fields": [{"name": "email", "type": "string", "required": true}]}),
            ))
            .block(block("next", "log", json!({"message": "never"})))
            .edge("start", "next")
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"name": "x"})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Error);
    assert_eq!(step_blocks(&snapshot), vec!["start"]);
    assert_eq!(snapshot.steps[0].status, StepStatus::Error);
    assert!(
        snapshot
            .run
            .error
            .as_deref()
            .unwrap()
            .contains("missing required field 'email'")
    );
}

fn approval_workflow() -> flowline_types::Workflow {
    WorkflowBuilder::new("approval")
        .block(trigger("start", json!({})))
        .block(block("ask", "log", json!({"message": "asking {{$params.who}}"})))
        .block(block(
            "wait",
            "waitForInput",
            json!({"fields": [{"name": "approved", "type": "boolean", "required": true}]}),
        ))
        .block(block("done", "log", json!({"message": "approved={{$params.approved}}"})))
        .edge("start", "ask")
        .edge("ask", "wait")
        .edge("wait", "done")
        .build()
}

#[tokio::test]
async fn test_wait_for_input_suspends_without_executing() {
    let t = TestEngine::new();
    let id = t.install(approval_workflow());

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"who": "ops"})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::WaitingBlock);
    assert_eq!(snapshot.run.waiting_block_id.as_deref(), Some("wait"));
    assert_eq!(step_blocks(&snapshot), vec!["start", "ask"]);
}

#[tokio::test]
async fn test_resume_appends_one_chain() {
    let t = TestEngine::new();
    let id = t.install(approval_workflow());
    let suspended = t
        .engine
        .start(StartRequest::new(id, json!({"who": "ops"})))
        .await
        .unwrap();

    let resumed = t
        .engine
        .resume(&suspended.run.id, json!({"approved": true}), Session::default())
        .await
        .unwrap();

    assert_eq!(resumed.run.id, suspended.run.id);
    assert_eq!(resumed.run.status, RunStatus::Success);
    assert!(resumed.run.waiting_block_id.is_none());
    assert_eq!(step_blocks(&resumed), vec!["start", "ask", "wait", "done"]);
    assert_eq!(&resumed.steps[..2], &suspended.steps[..]);
    assert_eq!(step_output(&resumed, "wait"), &json!({"approved": true}));
    assert_eq!(resumed.steps[2].from_block_id.as_deref(), Some("ask"));
    assert_eq!(resumed.steps[3].from_block_id.as_deref(), Some("wait"));
    assert_eq!(step_output(&resumed, "done")["message"], "approved=true");
    assert!(resumed.run.duration_ms >= suspended.run.duration_ms);
}

#[tokio::test]
async fn test_resume_validates_payload() {
    let t = TestEngine::new();
    let id = t.install(approval_workflow());
    let suspended = t
        .engine
        .start(StartRequest::new(id, json!({"who": "ops"})))
        .await
        .unwrap();

    let resumed = t
        .engine
        .resume(&suspended.run.id, json!({"approved": "yes"}), Session::default())
        .await
        .unwrap();

    assert_eq!(resumed.run.status, RunStatus::Error);
    assert_eq!(step_blocks(&resumed), vec!["start", "ask", "wait"]);
}

#[tokio::test]
async fn test_resume_rejects_run_that_is_not_waiting() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("plain")
            .block(trigger("start", json!({})))
            .build(),
    );
    let finished = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();

    let err = t
        .engine
        .resume(&finished.run.id, json!({}), Session::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NotSuspended(_)));
    assert_eq!(t.engine.snapshot(&finished.run.id).unwrap(), finished);
}

#[tokio::test]
async fn test_resume_replays_outputs_when_enabled() {
    let workflow = WorkflowBuilder::new("replay")
        .block(trigger("start", json!({})))
        .block(block("ask", "log", json!({"message": "hello"})))
        .block(block("wait", "waitForInput", json!({})))
        .block(block("echo", "log", json!({"message": "{{ask.message}}"})))
        .edge("start", "ask")
        .edge("ask", "wait")
        .edge("wait", "echo")
        .build();

    // without replay the earlier block is not in the fresh context
    let t = TestEngine::new();
    let id = t.install(workflow.clone());
    let run = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();
    let resumed = t
        .engine
        .resume(&run.run.id, json!({}), Session::default())
        .await
        .unwrap();
    assert_eq!(resumed.run.status, RunStatus::Error);
    assert!(resumed.run.error.unwrap().contains("unknown context key 'ask'"));

    let t = TestEngine::with_config(EngineConfig {
        replay_outputs_on_resume: true,
        ..EngineConfig::default()
    });
    let id = t.install(workflow);
    let run = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();
    let resumed = t
        .engine
        .resume(&run.run.id, json!({}), Session::default())
        .await
        .unwrap();
    assert_eq!(resumed.run.status, RunStatus::Success);
    assert_eq!(step_output(&resumed, "echo")["message"], "hello");
}

#[tokio::test]
async fn test_iterator_runs_body_per_item_then_loop_end() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("loop")
            .block(trigger("start", json!({})))
            .block(block("each", "iterator", json!({"array": "$params.items"})))
            .block(block("say", "log", json!({"message": "{{iterator.item}}"})))
            .block(block("done", "log", json!({"message": "finished"})))
            .edge("start", "each")
            .labeled("each", "say", LOOP_NEXT)
            .labeled("each", "done", LOOP_END)
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"items": ["a", "b"]})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Success);
    assert_eq!(
        step_blocks(&snapshot),
        vec!["start", "each", "say", "say", "done"]
    );
    assert_eq!(snapshot.steps[2].output["message"], "a");
    assert_eq!(snapshot.steps[3].output["message"], "b");
    assert_eq!(step_output(&snapshot, "each"), &json!({"count": 2}));
}

#[tokio::test]
async fn test_variables_carry_across_iterations() {
    let t = TestEngine::with_config(EngineConfig {
        resolver: flowline_config::ResolverKind::Structural,
        ..EngineConfig::default()
    });
    let id = t.install(
        WorkflowBuilder::new("accumulate")
            .block(trigger("start", json!({})))
            .block(block("each", "iterator", json!({"array": "{{$params.items}}"})))
            .block(block("remember", "variable", json!({"name": "last", "value": "{{iterator.item}}"})))
            .block(block("report", "log", json!({"message": "{{$vars.last}}"})))
            .edge("start", "each")
            .labeled("each", "remember", LOOP_NEXT)
            .labeled("each", "report", LOOP_END)
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"items": [1, 2, 3]})))
        .await
        .unwrap();

    assert_eq!(step_output(&snapshot, "report")["message"], "3");
    assert_eq!(snapshot.run.output["$vars"]["last"], 3);
}

#[tokio::test]
async fn test_continue_on_error_keeps_going() {
    let t = TestEngine::with_http(MockHttpClient::failing("connection refused"));
    let id = t.install(
        WorkflowBuilder::new("tolerant")
            .block(trigger("start", json!({})))
            .block(block(
                "fetch",
                "httpRequest",
                json!({"url": "https://down.test", "continueOnError": true}),
            ))
            .block(block("after", "log", json!({"message": "still here"})))
            .edge("start", "fetch")
            .edge("fetch", "after")
            .build(),
    );

    let snapshot = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Success);
    assert_eq!(step_blocks(&snapshot), vec!["start", "fetch", "after"]);
    assert_eq!(snapshot.steps[1].status, StepStatus::Error);
    assert!(snapshot.steps[1].error.as_deref().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_side_effect_failure_is_fatal_by_default() {
    let t = TestEngine::with_http(MockHttpClient::with_json(500, json!({"error": "boom"})));
    let id = t.install(
        WorkflowBuilder::new("fragile")
            .block(trigger("start", json!({})))
            .block(block("fetch", "httpRequest", json!({"url": "https://api.test"})))
            .block(block("after", "log", json!({"message": "unreachable"})))
            .edge("start", "fetch")
            .edge("fetch", "after")
            .build(),
    );

    let snapshot = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Error);
    assert_eq!(step_blocks(&snapshot), vec!["start", "fetch"]);
    assert!(snapshot.run.error.unwrap().contains("status 500"));
}

#[tokio::test]
async fn test_archived_workflow_cannot_start() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("old")
            .block(trigger("start", json!({})))
            .status(WorkflowStatus::Archived)
            .build(),
    );

    let err = t
        .engine
        .start(StartRequest::new(id, json!({})))
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Archived(_)));
    assert!(t.store.list_runs(None, 10).unwrap().is_empty());
}

#[tokio::test]
async fn test_credentials_resolve_but_are_not_persisted() {
    let t = TestEngine::new();
    t.store
        .set_credential(&Credential::new(
            Some("acme".into()),
            "apiKey",
            t.cipher.encrypt("sk-secret").unwrap(),
        ))
        .unwrap();
    t.store
        .set_variable(&Variable::new(Some("acme".into()), "model", "gpt-4o-mini"))
        .unwrap();
    let id = t.install(
        WorkflowBuilder::new("ai")
            .tenant("acme")
            .block(trigger("start", json!({})))
            .block(block(
                "draft",
                "aiCompletion",
                json!({
                    "model": "{{$vars.model}}",
                    "prompt": "Summarize {{$params.topic}}",
                    "apiKey": "{{$credentials.apiKey}}"
                }),
            ))
            .edge("start", "draft")
            .build(),
    );

    let snapshot = t
        .engine
        .start(StartRequest::new(id, json!({"topic": "rust"})))
        .await
        .unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Success);
    assert_eq!(snapshot.run.tenant_id.as_deref(), Some("acme"));
    assert_eq!(step_output(&snapshot, "draft"), &json!({"text": "generated"}));
    assert!(snapshot.run.output.get("$credentials").is_none());
    assert_eq!(snapshot.run.output["$vars"]["model"], "gpt-4o-mini");
    assert_eq!(snapshot.steps[1].input["apiKey"], "{{$credentials.apiKey}}");
}

#[tokio::test]
async fn test_cycle_hits_step_limit() {
    let t = TestEngine::with_config(EngineConfig {
        max_steps: 25,
        ..EngineConfig::default()
    });
    let id = t.install(
        WorkflowBuilder::new("cycle")
            .block(trigger("start", json!({})))
            .block(block("ping", "doNothing", json!({})))
            .block(block("pong", "doNothing", json!({})))
            .edge("start", "ping")
            .edge("ping", "pong")
            .edge("pong", "ping")
            .build(),
    );

    let snapshot = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Error);
    assert!(snapshot.run.error.unwrap().contains("Step limit of 25"));
    assert_eq!(snapshot.steps.len(), 25);
}

#[tokio::test]
async fn test_definition_error_fails_the_run() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("broken")
            .block(trigger("start", json!({})))
            .block(block("mystery", "sendFax", json!({})))
            .edge("start", "mystery")
            .build(),
    );

    let snapshot = t.engine.start(StartRequest::new(id, json!({}))).await.unwrap();

    assert_eq!(snapshot.run.status, RunStatus::Error);
    assert!(snapshot.steps.is_empty());
    assert!(snapshot.run.error.unwrap().contains("unknown block kind 'sendFax'"));
}

#[tokio::test]
async fn test_subscription_streams_until_terminal() {
    let t = TestEngine::new();
    let id = t.install(
        WorkflowBuilder::new("watched")
            .block(trigger("start", json!({})))
            .block(block("note", "log", json!({"message": "hi"})))
            .edge("start", "note")
            .build(),
    );

    let run_id = flowline_types::new_id();
    let mut subscription = t.engine.subscribe(&run_id).unwrap();
    let finished = t
        .engine
        .start(StartRequest::new(id, json!({})).with_run_id(run_id.clone()))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Some(snapshot) = subscription.next().await {
        seen.push(snapshot);
    }

    assert!(seen.len() >= 5);
    assert!(seen[..seen.len() - 1].iter().all(|s| !s.is_terminal()));
    assert_eq!(seen.last().unwrap(), &finished);
    assert!(seen.iter().all(|s| s.run.id == run_id));
}
