//! On-disk tests for the SQLite store.

use flowline_store::{
    EntityStorage, ExecutionStorage, SecretStorage, SqliteStore, StoreError, WorkflowStorage,
};
use flowline_types::{
    Block, Credential, Edge, Run, RunStatus, Step, StepStatus, TriggerType, Variable, Workflow,
    WorkflowStatus, now,
};
use serde_json::{Map, json};
use tempfile::TempDir;

fn workflow(id: &str, tenant: Option<&str>) -> Workflow {
    Workflow {
        id: id.to_string(),
        name: format!("workflow {}", id),
        tenant_id: tenant.map(String::from),
        status: WorkflowStatus::Live,
        is_global: tenant.is_none(),
        blocks: vec![
            Block {
                id: "start".into(),
                workflow_id: id.into(),
                kind: "manualTrigger".into(),
                input: Map::new(),
                variable_name: "trigger".into(),
                is_trigger: true,
                edges: vec![Edge::new("start", "log")],
                condition_groups: vec![],
            },
            Block {
                id: "log".into(),
                workflow_id: id.into(),
                kind: "log".into(),
                input: json!({"message": "{{$params.name}}"})
                    .as_object()
                    .cloned()
                    .unwrap(),
                variable_name: "log".into(),
                is_trigger: false,
                edges: vec![],
                condition_groups: vec![],
            },
        ],
        examples: vec![],
        created_at: now(),
    }
}

#[test]
fn test_reopen_persists_everything() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data").join("flowline.db");

    let run_id = {
        let store = SqliteStore::open(&path).unwrap();
        store.save_workflow(&workflow("wf-1", Some("t1"))).unwrap();

        let mut run = Run::new(None, "wf-1", Some("t1".into()), TriggerType::Api, json!({"name": "Ada"}));
        store.create_run(&run).unwrap();

        let mut step = Step::pending(&run.id, "start", None, json!({}));
        store.create_step(&step).unwrap();
        step.finish(json!({"name": "Ada"}), None);
        store.update_step(&step).unwrap();

        run.status = RunStatus::WaitingBlock;
        run.waiting_block_id = Some("log".into());
        run.duration_ms = 12;
        store.update_run(&run).unwrap();
        run.id
    };

    let store = SqliteStore::open(&path).unwrap();
    let wf = store.get_workflow("wf-1").unwrap();
    assert_eq!(wf.blocks.len(), 2);
    assert_eq!(wf.block("log").unwrap().input["message"], "{{$params.name}}");

    let snapshot = store.snapshot(&run_id).unwrap();
    assert_eq!(snapshot.run.status, RunStatus::WaitingBlock);
    assert_eq!(snapshot.run.waiting_block_id.as_deref(), Some("log"));
    assert_eq!(snapshot.run.trigger_type, TriggerType::Api);
    assert_eq!(snapshot.run.duration_ms, 12);
    assert_eq!(snapshot.steps.len(), 1);
    assert_eq!(snapshot.steps[0].status, StepStatus::Success);
    assert!(snapshot.steps[0].finished_at.is_some());
}

#[test]
fn test_steps_keep_start_order() {
    let store = SqliteStore::open_in_memory().unwrap();
    let run = Run::new(None, "wf", None, TriggerType::Manual, json!({}));
    store.create_run(&run).unwrap();

    for block in ["a", "b", "c", "b"] {
        store
            .create_step(&Step::pending(&run.id, block, None, json!({})))
            .unwrap();
    }

    let blocks: Vec<_> = store
        .list_steps(&run.id)
        .unwrap()
        .into_iter()
        .map(|s| s.block_id)
        .collect();
    assert_eq!(blocks, vec!["a", "b", "c", "b"]);
}

#[test]
fn test_missing_records() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(matches!(store.get_workflow("nope"), Err(StoreError::NotFound(_))));
    assert!(matches!(store.get_run("nope"), Err(StoreError::NotFound(_))));

    let run = Run::new(None, "wf", None, TriggerType::Manual, json!({}));
    assert!(matches!(store.update_run(&run), Err(StoreError::NotFound(_))));
}

#[test]
fn test_list_workflows_by_tenant() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.save_workflow(&workflow("g", None)).unwrap();
    store.save_workflow(&workflow("t", Some("t1"))).unwrap();

    assert_eq!(store.list_workflows(None).unwrap().len(), 2);
    let tenant = store.list_workflows(Some("t1")).unwrap();
    assert_eq!(tenant.len(), 1);
    assert_eq!(tenant[0].id, "t");

    // save is an upsert
    let mut renamed = workflow("t", Some("t1"));
    renamed.name = "renamed".into();
    store.save_workflow(&renamed).unwrap();
    assert_eq!(store.get_workflow("t").unwrap().name, "renamed");

    assert!(store.delete_workflow("g").unwrap());
    assert!(!store.delete_workflow("g").unwrap());
}

#[test]
fn test_list_runs_filters_and_limits() {
    let store = SqliteStore::open_in_memory().unwrap();
    for _ in 0..3 {
        store
            .create_run(&Run::new(None, "wf-a", None, TriggerType::Manual, json!({})))
            .unwrap();
    }
    store
        .create_run(&Run::new(None, "wf-b", None, TriggerType::Manual, json!({})))
        .unwrap();

    assert_eq!(store.list_runs(Some("wf-a"), 10).unwrap().len(), 3);
    assert_eq!(store.list_runs(None, 2).unwrap().len(), 2);
}

#[test]
fn test_secret_scopes_upsert() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set_variable(&Variable::new(None, "region", "eu")).unwrap();
    store.set_variable(&Variable::new(None, "region", "us")).unwrap();
    store
        .set_variable(&Variable::new(Some("t1".into()), "region", "ap"))
        .unwrap();

    let global = store.list_variables(None).unwrap();
    assert_eq!(global.len(), 1);
    assert_eq!(global[0].value, "us");
    assert_eq!(global[0].tenant_id, None);

    let tenant = store.list_variables(Some("t1")).unwrap();
    assert_eq!(tenant[0].tenant_id.as_deref(), Some("t1"));

    store
        .set_credential(&Credential::new(Some("t1".into()), "api_key", "cipher"))
        .unwrap();
    assert!(store.list_credentials(None).unwrap().is_empty());
    assert_eq!(store.list_credentials(Some("t1")).unwrap().len(), 1);
    assert!(store.delete_credential(Some("t1"), "api_key").unwrap());
    assert!(store.list_credentials(Some("t1")).unwrap().is_empty());
}

#[test]
fn test_entity_row_lifecycle() {
    let store = SqliteStore::open_in_memory().unwrap();
    let row = store
        .create_row("contacts", json!({"name": "Ada", "tags": ["a"]}))
        .unwrap();

    let fetched = store.get_row("contacts", &row.id).unwrap().unwrap();
    assert_eq!(fetched.data["name"], "Ada");

    let updated = store
        .update_row("contacts", &row.id, json!({"name": "Grace"}))
        .unwrap()
        .unwrap();
    assert_eq!(updated.data, json!({"name": "Grace", "tags": ["a"]}));

    assert!(store.update_row("contacts", "missing", json!({})).unwrap().is_none());
    assert!(store.delete_row("contacts", &row.id).unwrap());
    assert!(store.get_row("contacts", &row.id).unwrap().is_none());
}
