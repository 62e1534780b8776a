//! Common test utilities for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use flowline_engine::{
    AgeCipher, BroadcastPublisher, EngineConfig, EngineStore, MockCompletionClient,
    MockHttpClient, MockMailer, SecretCipher, Services, WorkflowEngine,
};
use flowline_store::{MockStorage, WorkflowStorage};
use flowline_types::{
    Block, Combinator, Condition, ConditionGroup, Edge, Operator, RunSnapshot, Workflow,
    WorkflowStatus, now,
};
use serde_json::{Map, Value};

/// An engine wired to mock collaborators and a fresh age identity.
pub struct TestEngine<S = MockStorage> {
    pub engine: WorkflowEngine,
    pub store: Arc<S>,
    pub http: Arc<MockHttpClient>,
    pub mailer: Arc<MockMailer>,
    pub cipher: Arc<AgeCipher>,
}

impl TestEngine<MockStorage> {
    pub fn new() -> Self {
        Self::with_http(MockHttpClient::default())
    }

    pub fn with_http(http: MockHttpClient) -> Self {
        Self::build(Arc::new(MockStorage::new()), http, EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::build(Arc::new(MockStorage::new()), MockHttpClient::default(), config)
    }
}

impl<S: EngineStore + 'static> TestEngine<S> {
    pub fn build(store: Arc<S>, http: MockHttpClient, config: EngineConfig) -> Self {
        let (cipher, _) = AgeCipher::generate();
        let cipher = Arc::new(cipher);
        let http = Arc::new(http);
        let mailer = Arc::new(MockMailer::accepting());
        let services = Services {
            http: http.clone(),
            completions: Arc::new(MockCompletionClient::with_text("generated")),
            mailer: mailer.clone(),
            cipher: cipher.clone() as Arc<dyn SecretCipher>,
            publisher: Arc::new(BroadcastPublisher::new()),
        };
        Self {
            engine: WorkflowEngine::new(store.clone(), services, config),
            store,
            http,
            mailer,
            cipher,
        }
    }

    /// Save a workflow and return its id.
    pub fn install(&self, workflow: Workflow) -> String {
        let id = workflow.id.clone();
        self.store.save_workflow(&workflow).unwrap();
        id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow builders
// ─────────────────────────────────────────────────────────────────────────────

pub fn block(id: &str, kind: &str, input: Value) -> Block {
    Block {
        id: id.to_string(),
        workflow_id: String::new(),
        kind: kind.to_string(),
        input: input.as_object().cloned().unwrap_or_else(Map::new),
        variable_name: id.to_string(),
        is_trigger: false,
        edges: Vec::new(),
        condition_groups: Vec::new(),
    }
}

pub fn trigger(id: &str, input: Value) -> Block {
    Block {
        is_trigger: true,
        ..block(id, "manualTrigger", input)
    }
}

pub fn group(index: u32, conditions: Vec<Condition>) -> ConditionGroup {
    ConditionGroup {
        index,
        combinator: Combinator::And,
        case: None,
        conditions,
    }
}

pub fn condition(variable: &str, operator: Operator, value: Value) -> Condition {
    Condition {
        variable: variable.to_string(),
        operator,
        value,
    }
}

/// Assembles a workflow; edges are attached to their source blocks.
pub struct WorkflowBuilder {
    workflow: Workflow,
}

impl WorkflowBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            workflow: Workflow {
                id: id.to_string(),
                name: format!("{} workflow", id),
                tenant_id: None,
                status: WorkflowStatus::Live,
                is_global: false,
                blocks: Vec::new(),
                examples: Vec::new(),
                created_at: now(),
            },
        }
    }

    pub fn block(mut self, mut block: Block) -> Self {
        block.workflow_id = self.workflow.id.clone();
        self.workflow.blocks.push(block);
        self
    }

    pub fn edge(self, from: &str, to: &str) -> Self {
        self.push_edge(Edge::new(from, to))
    }

    pub fn labeled(self, from: &str, to: &str, label: &str) -> Self {
        self.push_edge(Edge::labeled(from, to, label))
    }

    fn push_edge(mut self, edge: Edge) -> Self {
        let source = self
            .workflow
            .blocks
            .iter_mut()
            .find(|b| b.id == edge.from_block_id)
            .unwrap_or_else(|| panic!("no block '{}'", edge.from_block_id));
        source.edges.push(edge);
        self
    }

    pub fn tenant(mut self, tenant_id: &str) -> Self {
        self.workflow.tenant_id = Some(tenant_id.to_string());
        self
    }

    pub fn global(mut self) -> Self {
        self.workflow.is_global = true;
        self
    }

    pub fn status(mut self, status: WorkflowStatus) -> Self {
        self.workflow.status = status;
        self
    }

    pub fn build(self) -> Workflow {
        self.workflow
    }
}

/// Block ids of a snapshot's steps, in order.
pub fn step_blocks(snapshot: &RunSnapshot) -> Vec<&str> {
    snapshot.steps.iter().map(|s| s.block_id.as_str()).collect()
}

/// The output of the first step that ran `block_id`.
pub fn step_output<'a>(snapshot: &'a RunSnapshot, block_id: &str) -> &'a Value {
    &snapshot
        .steps
        .iter()
        .find(|s| s.block_id == block_id)
        .unwrap_or_else(|| panic!("no step for '{}'", block_id))
        .output
}
