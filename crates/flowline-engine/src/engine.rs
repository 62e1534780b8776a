//! The graph execution engine.
//!
//! A run is a sequential depth-first traversal from the trigger block (or,
//! on resumption, from the block it was waiting on):
//!
//! ```text
//! start ──► create Run ──► build graph ──► assemble $vars/$credentials
//!                                              │
//!            ┌─────────────────────────────────┘
//!            ▼
//!        run_step(block) ── Step pending ── dispatch ── Step finished ── publish
//!            │
//!            ├─ fatal error       ──► Run error
//!            ├─ edge → waitForInput ──► Run waitingBlock (siblings skipped)
//!            └─ each next block   ──► run_step(next)      (depth first)
//! ```
//!
//! Every Step and Run transition is written to the store before the
//! traversal moves on. Snapshots are published after each write; a
//! publishing failure is logged and ignored.

use std::sync::Arc;
use std::time::Instant;

use flowline_config::{EngineSection, FlowlineConfig, ResolverKind};
use flowline_store::{EntityStorage, ExecutionStorage, SecretStorage, WorkflowStorage};
use flowline_types::{
    Id, Run, RunSnapshot, RunStatus, Session, Step, StepStatus, TriggerType, Workflow,
    WorkflowStatus, now,
};
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assembly::assemble;
use crate::collaborators::{
    CompletionClient, HttpClient, Mailer, OpenAiCompletionClient, ReqwestHttpClient,
    ResendMailer,
};
use crate::context::RunContext;
use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, Result};
use crate::graph::{BlockGraph, NodeId};
use crate::publisher::{
    BroadcastPublisher, RunSubscription, SnapshotPublisher, channel_name,
};
use crate::registry::BlockKind;
use crate::resolver;
use crate::secrets::SecretCipher;

/// Everything the engine needs from durable storage.
pub trait EngineStore: WorkflowStorage + ExecutionStorage + SecretStorage + EntityStorage {}

impl<T> EngineStore for T where T: WorkflowStorage + ExecutionStorage + SecretStorage + EntityStorage
{}

/// Engine behaviour switches, from the `[engine]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub resolver: ResolverKind,
    pub replay_outputs_on_resume: bool,
    pub max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSection::default())
    }
}

impl From<&EngineSection> for EngineConfig {
    fn from(section: &EngineSection) -> Self {
        Self {
            resolver: section.resolver,
            replay_outputs_on_resume: section.replay_outputs_on_resume,
            max_steps: section.max_steps.max(1),
        }
    }
}

/// Outbound collaborators and infrastructure services.
#[derive(Clone)]
pub struct Services {
    pub http: Arc<dyn HttpClient>,
    pub completions: Arc<dyn CompletionClient>,
    pub mailer: Arc<dyn Mailer>,
    pub cipher: Arc<dyn SecretCipher>,
    pub publisher: Arc<dyn SnapshotPublisher>,
}

impl Services {
    /// Production collaborators configured from `config`, with a
    /// [`BroadcastPublisher`].
    pub fn from_config(config: &FlowlineConfig, cipher: Arc<dyn SecretCipher>) -> Result<Self> {
        Ok(Self {
            http: Arc::new(ReqwestHttpClient::new(&config.http())?),
            completions: Arc::new(OpenAiCompletionClient::new(&config.ai())?),
            mailer: Arc::new(ResendMailer::new(&config.mail())?),
            cipher,
            publisher: Arc::new(BroadcastPublisher::new()),
        })
    }
}

/// Parameters of [`WorkflowEngine::start`].
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub workflow_id: Id,
    pub input: Value,
    pub session: Session,
    pub trigger_type: TriggerType,
    /// Pre-allocated run id, so callers can subscribe before the run starts.
    pub run_id: Option<Id>,
}

impl StartRequest {
    pub fn new(workflow_id: impl Into<Id>, input: Value) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            input,
            session: Session::default(),
            trigger_type: TriggerType::Manual,
            run_id: None,
        }
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn with_trigger(mut self, trigger_type: TriggerType) -> Self {
        self.trigger_type = trigger_type;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<Id>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }
}

/// Where a traversal begins.
#[derive(Debug, Clone)]
enum Entry {
    Trigger,
    Resume { block_id: Id },
}

/// How a traversal (or one subtree of it) ended.
#[derive(Debug)]
enum Flow {
    Continue(RunContext),
    Suspend { block_id: Id, ctx: RunContext },
    Fail { message: String, ctx: RunContext },
}

/// Executes workflow graphs and records their runs.
pub struct WorkflowEngine {
    store: Arc<dyn EngineStore>,
    dispatcher: Dispatcher,
    cipher: Arc<dyn SecretCipher>,
    publisher: Arc<dyn SnapshotPublisher>,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new<S>(store: Arc<S>, services: Services, config: EngineConfig) -> Self
    where
        S: EngineStore + 'static,
    {
        let entities: Arc<dyn EntityStorage> = store.clone();
        let dispatcher = Dispatcher::new(
            resolver::for_kind(config.resolver),
            entities,
            services.http,
            services.completions,
            services.mailer,
        );
        Self {
            store,
            dispatcher,
            cipher: services.cipher,
            publisher: services.publisher,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a new run of a workflow and drive it until it finishes or
    /// suspends.
    pub async fn start(&self, request: StartRequest) -> Result<RunSnapshot> {
        let workflow = self.store.get_workflow(&request.workflow_id)?;
        if workflow.status == WorkflowStatus::Archived {
            return Err(EngineError::Archived(workflow.id));
        }

        let tenant_id = request
            .session
            .tenant_id
            .clone()
            .or_else(|| workflow.tenant_id.clone());
        let run = Run::new(
            request.run_id,
            workflow.id.as_str(),
            tenant_id,
            request.trigger_type,
            request.input.clone(),
        );
        self.store.create_run(&run)?;
        info!(
            run_id = %run.id,
            workflow_id = %workflow.id,
            trigger = %run.trigger_type,
            "Run started"
        );
        self.publish(&run.id);

        self.execute(run, &workflow, Entry::Trigger, request.input, &request.session)
            .await
    }

    /// Continue a run suspended on a `waitForInput` block.
    ///
    /// The waiting block runs first with `input` as `$params`; prior steps
    /// are left untouched.
    pub async fn resume(&self, run_id: &str, input: Value, session: Session) -> Result<RunSnapshot> {
        let mut run = self.store.get_run(run_id)?;
        let block_id = match (&run.status, run.waiting_block_id.clone()) {
            (RunStatus::WaitingBlock, Some(block_id)) => block_id,
            _ => return Err(EngineError::NotSuspended(run.id)),
        };
        let workflow = self.store.get_workflow(&run.workflow_id)?;

        run.status = RunStatus::Running;
        run.waiting_block_id = None;
        run.error = None;
        run.updated_at = now();
        self.store.update_run(&run)?;
        info!(run_id = %run.id, block_id = %block_id, "Run resumed");
        self.publish(&run.id);

        self.execute(run, &workflow, Entry::Resume { block_id }, input, &session)
            .await
    }

    /// Live snapshots of a run, ending with its next terminal snapshot.
    pub fn subscribe(&self, run_id: &str) -> Result<RunSubscription> {
        self.publisher
            .subscribe(&channel_name(run_id))
            .map(RunSubscription::new)
            .ok_or(EngineError::SubscriptionsUnavailable)
    }

    /// Current persisted state of a run.
    pub fn snapshot(&self, run_id: &str) -> Result<RunSnapshot> {
        Ok(self.store.snapshot(run_id)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Execution
    // ─────────────────────────────────────────────────────────────────────

    async fn execute(
        &self,
        mut run: Run,
        workflow: &Workflow,
        entry: Entry,
        params: Value,
        session: &Session,
    ) -> Result<RunSnapshot> {
        let timer = Instant::now();
        let outcome = self.traverse(&run, workflow, entry, params, session).await;
        run.duration_ms += timer.elapsed().as_millis() as u64;

        match outcome {
            Ok(Flow::Continue(ctx)) => {
                run.status = RunStatus::Success;
                run.output = ctx.persisted();
            }
            Ok(Flow::Suspend { block_id, ctx }) => {
                run.status = RunStatus::WaitingBlock;
                run.waiting_block_id = Some(block_id);
                run.output = ctx.persisted();
            }
            Ok(Flow::Fail { message, ctx }) => {
                run.status = RunStatus::Error;
                run.error = Some(message);
                run.output = ctx.persisted();
            }
            Err(e) => {
                run.status = RunStatus::Error;
                run.error = Some(e.to_string());
            }
        }
        run.updated_at = now();
        self.store.update_run(&run)?;

        info!(
            run_id = %run.id,
            status = %run.status,
            duration_ms = run.duration_ms,
            error = run.error.as_deref().unwrap_or(""),
            "Run finished"
        );
        self.publish(&run.id);

        self.snapshot(&run.id)
    }

    async fn traverse(
        &self,
        run: &Run,
        workflow: &Workflow,
        entry: Entry,
        params: Value,
        session: &Session,
    ) -> Result<Flow> {
        let graph = BlockGraph::build(workflow)?;
        let scope = assemble(
            &*self.store,
            self.cipher.as_ref(),
            run.tenant_id.as_deref(),
            graph.is_global,
        )?;
        let mut ctx = RunContext::new(params, session, scope.vars, scope.credentials);

        let (start, from) = match entry {
            Entry::Trigger => (graph.trigger(), None),
            Entry::Resume { block_id } => {
                if self.config.replay_outputs_on_resume {
                    self.replay_outputs(&run.id, &graph, &mut ctx)?;
                }
                let start = graph.find(&block_id).ok_or_else(|| {
                    EngineError::Definition(format!(
                        "waiting block '{}' no longer exists in workflow '{}'",
                        block_id, workflow.id
                    ))
                })?;
                (start, self.suspended_from(&run.id, &graph, start)?)
            }
        };

        let mut traversal = Traversal {
            engine: self,
            graph,
            run_id: run.id.clone(),
            steps: 0,
        };
        traversal.run_step(start, from, ctx).await
    }

    /// The block whose edge led the run into `target`: the latest step
    /// recorded for a block with an edge to it.
    fn suspended_from(
        &self,
        run_id: &str,
        graph: &BlockGraph,
        target: NodeId,
    ) -> Result<Option<Id>> {
        let steps = self.store.list_steps(run_id)?;
        Ok(steps
            .into_iter()
            .rev()
            .find(|step| {
                graph
                    .find(&step.block_id)
                    .is_some_and(|id| graph.node(id).all_targets().contains(&target))
            })
            .map(|step| step.block_id))
    }

    /// Merge the outputs of the run's successful steps back into `ctx`.
    fn replay_outputs(&self, run_id: &str, graph: &BlockGraph, ctx: &mut RunContext) -> Result<()> {
        for step in self.store.list_steps(run_id)? {
            if step.status != StepStatus::Success {
                continue;
            }
            if let Some(id) = graph.find(&step.block_id) {
                ctx.insert_block(&graph.node(id).block.variable_name, step.output, None);
            }
        }
        Ok(())
    }

    fn publish(&self, run_id: &str) {
        let channel = channel_name(run_id);
        if !self.publisher.wants(&channel) {
            return;
        }
        let snapshot = match self.store.snapshot(run_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(run_id, error = %e, "Failed to load snapshot for publishing");
                return;
            }
        };
        if let Err(e) = self.publisher.publish(&channel, &snapshot) {
            warn!(run_id, error = %e, "Failed to publish snapshot");
        }
    }
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traversal
// ─────────────────────────────────────────────────────────────────────────────

/// State of one invocation's depth-first walk.
struct Traversal<'e> {
    engine: &'e WorkflowEngine,
    graph: Arc<BlockGraph>,
    run_id: Id,
    steps: usize,
}

impl Traversal<'_> {
    /// Execute one block, then its successors depth first.
    fn run_step(
        &mut self,
        node_id: NodeId,
        from: Option<Id>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<Flow>> {
        Box::pin(async move {
            self.steps += 1;
            if self.steps > self.engine.config.max_steps {
                return Err(EngineError::StepLimit(self.engine.config.max_steps));
            }

            let engine = self.engine;
            let graph = Arc::clone(&self.graph);
            let node = graph.node(node_id);
            let block = &node.block;

            let mut step = Step::pending(
                self.run_id.as_str(),
                block.id.as_str(),
                from,
                Value::Object(block.input.clone()),
            );
            engine.store.create_step(&step)?;
            engine.publish(&self.run_id);

            let result = engine.dispatcher.execute(node, &ctx).await;
            let (output, error, fatal, next, iterate, vars) = match result {
                Ok(r) => {
                    let fatal = r.is_fatal();
                    (r.output, r.error, fatal, r.next, r.iterate, r.vars)
                }
                Err(e) => (Value::Null, Some(e.to_string()), true, Vec::new(), None, None),
            };

            let mut ctx = ctx;
            ctx.insert_block(&block.variable_name, output.clone(), error.clone());
            if let Some(vars) = vars {
                ctx.set_vars(vars);
            }

            step.finish(output, error.clone());
            engine.store.update_step(&step)?;
            engine.publish(&self.run_id);
            debug!(
                run_id = %self.run_id,
                block_id = %block.id,
                kind = %node.kind,
                status = %step.status,
                duration_ms = step.duration_ms,
                "Step finished"
            );

            if fatal {
                let message = error.unwrap_or_else(|| format!("block '{}' failed", block.id));
                return Ok(Flow::Fail { message, ctx });
            }

            if let Some(iteration) = iterate {
                let len = iteration.items.len();
                for (index, item) in iteration.items.into_iter().enumerate() {
                    let mut item_ctx = ctx.with_iterator(index, item, len);
                    for &target in &iteration.body {
                        match self.visit(target, &block.id, item_ctx).await? {
                            Flow::Continue(next_ctx) => item_ctx = next_ctx,
                            other => return Ok(other),
                        }
                    }
                    ctx.set_vars(item_ctx.vars());
                }
            }

            for target in next {
                match self.visit(target, &block.id, ctx).await? {
                    Flow::Continue(next_ctx) => ctx = next_ctx,
                    other => return Ok(other),
                }
            }

            Ok(Flow::Continue(ctx))
        })
    }

    /// Follow one edge. Reaching a `waitForInput` block suspends the run
    /// without executing it.
    async fn visit(&mut self, target: NodeId, from: &Id, ctx: RunContext) -> Result<Flow> {
        let node = self.graph.node(target);
        if node.kind == BlockKind::WaitForInput {
            debug!(run_id = %self.run_id, block_id = %node.block.id, "Suspending at waitForInput");
            return Ok(Flow::Suspend {
                block_id: node.block.id.clone(),
                ctx,
            });
        }
        self.run_step(target, Some(from.clone()), ctx).await
    }
}
