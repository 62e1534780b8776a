//! Graph execution engine for Flowline workflows.
//!
//! A workflow is a directed graph of typed blocks. The engine walks it depth
//! first from the trigger block, resolving `{{...}}` placeholders in each
//! block's input against the run context, dispatching the block by kind, and
//! recording every step. Runs can suspend on `waitForInput` blocks and be
//! resumed later with new input.
//!
//! # Example
//!
//! ```rust,ignore
//! use flowline_engine::{EngineConfig, Services, StartRequest, WorkflowEngine};
//!
//! let engine = WorkflowEngine::new(store, services, EngineConfig::default());
//! let snapshot = engine.start(StartRequest::new("wf-1", json!({"id": 7}))).await?;
//! println!("{} after {} steps", snapshot.run.status, snapshot.steps.len());
//! ```

pub mod assembly;
pub mod collaborators;
pub mod condition;
pub mod context;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod graph;
pub mod publisher;
pub mod registry;
pub mod resolver;
pub mod secrets;

pub use assembly::{SecretScope, assemble};
pub use collaborators::{
    CollaboratorError, CompletionClient, CompletionRequest, EmailMessage, HttpClient,
    HttpRequest, HttpResponse, Mailer, MockCompletionClient, MockHttpClient, MockMailer,
    OpenAiCompletionClient, ReqwestHttpClient, ResendMailer,
};
pub use context::RunContext;
pub use dispatcher::{BlockResult, Dispatcher, Iteration, LOOP_END, LOOP_NEXT};
pub use engine::{EngineConfig, EngineStore, Services, StartRequest, WorkflowEngine};
pub use error::{EngineError, Result};
pub use graph::{BlockGraph, Node, NodeId};
pub use publisher::{
    BroadcastPublisher, NoopPublisher, PublishError, RunSubscription, SnapshotPublisher,
    channel_name,
};
pub use registry::{BlockKind, BlockSpec, Family, FieldSpec, FieldType, catalog};
pub use resolver::{SerializedResolver, StructuralResolver, TemplateResolver};
pub use secrets::{AgeCipher, SecretCipher, SecretError};
