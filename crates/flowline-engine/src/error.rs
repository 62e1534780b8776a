//! Error types for the workflow engine.

use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::secrets::SecretError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while starting, executing or resuming a run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage backend failed.
    #[error("Storage error: {0}")]
    Store(#[from] flowline_store::StoreError),

    /// Structurally invalid workflow.
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(#[from] flowline_types::DefinitionError),

    /// Workflow graph or block configuration error.
    #[error("Definition error: {0}")]
    Definition(String),

    /// A `{{...}}` placeholder could not be resolved.
    #[error("Template error: {0}")]
    Template(String),

    /// Resolved input or payload failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Outbound call failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Secret decryption or key handling failed.
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// `resume` called on a run that isn't waiting for input.
    #[error("Run {0} is not waiting for input")]
    NotSuspended(String),

    /// Archived workflows cannot be started.
    #[error("Workflow {0} is archived")]
    Archived(String),

    /// The traversal executed more steps than allowed.
    #[error("Step limit of {0} exceeded")]
    StepLimit(usize),

    /// Live subscriptions need a broadcasting publisher.
    #[error("Snapshot subscriptions are not available with this publisher")]
    SubscriptionsUnavailable,

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
