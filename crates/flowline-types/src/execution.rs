//! Run and step records: the durable execution trace.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Id, Timestamp, new_id, now};

/// How a run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    #[default]
    Manual,
    Api,
    Stream,
}

string_enum!(TriggerType, "trigger type", {
    Manual => "manual",
    Api => "api",
    Stream => "stream",
});

/// Run state machine: `running → success | error | waitingBlock`.
///
/// `waitingBlock` may go back to `running` on resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    #[default]
    Running,
    Success,
    Error,
    WaitingBlock,
}

string_enum!(RunStatus, "run status", {
    Running => "running",
    Success => "success",
    Error => "error",
    WaitingBlock => "waitingBlock",
});

impl RunStatus {
    /// Whether the run has stopped executing (finished or suspended).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Success,
    Error,
}

string_enum!(StepStatus, "step status", {
    Pending => "pending",
    Success => "success",
    Error => "error",
});

/// Caller identity attached to a run, exposed to blocks as `$session`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub user_id: Option<Id>,
    #[serde(default)]
    pub tenant_id: Option<Id>,
    /// Free-form attributes forwarded from the caller.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, Value>,
}

impl Session {
    pub fn for_tenant(tenant_id: impl Into<Id>) -> Self {
        Self {
            tenant_id: Some(tenant_id.into()),
            ..Default::default()
        }
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: Id,
    pub workflow_id: Id,
    #[serde(default)]
    pub tenant_id: Option<Id>,
    pub trigger_type: TriggerType,
    pub status: RunStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    /// Total execution time in milliseconds, summed across resumptions.
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub error: Option<String>,
    /// Block the run is suspended on; only set while `waitingBlock`.
    #[serde(default)]
    pub waiting_block_id: Option<Id>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Run {
    /// A fresh `running` record.
    pub fn new(
        id: Option<Id>,
        workflow_id: impl Into<Id>,
        tenant_id: Option<Id>,
        trigger_type: TriggerType,
        input: Value,
    ) -> Self {
        let ts = now();
        Self {
            id: id.unwrap_or_else(new_id),
            workflow_id: workflow_id.into(),
            tenant_id,
            trigger_type,
            status: RunStatus::Running,
            input,
            output: Value::Null,
            duration_ms: 0,
            error: None,
            waiting_block_id: None,
            created_at: ts,
            updated_at: ts,
        }
    }
}

/// One execution of one block within a run. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: Id,
    pub run_id: Id,
    pub block_id: Id,
    #[serde(default)]
    pub from_block_id: Option<Id>,
    pub status: StepStatus,
    /// The block's input template as configured (placeholders unresolved).
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Option<String>,
    pub started_at: Timestamp,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl Step {
    /// A `pending` step starting now.
    pub fn pending(
        run_id: impl Into<Id>,
        block_id: impl Into<Id>,
        from_block_id: Option<Id>,
        input: Value,
    ) -> Self {
        Self {
            id: new_id(),
            run_id: run_id.into(),
            block_id: block_id.into(),
            from_block_id,
            status: StepStatus::Pending,
            input,
            output: Value::Null,
            error: None,
            started_at: now(),
            finished_at: None,
            duration_ms: 0,
        }
    }

    /// Mark the step finished with the dispatcher's outcome.
    pub fn finish(&mut self, output: Value, error: Option<String>) {
        let finished = now();
        self.status = if error.is_some() {
            StepStatus::Error
        } else {
            StepStatus::Success
        };
        self.output = output;
        self.error = error;
        self.duration_ms = (finished - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(finished);
    }
}

/// A run together with its steps ordered by start time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run: Run,
    pub steps: Vec<Step>,
}

impl RunSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.run.status.is_terminal()
    }
}
