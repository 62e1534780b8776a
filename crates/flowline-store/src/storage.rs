//! Storage abstraction traits.
//!
//! ```text
//! WorkflowStorage / ExecutionStorage / SecretStorage / EntityStorage
//!     └── SqliteStore   - SQLite implementation (one connection, WAL)
//!     └── MockStorage   - In-memory mock for testing
//! ```

use flowline_types::{Credential, Id, Run, RunSnapshot, Step, Timestamp, Variable, Workflow};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// Trait for workflow definition storage.
pub trait WorkflowStorage: Send + Sync {
    /// Insert or replace a workflow definition.
    fn save_workflow(&self, workflow: &Workflow) -> Result<()>;

    /// Get a workflow by ID.
    fn get_workflow(&self, id: &str) -> Result<Workflow>;

    /// List workflows, optionally restricted to one tenant.
    fn list_workflows(&self, tenant_id: Option<&str>) -> Result<Vec<Workflow>>;

    fn delete_workflow(&self, id: &str) -> Result<bool>;
}

/// Trait for the durable execution trace.
///
/// Steps are append-only: `update_step` only finalizes a step created by
/// `create_step`.
pub trait ExecutionStorage: Send + Sync {
    fn create_run(&self, run: &Run) -> Result<()>;

    fn update_run(&self, run: &Run) -> Result<()>;

    fn get_run(&self, id: &str) -> Result<Run>;

    /// Most recent runs first.
    fn list_runs(&self, workflow_id: Option<&str>, limit: usize) -> Result<Vec<Run>>;

    fn create_step(&self, step: &Step) -> Result<()>;

    fn update_step(&self, step: &Step) -> Result<()>;

    /// Steps of a run ordered by start time.
    fn list_steps(&self, run_id: &str) -> Result<Vec<Step>>;

    /// The run together with its ordered steps.
    fn snapshot(&self, run_id: &str) -> Result<RunSnapshot> {
        Ok(RunSnapshot {
            run: self.get_run(run_id)?,
            steps: self.list_steps(run_id)?,
        })
    }
}

/// Trait for variable and credential storage.
///
/// A `None` tenant addresses the global scope. Listing is exact: the
/// global scope and a tenant scope never mix here.
pub trait SecretStorage: Send + Sync {
    /// Insert or update by `(tenant, name)`.
    fn set_variable(&self, variable: &Variable) -> Result<()>;

    fn list_variables(&self, tenant_id: Option<&str>) -> Result<Vec<Variable>>;

    fn delete_variable(&self, tenant_id: Option<&str>, name: &str) -> Result<bool>;

    /// Insert or update by `(tenant, name)`.
    fn set_credential(&self, credential: &Credential) -> Result<()>;

    fn list_credentials(&self, tenant_id: Option<&str>) -> Result<Vec<Credential>>;

    fn delete_credential(&self, tenant_id: Option<&str>, name: &str) -> Result<bool>;
}

/// A row in the structured entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRow {
    pub entity: String,
    pub id: Id,
    pub data: Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Trait for the structured entity store used by record blocks.
pub trait EntityStorage: Send + Sync {
    fn create_row(&self, entity: &str, data: Value) -> Result<EntityRow>;

    fn get_row(&self, entity: &str, id: &str) -> Result<Option<EntityRow>>;

    /// Shallow-merge `data` into the row's object. Returns `None` when
    /// the row does not exist.
    fn update_row(&self, entity: &str, id: &str, data: Value) -> Result<Option<EntityRow>>;

    fn delete_row(&self, entity: &str, id: &str) -> Result<bool>;
}

/// Shallow merge used by `update_row`: object fields overwrite, any
/// non-object patch replaces the value.
pub(crate) fn merge_data(current: &mut Value, patch: Value) {
    match (current, patch) {
        (Value::Object(current), Value::Object(patch)) => {
            for (key, value) in patch {
                current.insert(key, value);
            }
        }
        (current, patch) => *current = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_data_overwrites_fields() {
        let mut current = json!({"a": 1, "b": {"x": 1}});
        merge_data(&mut current, json!({"b": {"y": 2}, "c": 3}));
        assert_eq!(current, json!({"a": 1, "b": {"y": 2}, "c": 3}));
    }

    #[test]
    fn test_merge_data_replaces_non_objects() {
        let mut current = json!([1, 2]);
        merge_data(&mut current, json!({"a": 1}));
        assert_eq!(current, json!({"a": 1}));
    }
}
