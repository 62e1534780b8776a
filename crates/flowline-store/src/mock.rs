//! In-memory implementation of every storage trait, for tests.

use std::collections::HashMap;

use flowline_types::{Credential, Run, Step, Variable, Workflow, new_id, now};
use parking_lot::Mutex;
use serde_json::Value;

use crate::storage::{
    EntityRow, EntityStorage, ExecutionStorage, SecretStorage, WorkflowStorage, merge_data,
};
use crate::{Result, StoreError};

/// Mock storage holding everything in hash maps.
#[derive(Debug, Default)]
pub struct MockStorage {
    workflows: Mutex<HashMap<String, Workflow>>,
    runs: Mutex<HashMap<String, Run>>,
    /// Insertion order is start order.
    steps: Mutex<Vec<Step>>,
    variables: Mutex<Vec<Variable>>,
    credentials: Mutex<Vec<Credential>>,
    rows: Mutex<HashMap<(String, String), EntityRow>>,
}

impl MockStorage {
    /// Create a new empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of step records across all runs.
    pub fn step_count(&self) -> usize {
        self.steps.lock().len()
    }
}

impl WorkflowStorage for MockStorage {
    fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        self.workflows
            .lock()
            .insert(workflow.id.clone(), workflow.clone());
        Ok(())
    }

    fn get_workflow(&self, id: &str) -> Result<Workflow> {
        self.workflows
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Workflow {}", id)))
    }

    fn list_workflows(&self, tenant_id: Option<&str>) -> Result<Vec<Workflow>> {
        let map = self.workflows.lock();
        let mut results: Vec<_> = map
            .values()
            .filter(|wf| tenant_id.is_none() || wf.tenant_id.as_deref() == tenant_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(results)
    }

    fn delete_workflow(&self, id: &str) -> Result<bool> {
        Ok(self.workflows.lock().remove(id).is_some())
    }
}

impl ExecutionStorage for MockStorage {
    fn create_run(&self, run: &Run) -> Result<()> {
        self.runs.lock().insert(run.id.clone(), run.clone());
        Ok(())
    }

    fn update_run(&self, run: &Run) -> Result<()> {
        let mut map = self.runs.lock();
        match map.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Run {}", run.id))),
        }
    }

    fn get_run(&self, id: &str) -> Result<Run> {
        self.runs
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Run {}", id)))
    }

    fn list_runs(&self, workflow_id: Option<&str>, limit: usize) -> Result<Vec<Run>> {
        let map = self.runs.lock();
        let mut results: Vec<_> = map
            .values()
            .filter(|r| workflow_id.is_none() || Some(r.workflow_id.as_str()) == workflow_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(limit);
        Ok(results)
    }

    fn create_step(&self, step: &Step) -> Result<()> {
        self.steps.lock().push(step.clone());
        Ok(())
    }

    fn update_step(&self, step: &Step) -> Result<()> {
        let mut steps = self.steps.lock();
        match steps.iter_mut().find(|s| s.id == step.id) {
            Some(existing) => {
                *existing = step.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("Step {}", step.id))),
        }
    }

    fn list_steps(&self, run_id: &str) -> Result<Vec<Step>> {
        Ok(self
            .steps
            .lock()
            .iter()
            .filter(|s| s.run_id == run_id)
            .cloned()
            .collect())
    }
}

impl SecretStorage for MockStorage {
    fn set_variable(&self, variable: &Variable) -> Result<()> {
        let mut vars = self.variables.lock();
        match vars
            .iter_mut()
            .find(|v| v.tenant_id == variable.tenant_id && v.name == variable.name)
        {
            Some(existing) => {
                existing.value = variable.value.clone();
                existing.updated_at = variable.updated_at;
            }
            None => vars.push(variable.clone()),
        }
        Ok(())
    }

    fn list_variables(&self, tenant_id: Option<&str>) -> Result<Vec<Variable>> {
        Ok(self
            .variables
            .lock()
            .iter()
            .filter(|v| v.tenant_id.as_deref() == tenant_id)
            .cloned()
            .collect())
    }

    fn delete_variable(&self, tenant_id: Option<&str>, name: &str) -> Result<bool> {
        let mut vars = self.variables.lock();
        let before = vars.len();
        vars.retain(|v| !(v.tenant_id.as_deref() == tenant_id && v.name == name));
        Ok(vars.len() != before)
    }

    fn set_credential(&self, credential: &Credential) -> Result<()> {
        let mut creds = self.credentials.lock();
        match creds
            .iter_mut()
            .find(|c| c.tenant_id == credential.tenant_id && c.name == credential.name)
        {
            Some(existing) => {
                existing.encrypted_value = credential.encrypted_value.clone();
                existing.updated_at = credential.updated_at;
            }
            None => creds.push(credential.clone()),
        }
        Ok(())
    }

    fn list_credentials(&self, tenant_id: Option<&str>) -> Result<Vec<Credential>> {
        Ok(self
            .credentials
            .lock()
            .iter()
            .filter(|c| c.tenant_id.as_deref() == tenant_id)
            .cloned()
            .collect())
    }

    fn delete_credential(&self, tenant_id: Option<&str>, name: &str) -> Result<bool> {
        let mut creds = self.credentials.lock();
        let before = creds.len();
        creds.retain(|c| !(c.tenant_id.as_deref() == tenant_id && c.name == name));
        Ok(creds.len() != before)
    }
}

impl EntityStorage for MockStorage {
    fn create_row(&self, entity: &str, data: Value) -> Result<EntityRow> {
        let ts = now();
        let row = EntityRow {
            entity: entity.to_string(),
            id: new_id(),
            data,
            created_at: ts,
            updated_at: ts,
        };
        self.rows
            .lock()
            .insert((entity.to_string(), row.id.clone()), row.clone());
        Ok(row)
    }

    fn get_row(&self, entity: &str, id: &str) -> Result<Option<EntityRow>> {
        Ok(self
            .rows
            .lock()
            .get(&(entity.to_string(), id.to_string()))
            .cloned())
    }

    fn update_row(&self, entity: &str, id: &str, data: Value) -> Result<Option<EntityRow>> {
        let mut rows = self.rows.lock();
        Ok(rows
            .get_mut(&(entity.to_string(), id.to_string()))
            .map(|row| {
                merge_data(&mut row.data, data);
                row.updated_at = now();
                row.clone()
            }))
    }

    fn delete_row(&self, entity: &str, id: &str) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .remove(&(entity.to_string(), id.to_string()))
            .is_some())
    }
}
