//! Workflow definition CRUD.

use flowline_types::{Workflow, now};
use rusqlite::params;
use tracing::debug;

use super::{SqliteStore, format_ts};
use crate::storage::WorkflowStorage;
use crate::{Result, StoreError};

impl WorkflowStorage for SqliteStore {
    fn save_workflow(&self, workflow: &Workflow) -> Result<()> {
        let definition = serde_json::to_string(workflow)?;
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO workflows (id, tenant_id, name, status, is_global, definition, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                name = excluded.name,
                status = excluded.status,
                is_global = excluded.is_global,
                definition = excluded.definition,
                updated_at = excluded.updated_at
            "#,
            params![
                workflow.id,
                workflow.tenant_id,
                workflow.name,
                workflow.status.as_str(),
                workflow.is_global,
                definition,
                format_ts(&workflow.created_at),
                format_ts(&now()),
            ],
        )?;

        debug!(workflow_id = %workflow.id, "Saved workflow");
        Ok(())
    }

    fn get_workflow(&self, id: &str) -> Result<Workflow> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT definition FROM workflows WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;

        match rows.next()? {
            Some(row) => {
                let definition: String = row.get(0)?;
                Ok(serde_json::from_str(&definition)?)
            }
            None => Err(StoreError::NotFound(format!("Workflow {}", id))),
        }
    }

    fn list_workflows(&self, tenant_id: Option<&str>) -> Result<Vec<Workflow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT definition FROM workflows
            WHERE ?1 IS NULL OR tenant_id = ?1
            ORDER BY created_at
            "#,
        )?;
        let mut rows = stmt.query(params![tenant_id])?;

        let mut workflows = Vec::new();
        while let Some(row) = rows.next()? {
            let definition: String = row.get(0)?;
            workflows.push(serde_json::from_str(&definition)?);
        }
        Ok(workflows)
    }

    fn delete_workflow(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute("DELETE FROM workflows WHERE id = ?1", params![id])?;
        Ok(rows_affected > 0)
    }
}
