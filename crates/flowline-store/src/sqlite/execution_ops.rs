//! Run and step persistence.

use flowline_types::{Run, Step};
use rusqlite::{Row, params};
use serde_json::Value;

use super::{SqliteStore, format_ts, parse_ts};
use crate::storage::ExecutionStorage;
use crate::{Result, StoreError};

const RUN_COLUMNS: &str = "id, workflow_id, tenant_id, trigger_type, status, input, output, \
     duration_ms, error, waiting_block_id, created_at, updated_at";

const STEP_COLUMNS: &str = "id, run_id, block_id, from_block_id, status, input, output, error, \
     started_at, finished_at, duration_ms";

impl ExecutionStorage for SqliteStore {
    fn create_run(&self, run: &Run) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO runs ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                RUN_COLUMNS
            ),
            params![
                run.id,
                run.workflow_id,
                run.tenant_id,
                run.trigger_type.as_str(),
                run.status.as_str(),
                serde_json::to_string(&run.input)?,
                serde_json::to_string(&run.output)?,
                run.duration_ms as i64,
                run.error,
                run.waiting_block_id,
                format_ts(&run.created_at),
                format_ts(&run.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update_run(&self, run: &Run) -> Result<()> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            r#"
            UPDATE runs SET
                status = ?2, input = ?3, output = ?4, duration_ms = ?5,
                error = ?6, waiting_block_id = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                run.id,
                run.status.as_str(),
                serde_json::to_string(&run.input)?,
                serde_json::to_string(&run.output)?,
                run.duration_ms as i64,
                run.error,
                run.waiting_block_id,
                format_ts(&run.updated_at),
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(format!("Run {}", run.id)));
        }
        Ok(())
    }

    fn get_run(&self, id: &str) -> Result<Run> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS))?;
        let mut rows = stmt.query(params![id])?;

        match rows.next()? {
            Some(row) => row_to_run(row),
            None => Err(StoreError::NotFound(format!("Run {}", id))),
        }
    }

    fn list_runs(&self, workflow_id: Option<&str>, limit: usize) -> Result<Vec<Run>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM runs
            WHERE ?1 IS NULL OR workflow_id = ?1
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
            RUN_COLUMNS
        ))?;
        let mut rows = stmt.query(params![workflow_id, limit as i64])?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next()? {
            runs.push(row_to_run(row)?);
        }
        Ok(runs)
    }

    fn create_step(&self, step: &Step) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO steps ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                STEP_COLUMNS
            ),
            params![
                step.id,
                step.run_id,
                step.block_id,
                step.from_block_id,
                step.status.as_str(),
                serde_json::to_string(&step.input)?,
                serde_json::to_string(&step.output)?,
                step.error,
                format_ts(&step.started_at),
                step.finished_at.as_ref().map(format_ts),
                step.duration_ms as i64,
            ],
        )?;
        Ok(())
    }

    fn update_step(&self, step: &Step) -> Result<()> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            r#"
            UPDATE steps SET
                status = ?2, output = ?3, error = ?4, finished_at = ?5, duration_ms = ?6
            WHERE id = ?1
            "#,
            params![
                step.id,
                step.status.as_str(),
                serde_json::to_string(&step.output)?,
                step.error,
                step.finished_at.as_ref().map(format_ts),
                step.duration_ms as i64,
            ],
        )?;

        if rows_affected == 0 {
            return Err(StoreError::NotFound(format!("Step {}", step.id)));
        }
        Ok(())
    }

    fn list_steps(&self, run_id: &str) -> Result<Vec<Step>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM steps WHERE run_id = ?1 ORDER BY seq",
            STEP_COLUMNS
        ))?;
        let mut rows = stmt.query(params![run_id])?;

        let mut steps = Vec::new();
        while let Some(row) = rows.next()? {
            steps.push(row_to_step(row)?);
        }
        Ok(steps)
    }
}

fn json_column(row: &Row<'_>, idx: usize) -> Result<Value> {
    let text: String = row.get(idx)?;
    Ok(serde_json::from_str(&text)?)
}

fn enum_column<T>(row: &Row<'_>, idx: usize) -> Result<T>
where
    T: std::str::FromStr<Err = flowline_types::UnknownVariant>,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e: flowline_types::UnknownVariant| StoreError::InvalidData(e.to_string()))
}

fn row_to_run(row: &Row<'_>) -> Result<Run> {
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;
    let duration_ms: i64 = row.get(7)?;

    Ok(Run {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        tenant_id: row.get(2)?,
        trigger_type: enum_column(row, 3)?,
        status: enum_column(row, 4)?,
        input: json_column(row, 5)?,
        output: json_column(row, 6)?,
        duration_ms: duration_ms.max(0) as u64,
        error: row.get(8)?,
        waiting_block_id: row.get(9)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn row_to_step(row: &Row<'_>) -> Result<Step> {
    let started_at: String = row.get(8)?;
    let finished_at: Option<String> = row.get(9)?;
    let duration_ms: i64 = row.get(10)?;

    Ok(Step {
        id: row.get(0)?,
        run_id: row.get(1)?,
        block_id: row.get(2)?,
        from_block_id: row.get(3)?,
        status: enum_column(row, 4)?,
        input: json_column(row, 5)?,
        output: json_column(row, 6)?,
        error: row.get(7)?,
        started_at: parse_ts(&started_at)?,
        finished_at: finished_at.as_deref().map(parse_ts).transpose()?,
        duration_ms: duration_ms.max(0) as u64,
    })
}
