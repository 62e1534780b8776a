//! Structured entity rows for record blocks.

use flowline_types::{new_id, now};
use rusqlite::params;
use serde_json::Value;
use tracing::debug;

use super::{SqliteStore, format_ts, parse_ts};
use crate::Result;
use crate::storage::{EntityRow, EntityStorage, merge_data};

impl SqliteStore {
    fn fetch_row(conn: &rusqlite::Connection, entity: &str, id: &str) -> Result<Option<EntityRow>> {
        let mut stmt = conn.prepare(
            "SELECT data, created_at, updated_at FROM entity_rows WHERE entity = ?1 AND id = ?2",
        )?;
        let mut rows = stmt.query(params![entity, id])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let data: String = row.get(0)?;
        let created_at: String = row.get(1)?;
        let updated_at: String = row.get(2)?;

        Ok(Some(EntityRow {
            entity: entity.to_string(),
            id: id.to_string(),
            data: serde_json::from_str(&data)?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        }))
    }
}

impl EntityStorage for SqliteStore {
    fn create_row(&self, entity: &str, data: Value) -> Result<EntityRow> {
        let ts = now();
        let row = EntityRow {
            entity: entity.to_string(),
            id: new_id(),
            data,
            created_at: ts,
            updated_at: ts,
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO entity_rows (entity, id, data, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.entity,
                row.id,
                serde_json::to_string(&row.data)?,
                format_ts(&row.created_at),
                format_ts(&row.updated_at),
            ],
        )?;

        debug!(entity, id = %row.id, "Created entity row");
        Ok(row)
    }

    fn get_row(&self, entity: &str, id: &str) -> Result<Option<EntityRow>> {
        let conn = self.conn.lock();
        Self::fetch_row(&conn, entity, id)
    }

    fn update_row(&self, entity: &str, id: &str, data: Value) -> Result<Option<EntityRow>> {
        let conn = self.conn.lock();
        let Some(mut row) = Self::fetch_row(&conn, entity, id)? else {
            return Ok(None);
        };

        merge_data(&mut row.data, data);
        row.updated_at = now();

        conn.execute(
            "UPDATE entity_rows SET data = ?3, updated_at = ?4 WHERE entity = ?1 AND id = ?2",
            params![
                entity,
                id,
                serde_json::to_string(&row.data)?,
                format_ts(&row.updated_at),
            ],
        )?;
        Ok(Some(row))
    }

    fn delete_row(&self, entity: &str, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "DELETE FROM entity_rows WHERE entity = ?1 AND id = ?2",
            params![entity, id],
        )?;
        Ok(rows_affected > 0)
    }
}
