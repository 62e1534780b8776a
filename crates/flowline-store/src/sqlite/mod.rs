//! SQLite implementation of the storage traits.
//!
//! One connection behind a mutex serializes every access; concurrent runs
//! share it. JSON payloads (definitions, inputs, outputs, entity data) are
//! stored as TEXT columns.

mod entity_ops;
mod execution_ops;
mod secret_ops;
mod workflow_ops;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::{Result, StoreError};

// ─────────────────────────────────────────────────────────────────────────────
// Schema Version
// ─────────────────────────────────────────────────────────────────────────────

/// Current schema version.
const SCHEMA_VERSION: i32 = 1;

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Store backed by SQLite.
pub struct SqliteStore {
    pub(crate) conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directory and schema if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;

        info!("Store opened at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;

        debug!("In-memory store created");
        Ok(store)
    }

    /// Current `user_version` of the database.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self.conn.lock();
        Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::create_schema(&conn)
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        let current_version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if current_version >= SCHEMA_VERSION {
            debug!("Schema up to date (version {})", current_version);
            return Ok(());
        }

        info!(
            "Migrating schema from version {} to {}",
            current_version, SCHEMA_VERSION
        );

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                tenant_id TEXT,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                is_global INTEGER NOT NULL DEFAULT 0,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_workflows_tenant
                ON workflows(tenant_id);

            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                tenant_id TEXT,
                trigger_type TEXT NOT NULL,
                status TEXT NOT NULL,
                input TEXT NOT NULL DEFAULT 'null',
                output TEXT NOT NULL DEFAULT 'null',
                duration_ms INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                waiting_block_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_workflow
                ON runs(workflow_id, created_at);

            -- seq preserves start order for steps created in the same instant
            CREATE TABLE IF NOT EXISTS steps (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
                block_id TEXT NOT NULL,
                from_block_id TEXT,
                status TEXT NOT NULL,
                input TEXT NOT NULL DEFAULT 'null',
                output TEXT NOT NULL DEFAULT 'null',
                error TEXT,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                duration_ms INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_steps_run
                ON steps(run_id, seq);

            -- tenant_id is '' for the global scope so the unique key applies
            CREATE TABLE IF NOT EXISTS variables (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (tenant_id, name)
            );

            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL,
                encrypted_value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (tenant_id, name)
            );

            CREATE TABLE IF NOT EXISTS entity_rows (
                entity TEXT NOT NULL,
                id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (entity, id)
            );
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        info!("Schema created (version {})", SCHEMA_VERSION);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::InvalidData(format!("bad timestamp '{}': {}", s, e)))
}

/// Scope key stored in the tenant column of secret tables.
pub(crate) fn scope_key(tenant_id: Option<&str>) -> &str {
    tenant_id.unwrap_or("")
}

pub(crate) fn scope_from_key(key: String) -> Option<String> {
    if key.is_empty() { None } else { Some(key) }
}
