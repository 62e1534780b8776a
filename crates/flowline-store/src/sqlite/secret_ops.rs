//! Variable and credential storage.

use flowline_types::{Credential, Variable};
use rusqlite::params;

use super::{SqliteStore, format_ts, parse_ts, scope_from_key, scope_key};
use crate::Result;
use crate::storage::SecretStorage;

impl SecretStorage for SqliteStore {
    fn set_variable(&self, variable: &Variable) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO variables (id, tenant_id, name, value, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(tenant_id, name) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![
                variable.id,
                scope_key(variable.tenant_id.as_deref()),
                variable.name,
                variable.value,
                format_ts(&variable.updated_at),
            ],
        )?;
        Ok(())
    }

    fn list_variables(&self, tenant_id: Option<&str>) -> Result<Vec<Variable>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, name, value, updated_at FROM variables \
             WHERE tenant_id = ?1 ORDER BY name",
        )?;
        let mut rows = stmt.query(params![scope_key(tenant_id)])?;

        let mut variables = Vec::new();
        while let Some(row) = rows.next()? {
            let updated_at: String = row.get(4)?;
            variables.push(Variable {
                id: row.get(0)?,
                tenant_id: scope_from_key(row.get(1)?),
                name: row.get(2)?,
                value: row.get(3)?,
                updated_at: parse_ts(&updated_at)?,
            });
        }
        Ok(variables)
    }

    fn delete_variable(&self, tenant_id: Option<&str>, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "DELETE FROM variables WHERE tenant_id = ?1 AND name = ?2",
            params![scope_key(tenant_id), name],
        )?;
        Ok(rows_affected > 0)
    }

    fn set_credential(&self, credential: &Credential) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO credentials (id, tenant_id, name, encrypted_value, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(tenant_id, name) DO UPDATE SET
                encrypted_value = excluded.encrypted_value,
                updated_at = excluded.updated_at
            "#,
            params![
                credential.id,
                scope_key(credential.tenant_id.as_deref()),
                credential.name,
                credential.encrypted_value,
                format_ts(&credential.updated_at),
            ],
        )?;
        Ok(())
    }

    fn list_credentials(&self, tenant_id: Option<&str>) -> Result<Vec<Credential>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, tenant_id, name, encrypted_value, updated_at FROM credentials \
             WHERE tenant_id = ?1 ORDER BY name",
        )?;
        let mut rows = stmt.query(params![scope_key(tenant_id)])?;

        let mut credentials = Vec::new();
        while let Some(row) = rows.next()? {
            let updated_at: String = row.get(4)?;
            credentials.push(Credential {
                id: row.get(0)?,
                tenant_id: scope_from_key(row.get(1)?),
                name: row.get(2)?,
                encrypted_value: row.get(3)?,
                updated_at: parse_ts(&updated_at)?,
            });
        }
        Ok(credentials)
    }

    fn delete_credential(&self, tenant_id: Option<&str>, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows_affected = conn.execute(
            "DELETE FROM credentials WHERE tenant_id = ?1 AND name = ?2",
            params![scope_key(tenant_id), name],
        )?;
        Ok(rows_affected > 0)
    }
}
