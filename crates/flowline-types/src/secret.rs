//! Tenant-scoped variables and credentials.

use serde::{Deserialize, Serialize};

use crate::{Id, Timestamp, new_id, now};

/// A plain named value, exposed to blocks as `$vars.<name>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: Id,
    /// Owning tenant; `None` for a global variable.
    pub tenant_id: Option<Id>,
    pub name: String,
    pub value: String,
    pub updated_at: Timestamp,
}

impl Variable {
    pub fn new(tenant_id: Option<Id>, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            tenant_id,
            name: name.into(),
            value: value.into(),
            updated_at: now(),
        }
    }
}

/// A secret value, stored encrypted and exposed to blocks as
/// `$credentials.<name>` after decryption.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: Id,
    pub tenant_id: Option<Id>,
    pub name: String,
    /// Armored ciphertext.
    pub encrypted_value: String,
    pub updated_at: Timestamp,
}

impl Credential {
    pub fn new(
        tenant_id: Option<Id>,
        name: impl Into<String>,
        encrypted_value: impl Into<String>,
    ) -> Self {
        Self {
            id: new_id(),
            tenant_id,
            name: name.into(),
            encrypted_value: encrypted_value.into(),
            updated_at: now(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("name", &self.name)
            .field("encrypted_value", &"[REDACTED]")
            .finish()
    }
}
