//! Builds the `$vars` and `$credentials` objects for a run.

use flowline_store::SecretStorage;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::secrets::SecretCipher;

/// Plain variables and decrypted credentials visible to one run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SecretScope {
    pub vars: Map<String, Value>,
    pub credentials: Map<String, Value>,
}

/// Load the variables and credentials a run may see.
///
/// - global workflow with a tenant: the global set overlaid by the tenant set
/// - no tenant: the global set
/// - otherwise: the tenant set
///
/// Any credential that fails to decrypt fails the whole assembly.
pub fn assemble<S: SecretStorage + ?Sized>(
    secrets: &S,
    cipher: &dyn SecretCipher,
    tenant_id: Option<&str>,
    is_global: bool,
) -> Result<SecretScope> {
    let scopes: Vec<Option<&str>> = match tenant_id {
        Some(tenant) if is_global => vec![None, Some(tenant)],
        Some(tenant) => vec![Some(tenant)],
        None => vec![None],
    };

    let mut scope = SecretScope::default();
    for tenant in scopes {
        for variable in secrets.list_variables(tenant)? {
            scope.vars.insert(variable.name, Value::String(variable.value));
        }
        for credential in secrets.list_credentials(tenant)? {
            let plaintext = cipher.decrypt(&credential.encrypted_value)?;
            scope
                .credentials
                .insert(credential.name, Value::String(plaintext));
        }
    }

    debug!(
        tenant_id = ?tenant_id,
        is_global,
        vars = scope.vars.len(),
        credentials = scope.credentials.len(),
        "Assembled secret scope"
    );
    Ok(scope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::secrets::AgeCipher;
    use flowline_store::MockStorage;
    use flowline_types::{Credential, Variable};

    fn seeded(cipher: &AgeCipher) -> MockStorage {
        let store = MockStorage::new();
        store.set_variable(&Variable::new(None, "region", "eu")).unwrap();
        store.set_variable(&Variable::new(None, "plan", "free")).unwrap();
        store
            .set_variable(&Variable::new(Some("t1".into()), "plan", "pro"))
            .unwrap();
        store
            .set_credential(&Credential::new(
                None,
                "token",
                cipher.encrypt("global-token").unwrap(),
            ))
            .unwrap();
        store
            .set_credential(&Credential::new(
                Some("t1".into()),
                "token",
                cipher.encrypt("tenant-token").unwrap(),
            ))
            .unwrap();
        store
    }

    #[test]
    fn test_global_workflow_tenant_overlays_global() {
        let (cipher, _) = AgeCipher::generate();
        let store = seeded(&cipher);
        let scope = assemble(&store, &cipher, Some("t1"), true).unwrap();
        assert_eq!(scope.vars["region"], "eu");
        assert_eq!(scope.vars["plan"], "pro");
        assert_eq!(scope.credentials["token"], "tenant-token");
    }

    #[test]
    fn test_tenant_workflow_sees_only_tenant_set() {
        let (cipher, _) = AgeCipher::generate();
        let store = seeded(&cipher);
        let scope = assemble(&store, &cipher, Some("t1"), false).unwrap();
        assert!(scope.vars.get("region").is_none());
        assert_eq!(scope.vars["plan"], "pro");
    }

    #[test]
    fn test_no_tenant_sees_global_set() {
        let (cipher, _) = AgeCipher::generate();
        let store = seeded(&cipher);
        let scope = assemble(&store, &cipher, None, false).unwrap();
        assert_eq!(scope.vars["plan"], "free");
        assert_eq!(scope.credentials["token"], "global-token");
    }

    #[test]
    fn test_decrypt_failure_is_fatal() {
        let (cipher, _) = AgeCipher::generate();
        let (other, _) = AgeCipher::generate();
        let store = seeded(&other);
        let err = assemble(&store, &cipher, None, false).unwrap_err();
        assert!(matches!(err, EngineError::Secret(_)));
    }
}
