//! Credential encryption.
//!
//! Credentials are stored as ASCII-armored age ciphertexts addressed to one
//! x25519 recipient. The engine holds the matching identity and decrypts
//! while assembling a run's context.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use age::secrecy::ExposeSecret;
use age::x25519;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Invalid age identity: {0}")]
    InvalidIdentity(String),

    #[error("Failed to read identity file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Encrypts credential values at rest.
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// `SecretCipher` using an age x25519 identity.
pub struct AgeCipher {
    identity: x25519::Identity,
    recipient: x25519::Recipient,
}

impl AgeCipher {
    /// Parse an identity from text in `age-keygen` format.
    ///
    /// Comment lines are skipped; the first `AGE-SECRET-KEY-` line is used.
    pub fn from_identity_str(text: &str) -> Result<Self> {
        let line = text
            .lines()
            .map(str::trim)
            .find(|l| l.starts_with("AGE-SECRET-KEY-"))
            .ok_or_else(|| SecretError::InvalidIdentity("no AGE-SECRET-KEY line".into()))?;
        let identity = x25519::Identity::from_str(line)
            .map_err(|e| SecretError::InvalidIdentity(e.to_string()))?;
        Ok(Self::from_identity(identity))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| SecretError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_identity_str(&text)
    }

    /// A fresh identity. Returns the cipher and the identity's secret text.
    pub fn generate() -> (Self, String) {
        let identity = x25519::Identity::generate();
        let secret = identity.to_string().expose_secret().to_string();
        (Self::from_identity(identity), secret)
    }

    fn from_identity(identity: x25519::Identity) -> Self {
        let recipient = identity.to_public();
        Self {
            identity,
            recipient,
        }
    }

    /// The `age1...` recipient string.
    pub fn public_key(&self) -> String {
        self.recipient.to_string()
    }
}

impl std::fmt::Debug for AgeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeCipher")
            .field("recipient", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl SecretCipher for AgeCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        age::encrypt_and_armor(&self.recipient, plaintext.as_bytes())
            .map_err(|e| SecretError::Encrypt(e.to_string()))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let bytes = age::decrypt(&self.identity, ciphertext.as_bytes())
            .map_err(|e| SecretError::Decrypt(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SecretError::Decrypt(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_then_decrypt() {
        let (cipher, _) = AgeCipher::generate();
        let armored = cipher.encrypt("sk-live-123").unwrap();
        assert!(armored.starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));
        assert_eq!(cipher.decrypt(&armored).unwrap(), "sk-live-123");
    }

    #[test]
    fn test_identity_text_roundtrip() {
        let (cipher, secret) = AgeCipher::generate();
        let text = format!("# created: now\n# public key: {}\n{}\n", cipher.public_key(), secret);
        let reloaded = AgeCipher::from_identity_str(&text).unwrap();
        assert_eq!(reloaded.public_key(), cipher.public_key());
    }

    #[test]
    fn test_wrong_identity_fails() {
        let (a, _) = AgeCipher::generate();
        let (b, _) = AgeCipher::generate();
        let armored = a.encrypt("secret").unwrap();
        assert!(matches!(b.decrypt(&armored), Err(SecretError::Decrypt(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.txt");
        let (cipher, secret) = AgeCipher::generate();
        std::fs::write(&path, secret).unwrap();
        assert_eq!(
            AgeCipher::from_file(&path).unwrap().public_key(),
            cipher.public_key()
        );
        assert!(matches!(
            AgeCipher::from_file(&dir.path().join("missing")),
            Err(SecretError::Io { .. })
        ));
    }

    #[test]
    fn test_rejects_garbage_identity() {
        assert!(AgeCipher::from_identity_str("not a key").is_err());
    }
}
