//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [engine]                 # traversal behaviour
//! [store]                  # SQLite database location
//! [secrets]                # age identity used to decrypt credentials
//! [http]                   # httpRequest blocks
//! [ai]                     # aiCompletion blocks
//! [mail]                   # sendEmail blocks
//! [logging]                # console + file logging
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Application name for platform directory resolution.
pub(crate) const APP_NAME: &str = "flowline";

/// Default database filename inside the data directory.
const DEFAULT_DATABASE_FILE: &str = "flowline.db";

/// Default identity filename inside the config directory.
const DEFAULT_IDENTITY_FILE: &str = "identity.txt";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowlineConfig {
    pub engine: Option<EngineSection>,
    pub store: Option<StoreSection>,
    pub secrets: Option<SecretsSection>,
    pub http: Option<HttpSection>,
    pub ai: Option<AiSection>,
    pub mail: Option<MailSection>,
    pub logging: Option<LoggingSection>,
}

impl FlowlineConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced whole, not field by field.
    pub fn merge(&mut self, other: FlowlineConfig) {
        if other.engine.is_some() {
            self.engine = other.engine;
        }
        if other.store.is_some() {
            self.store = other.store;
        }
        if other.secrets.is_some() {
            self.secrets = other.secrets;
        }
        if other.http.is_some() {
            self.http = other.http;
        }
        if other.ai.is_some() {
            self.ai = other.ai;
        }
        if other.mail.is_some() {
            self.mail = other.mail;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    pub fn engine(&self) -> EngineSection {
        self.engine.clone().unwrap_or_default()
    }

    pub fn http(&self) -> HttpSection {
        self.http.clone().unwrap_or_default()
    }

    pub fn ai(&self) -> AiSection {
        self.ai.clone().unwrap_or_default()
    }

    pub fn mail(&self) -> MailSection {
        self.mail.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingSection {
        self.logging.clone().unwrap_or_default()
    }

    /// Path of the SQLite database.
    ///
    /// Falls back to `<platform data dir>/flowline/flowline.db`.
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = self.store.as_ref().and_then(|s| s.database.clone()) {
            return Ok(path);
        }
        dirs::data_dir()
            .map(|d| d.join(APP_NAME).join(DEFAULT_DATABASE_FILE))
            .ok_or(ConfigError::NoDefaultDir("data"))
    }

    /// Path of the age identity file.
    ///
    /// Falls back to `<user config dir>/identity.txt`.
    pub fn identity_path(&self) -> Result<PathBuf> {
        crate::user_config_dir()
            .map(|d| self.identity_path_in(&d))
            .ok_or(ConfigError::NoDefaultDir("config"))
    }

    /// Path of the age identity file, defaulting into `config_dir`.
    pub fn identity_path_in(&self, config_dir: &Path) -> PathBuf {
        self.secrets
            .as_ref()
            .and_then(|s| s.identity_file.clone())
            .unwrap_or_else(|| config_dir.join(DEFAULT_IDENTITY_FILE))
    }

    /// Directory for rolling log files.
    pub fn log_dir(&self) -> Result<PathBuf> {
        crate::user_config_dir()
            .map(|d| self.log_dir_in(&d))
            .ok_or(ConfigError::NoDefaultDir("config"))
    }

    /// Directory for rolling log files, defaulting into `config_dir`.
    pub fn log_dir_in(&self, config_dir: &Path) -> PathBuf {
        self.logging
            .as_ref()
            .and_then(|l| l.directory.clone())
            .unwrap_or_else(|| config_dir.join("logs"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// How `{{...}}` placeholders in block inputs are substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// One textual pass over the serialized input.
    #[default]
    Serialized,
    /// Walk the JSON tree; a lone placeholder keeps its JSON type.
    Structural,
}

/// Engine configuration.
///
/// ```toml
/// [engine]
/// resolver = "serialized"
/// replay_outputs_on_resume = false
/// max_steps = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub resolver: ResolverKind,
    /// Merge prior successful step outputs back into the context on resume.
    pub replay_outputs_on_resume: bool,
    /// Upper bound on steps executed by one invocation; cyclic graphs hit it.
    pub max_steps: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            resolver: ResolverKind::Serialized,
            replay_outputs_on_resume: false,
            max_steps: 10_000,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store / Secrets
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Path to the SQLite database.
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSection {
    /// File holding an `AGE-SECRET-KEY-...` identity.
    pub identity_file: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound HTTP configuration for `httpRequest` blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("flowline/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Chat-completion endpoint for `aiCompletion` blocks.
///
/// Any OpenAI-compatible `/chat/completions` API works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSection {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for AiSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 120,
            max_tokens: 1024,
        }
    }
}

/// Email API endpoint for `sendEmail` blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSection {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.resend.com".to_string(),
            timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
///
/// ```toml
/// [logging]
/// level = "info"
/// file = true
/// directory = "/var/log/flowline"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Whether to write daily rolling JSON log files.
    pub file: bool,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
            directory: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
