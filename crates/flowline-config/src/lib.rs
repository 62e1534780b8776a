//! Configuration system for the Flowline workflow engine.
//!
//! Provides TOML-based configuration with:
//! - Engine behaviour (`[engine]`: resolver strategy, resume replay, step limit)
//! - Storage and secrets locations (`[store]`, `[secrets]`)
//! - Collaborator endpoints (`[http]`, `[ai]`, `[mail]`)
//! - Config file layering (user config dir + project-local overrides)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config_file, load_config_with_options, save_config,
    user_config_dir,
};
pub use error::{ConfigError, Result};
pub use types::*;
