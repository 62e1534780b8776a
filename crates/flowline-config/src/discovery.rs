//! Layered config loading.
//!
//! Two files are read, each overriding the one before it: `config.toml` in
//! the user config directory, then `flowline.toml` in the project directory.
//! Command-line flags are applied by the binary on top of the merged result.

use std::path::{Path, PathBuf};

use crate::types::APP_NAME;
use crate::{ConfigError, FlowlineConfig, Result};

const PROJECT_CONFIG_FILE: &str = "flowline.toml";
const USER_CONFIG_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "FLOWLINE_CONFIG_DIR";

/// One layer considered during loading.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub loaded: bool,
}

/// The merged config together with how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: FlowlineConfig,
    /// Lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// One entry per layer that existed but could not be read or parsed.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Merge the user layer and the project layer.
///
/// `project_dir` defaults to the working directory. `config_dir` takes
/// precedence over `FLOWLINE_CONFIG_DIR` and the platform directory.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let user_layer = config_dir
        .map(Path::to_path_buf)
        .or_else(user_config_dir)
        .map(|dir| dir.join(USER_CONFIG_FILE));
    let project_layer = project_dir
        .unwrap_or(Path::new("."))
        .join(PROJECT_CONFIG_FILE);

    let mut loaded = LoadedConfig {
        config: FlowlineConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };
    for path in user_layer.into_iter().chain([project_layer]) {
        let merged = path.is_file() && merge_layer(&mut loaded, &path);
        loaded.sources.push(ConfigSource {
            path,
            loaded: merged,
        });
    }
    Ok(loaded)
}

/// Parse one file; no discovery or merging.
pub fn load_config_file(path: &Path) -> Result<FlowlineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    FlowlineConfig::from_toml(&contents)
}

/// Write `config` as TOML, creating missing parent directories.
pub fn save_config(config: &FlowlineConfig, path: &Path) -> Result<()> {
    let write_err = |at: &Path, e| ConfigError::WriteFile {
        path: at.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_err(parent, e))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(|e| write_err(path, e))
}

/// `FLOWLINE_CONFIG_DIR` when set and non-empty, else `<platform config dir>/flowline`.
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|d| d.join(APP_NAME)),
    }
}

/// A broken layer is reported and skipped.
fn merge_layer(loaded: &mut LoadedConfig, path: &Path) -> bool {
    match load_config_file(path) {
        Ok(layer) => {
            loaded.config.merge(layer);
            true
        }
        Err(e) => {
            loaded
                .warnings
                .push(format!("Failed to load {}: {}", path.display(), e));
            false
        }
    }
}
