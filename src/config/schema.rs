use crate::error::{FetchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct HubConfig {
    #[serde(default = "default_revision")]
    pub revision: String,
    pub endpoint: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    #[serde(default = "default_true")]
    pub progress: bool,
}

// Default value functions
fn default_revision() -> String {
    "main".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            revision: default_revision(),
            endpoint: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            progress: default_true(),
        }
    }
}

impl Config {
    /// Load config from the user config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load config from an explicit path, or defaults if the file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| FetchError::Config(format!("Failed to read {}: {e}", path.display())))?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            FetchError::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Location of the config file: `$XDG_CONFIG_HOME/hf-fetch/config.toml`
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(xdg) if !xdg.is_empty() => PathBuf::from(xdg),
        _ => dirs::config_dir()?,
    };
    Some(base.join("hf-fetch").join("config.toml"))
}
