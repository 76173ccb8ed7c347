//! Configuration management for portkeep

pub mod serde_utils;
mod supervisor;

pub use supervisor::{ConfirmConfig, SupervisorConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("portkeep")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Resolve the supervisor configuration
///
/// An explicit path must exist and parse. Without one, the default config
/// file is used when present and defaults otherwise. The result is validated
/// either way.
pub fn resolve_config(explicit: Option<&Path>) -> Result<SupervisorConfig, ConfigError> {
    let config = match explicit {
        Some(path) => load_config(path)?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                load_config(&default_path)?
            } else {
                tracing::debug!("No config at {:?}, using defaults", default_path);
                SupervisorConfig::default()
            }
        }
    };

    config.validate()?;
    Ok(config)
}
