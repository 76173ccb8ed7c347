//! Supervisor configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};
use crate::error::ConfigError;

/// Configuration for a reconciliation pass
///
/// Every path the supervisor touches is named here and injected at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// JSON file holding the ordered rule list
    pub store_path: PathBuf,

    /// Log file shared by every forwarding process
    pub log_path: PathBuf,

    /// JSON file mapping rule keys to the PIDs spawned for them
    pub registry_path: PathBuf,

    /// Forwarding executable (name on PATH or absolute path)
    pub executable: String,

    /// Idle timeout handed to the forwarder (`-T`)
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,

    /// Age after which the shared log is truncated before a launch
    #[serde(with = "duration_secs")]
    pub log_retention: Duration,

    /// Number of log lines surfaced when a launch fails
    pub log_tail_lines: usize,

    /// Launch confirmation polling
    pub confirm: ConfirmConfig,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::in_dir(&super::default_config_dir())
    }
}

impl SupervisorConfig {
    /// Default configuration with all state files placed in `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            store_path: dir.join("rules.json"),
            log_path: dir.join("forward.log"),
            registry_path: dir.join("forwards.pid.json"),
            executable: "socat".to_string(),
            idle_timeout: Duration::from_secs(30),
            log_retention: Duration::from_secs(24 * 60 * 60),
            log_tail_lines: 20,
            confirm: ConfirmConfig::default(),
        }
    }

    /// File name of the forwarding executable, used to recognise its processes
    pub fn executable_name(&self) -> &str {
        Path::new(&self.executable)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.executable)
    }

    /// Reject values that would make a pass misbehave at runtime
    pub fn validate(&self) -> Result<(), ConfigError> {
        let confirm = &self.confirm;
        if !confirm.multiplier.is_finite() || confirm.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "confirm.multiplier must be a finite number of at least 1.0, got {}",
                confirm.multiplier
            )));
        }
        if !confirm.jitter.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "confirm.jitter must be a finite number, got {}",
                confirm.jitter
            )));
        }
        if self.executable.trim().is_empty() {
            return Err(ConfigError::Invalid("executable must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Exponential backoff used to confirm that a launched forwarder came up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmConfig {
    /// Delay before the first check
    #[serde(rename = "initial_ms", with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay between checks
    #[serde(rename = "max_ms", with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,

    /// Number of checks before giving up
    pub attempts: u32,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_millis(1000),
            multiplier: 2.0,
            jitter: 0.1,
            attempts: 6,
        }
    }
}
