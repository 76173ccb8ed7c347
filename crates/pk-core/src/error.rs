//! Core error types for portkeep

use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Top-level error type for a reconciliation pass
#[derive(Error, Debug)]
pub enum PkError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Rule store error
    #[error("Rule store error: {0}")]
    Store(#[from] StoreError),

    /// Launch error
    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    /// Process table error
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Rule store errors. Any of these aborts the pass.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store exists but could not be read
    #[error("Failed to read rule store {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store content is not a valid rule list
    #[error("Malformed rule store {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Store could not be written
    #[error("Failed to write rule store {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rules could not be serialized
    #[error("Failed to serialize rules: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Per-rule launch failures. Reported, never fatal to the pass.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The forwarding executable could not be spawned
    #[error("Failed to spawn {executable}: {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },

    /// The forwarder exited before it could be confirmed
    #[error("Forwarder for {target} exited early ({status})")]
    ExitedEarly {
        target: String,
        status: ExitStatus,
        log_tail: String,
    },

    /// No matching process appeared within the confirmation budget
    #[error("Forwarder for {target} did not come up after {attempts} checks")]
    NotConfirmed {
        target: String,
        attempts: u32,
        log_tail: String,
    },
}

impl LaunchError {
    /// Tail of the shared log captured when the launch failed, if any
    pub fn log_tail(&self) -> Option<&str> {
        match self {
            LaunchError::Spawn { .. } => None,
            LaunchError::ExitedEarly { log_tail, .. } | LaunchError::NotConfirmed { log_tail, .. } => {
                Some(log_tail.as_str())
            }
        }
    }
}

/// Process table errors
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The process listing facility is not available
    #[error("Process table unavailable: {0}")]
    Unavailable(String),

    /// The match pattern failed to compile
    #[error("Invalid match pattern: {0}")]
    Pattern(#[from] regex::Error),
}
