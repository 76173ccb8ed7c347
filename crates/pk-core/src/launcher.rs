//! Forward launcher
//!
//! Starts one forwarding process for a rule, detached from the supervisor,
//! and confirms it came up by re-probing on an exponential backoff.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::backoff::ExponentialBackoff;
use crate::config::{ConfirmConfig, SupervisorConfig};
use crate::error::LaunchError;
use crate::logfile::LogFile;
use crate::probe::{ProcessTable, Prober};
use crate::rule::Rule;

/// Arguments passed to the forwarding executable for `rule`
///
/// `-T <secs> <FAM>-LISTEN:<port>,reuseaddr,fork <FAM>:<host:port>`
pub fn forward_args(rule: &Rule, idle_timeout: Duration) -> Vec<String> {
    vec![
        "-T".to_string(),
        idle_timeout.as_secs().to_string(),
        format!(
            "{}:{},reuseaddr,fork",
            rule.local_family().listen_directive(),
            rule.listen_port()
        ),
        format!("{}:{}", rule.remote_family().connect_prefix(), rule.target()),
    ]
}

/// Starts forwarders and confirms they are live
#[derive(Debug, Clone)]
pub struct Launcher {
    executable: String,
    idle_timeout: Duration,
    log: LogFile,
    log_retention: Duration,
    log_tail_lines: usize,
    confirm: ConfirmConfig,
}

impl Launcher {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            executable: config.executable.clone(),
            idle_timeout: config.idle_timeout,
            log: LogFile::new(&config.log_path),
            log_retention: config.log_retention,
            log_tail_lines: config.log_tail_lines,
            confirm: config.confirm.clone(),
        }
    }

    pub fn log(&self) -> &LogFile {
        &self.log
    }

    /// Launch a forwarder for `rule` and wait until `prober` sees it
    ///
    /// Returns the PID of the spawned process. The process is left running
    /// whatever the outcome; a forwarder that comes up late is picked up by
    /// the next pass.
    pub async fn start<T: ProcessTable>(
        &self,
        rule: &Rule,
        prober: &Prober<T>,
    ) -> Result<u32, LaunchError> {
        match self.log.rotate_if_stale(self.log_retention) {
            Ok(true) => tracing::debug!("Rotated {:?} before launching {}", self.log.path(), rule),
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to rotate {:?}: {}", self.log.path(), e),
        }

        let mut child = self.spawn(rule)?;
        let pid = child.id().ok_or_else(|| LaunchError::Spawn {
            executable: self.executable.clone(),
            source: io::Error::other("spawned process has no PID"),
        })?;
        tracing::debug!("Spawned {} for {} (pid {})", self.executable, rule, pid);

        let attempts = self.confirm.attempts.max(1);
        let mut backoff = ExponentialBackoff::from_config(&self.confirm);

        for attempt in 1..=attempts {
            tokio::time::sleep(backoff.next_delay()).await;

            match child.try_wait() {
                Ok(Some(status)) => {
                    return Err(LaunchError::ExitedEarly {
                        target: rule.to_string(),
                        status,
                        log_tail: self.log_tail(),
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::debug!("Could not poll pid {}: {}", pid, e),
            }

            if prober.is_running(rule) {
                prober.remember(rule, pid);
                tracing::info!("Forwarder {} is up (pid {})", rule, pid);
                return Ok(pid);
            }

            tracing::debug!("{} not up yet (check {}/{})", rule, attempt, attempts);
        }

        Err(LaunchError::NotConfirmed {
            target: rule.to_string(),
            attempts,
            log_tail: self.log_tail(),
        })
    }

    fn spawn(&self, rule: &Rule) -> Result<Child, LaunchError> {
        let spawn_err = |source: io::Error| LaunchError::Spawn {
            executable: self.executable.clone(),
            source,
        };

        let stdout = self.log.open_for_append().map_err(spawn_err)?;
        let stderr = stdout.try_clone().map_err(spawn_err)?;

        let mut command = std::process::Command::new(&self.executable);
        command
            .args(forward_args(rule, self.idle_timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // Own process group, so terminal signals aimed at the supervisor
        // don't reach the forwarder
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        Command::from(command).spawn().map_err(spawn_err)
    }

    fn log_tail(&self) -> String {
        self.log
            .tail(self.log_tail_lines)
            .unwrap_or_else(|e| format!("<failed to read {:?}: {}>", self.log.path(), e))
    }
}
