//! Live-state prober
//!
//! Decides whether a rule is satisfied by looking for a live forwarder whose
//! command line matches the rule. The recorded PID for the rule is checked
//! first; the full process table is scanned only if that PID is gone or now
//! belongs to something else.

use std::ffi::OsStr;

use regex::Regex;
use sysinfo::{ProcessRefreshKind, RefreshKind, System, UpdateKind};

use crate::error::ProbeError;
use crate::registry::PidRegistry;
use crate::rule::Rule;

/// One row of a process table snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    /// Arguments joined with single spaces
    pub command_line: String,
}

impl ProcessEntry {
    pub fn new(pid: u32, command_line: impl Into<String>) -> Self {
        Self {
            pid,
            command_line: command_line.into(),
        }
    }
}

/// Source of live process state
pub trait ProcessTable {
    /// Fresh snapshot of every process with a non-empty command line
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, ProbeError>;
}

/// Process table read from the operating system via `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessTable;

impl ProcessTable for SystemProcessTable {
    fn snapshot(&self) -> Result<Vec<ProcessEntry>, ProbeError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeError::Unavailable(format!(
                "process listing is not supported on {}",
                std::env::consts::OS
            )));
        }

        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_processes(ProcessRefreshKind::new().with_cmd(UpdateKind::Always)),
        );

        let entries = system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let args: Vec<_> = process
                    .cmd()
                    .iter()
                    .map(|arg| OsStr::new(arg).to_string_lossy())
                    .collect();
                ProcessEntry::new(pid.as_u32(), args.join(" "))
            })
            .filter(|entry| !entry.command_line.is_empty())
            .collect();

        Ok(entries)
    }
}

/// Answers "is this rule already forwarded?"
#[derive(Debug)]
pub struct Prober<T> {
    table: T,
    executable_name: String,
    registry: PidRegistry,
}

impl<T: ProcessTable> Prober<T> {
    pub fn new(table: T, executable_name: impl Into<String>, registry: PidRegistry) -> Self {
        Self {
            table,
            executable_name: executable_name.into(),
            registry,
        }
    }

    /// Whether a forwarder for `rule` is running
    ///
    /// If the process table cannot be read the rule is reported as not
    /// running, so the caller re-launches rather than skipping a dead forward.
    pub fn is_running(&self, rule: &Rule) -> bool {
        match self.probe(rule) {
            Ok(running) => running,
            Err(e) => {
                tracing::warn!("{}; treating {} as not running", e, rule);
                false
            }
        }
    }

    /// Like [`Prober::is_running`], but surfaces process table failures
    ///
    /// Keeps the registry in step with what it finds: a stale PID is dropped
    /// and a forwarder found by scanning has its PID recorded.
    pub fn probe(&self, rule: &Rule) -> Result<bool, ProbeError> {
        let pattern = Regex::new(&rule.match_pattern(&self.executable_name))?;
        let snapshot = self.table.snapshot()?;

        let recorded = self.registry.lookup(rule).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable PID registry {:?}: {}", self.registry.path(), e);
            None
        });

        if let Some(pid) = recorded {
            if snapshot
                .iter()
                .any(|p| p.pid == pid && pattern.is_match(&p.command_line))
            {
                tracing::debug!("{} satisfied by recorded PID {}", rule, pid);
                return Ok(true);
            }
            tracing::debug!("Recorded PID {} for {} is gone, scanning", pid, rule);
        }

        match snapshot.iter().find(|p| pattern.is_match(&p.command_line)) {
            Some(found) => {
                tracing::debug!("{} satisfied by PID {}", rule, found.pid);
                if recorded != Some(found.pid) {
                    self.remember(rule, found.pid);
                }
                Ok(true)
            }
            None => {
                if recorded.is_some() {
                    self.forget(rule);
                }
                Ok(false)
            }
        }
    }

    /// Record the PID of a forwarder for `rule`
    pub fn remember(&self, rule: &Rule, pid: u32) {
        if let Err(e) = self.registry.record(rule, pid) {
            tracing::warn!("Failed to record PID {} for {}: {}", pid, rule, e);
        }
    }

    /// Drop recorded PIDs for rules that are no longer declared
    pub fn retain_rules(&self, rules: &[Rule]) {
        match self.registry.retain_rules(rules) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Dropped {} PID(s) for removed rules", n),
            Err(e) => tracing::warn!("Failed to prune PID registry {:?}: {}", self.registry.path(), e),
        }
    }

    fn forget(&self, rule: &Rule) {
        if let Err(e) = self.registry.forget(rule) {
            tracing::warn!("Failed to drop stale PID for {}: {}", rule, e);
        }
    }
}
