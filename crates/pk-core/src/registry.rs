//! PID registry for launched forwarders
//!
//! Remembers the PID spawned for each rule so a later pass can check that
//! exact process before falling back to scanning every command line.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::rule::Rule;

/// JSON file mapping rule keys to PIDs
#[derive(Debug, Clone)]
pub struct PidRegistry {
    path: PathBuf,
}

impl PidRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every recorded PID
    ///
    /// Returns an empty map if the registry doesn't exist, or an error if it
    /// is malformed.
    pub fn load(&self) -> io::Result<BTreeMap<String, u32>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }

    /// PID recorded for `rule`, if any
    pub fn lookup(&self, rule: &Rule) -> io::Result<Option<u32>> {
        Ok(self.load()?.get(&rule.key()).copied())
    }

    /// Record the PID spawned for `rule`
    pub fn record(&self, rule: &Rule, pid: u32) -> io::Result<()> {
        let mut entries = self.load().unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable PID registry {:?}: {}", self.path, e);
            BTreeMap::new()
        });
        entries.insert(rule.key(), pid);
        self.write(&entries)
    }

    /// Drop the PID recorded for `rule`
    ///
    /// Returns `Ok(())` even if nothing was recorded.
    pub fn forget(&self, rule: &Rule) -> io::Result<()> {
        let mut entries = self.load()?;
        if entries.remove(&rule.key()).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }

    /// Drop every entry that doesn't belong to one of `rules`
    ///
    /// Returns the number of entries removed. The file is only rewritten when
    /// something was removed.
    pub fn retain_rules(&self, rules: &[Rule]) -> io::Result<usize> {
        let keep: BTreeSet<String> = rules.iter().map(Rule::key).collect();
        let mut entries = self.load()?;
        let before = entries.len();
        entries.retain(|key, _| keep.contains(key));

        let removed = before - entries.len();
        if removed > 0 {
            self.write(&entries)?;
        }
        Ok(removed)
    }

    fn write(&self, entries: &BTreeMap<String, u32>) -> io::Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)
    }
}
