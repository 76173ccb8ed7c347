//! Persisted rule list
//!
//! The store is a JSON array of rules. It is only ever replaced as a whole.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::rule::Rule;

/// JSON-backed rule store
#[derive(Debug, Clone)]
pub struct RuleStore {
    path: PathBuf,
}

impl RuleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ordered rule list
    ///
    /// Returns an empty list if the store does not exist yet.
    pub fn load(&self) -> Result<Vec<Rule>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the stored list with `rules`
    ///
    /// Writes a sibling temp file and renames it over the store.
    pub fn save(&self, rules: &[Rule]) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(rules).map_err(StoreError::Serialize)?;
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content + "\n").map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        tracing::debug!("Saved {} rule(s) to {:?}", rules.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::AddressFamily;
    use tempfile::TempDir;

    fn sample_rules() -> Vec<Rule> {
        vec![
            Rule::new(9000, "203.0.113.5", 443, AddressFamily::Ipv4, AddressFamily::Ipv4),
            Rule::new(9001, "2001:db8::1", 8080, AddressFamily::Ipv6, AddressFamily::Ipv6),
        ]
    }

    #[test]
    fn test_load_missing_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = RuleStore::new(dir.path().join("rules.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = RuleStore::new(dir.path().join("state").join("rules.json"));

        store.save(&sample_rules()).unwrap();
        assert_eq!(store.load().unwrap(), sample_rules());
        assert!(!dir.path().join("state").join("rules.json.tmp").exists());
    }

    #[test]
    fn test_save_replaces_whole_list() {
        let dir = TempDir::new().unwrap();
        let store = RuleStore::new(dir.path().join("rules.json"));

        store.save(&sample_rules()).unwrap();
        store.save(&sample_rules()[1..]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].listen_port(), 9001);
    }

    #[test]
    fn test_load_original_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("socat.json");
        fs::write(
            &path,
            r#"[
    {
        "listen": "9000",
        "target": "203.0.113.5:443",
        "local_type": "TCP4",
        "remote_type": "TCP4"
    }
]"#,
        )
        .unwrap();

        let rules = RuleStore::new(&path).load().unwrap();
        assert_eq!(rules, sample_rules()[..1].to_vec());
    }

    #[test]
    fn test_malformed_store_fails_whole_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[{"listen": "9000", "target": "203.0.113.5:443", "local_type": "TCP4", "remote_type": "TCP4"},
                {"listen": "9001", "target": "nowhere", "local_type": "TCP4", "remote_type": "TCP4"}]"#,
        )
        .unwrap();

        let err = RuleStore::new(&path).load().unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }

    #[test]
    fn test_unreadable_store_is_read_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be cannot be read as a string
        let err = RuleStore::new(dir.path()).load().unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }
}
