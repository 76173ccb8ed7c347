//! CLI integration tests
//!
//! Tests the portkeep CLI using assert_cmd. Every test that touches state
//! points `--config` at a temporary directory.

use std::path::PathBuf;

use assert_cmd::Command;
use pk_core::config::{save_config, SupervisorConfig};
use pk_core::{AddressFamily, Rule, RuleStore};
use predicates::prelude::*;
use tempfile::TempDir;

fn portkeep() -> Command {
    let mut cmd = Command::cargo_bin("portkeep")
        .expect("Failed to locate portkeep binary - ensure it's built before running tests");
    cmd.env_remove("PORTKEEP_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// Temporary config whose state files all live in the same directory
fn temp_config() -> (TempDir, PathBuf, SupervisorConfig) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    let config = SupervisorConfig::in_dir(dir.path());
    save_config(&path, &config).unwrap();
    (dir, path, config)
}

#[test]
fn test_cli_help() {
    portkeep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("portkeep"))
        .stdout(predicate::str::contains("socat TCP forwards"));
}

#[test]
fn test_cli_version() {
    portkeep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("portkeep"));
}

#[test]
fn test_cli_init_help() {
    portkeep()
        .args(["init", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--append"))
        .stdout(predicate::str::contains("--no-run"));
}

#[test]
fn test_cli_setup_help() {
    portkeep()
        .args(["setup", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("root"));
}

#[test]
fn test_cli_invalid_command() {
    portkeep().arg("invalid-command").assert().failure();
}

#[test]
fn test_config_path_explicit() {
    portkeep()
        .args(["--config", "/tmp/portkeep-test/config.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/portkeep-test/config.toml"));
}

#[test]
fn test_config_path_from_env() {
    portkeep()
        .env("PORTKEEP_CONFIG", "/tmp/portkeep-env/config.toml")
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/portkeep-env/config.toml"));
}

#[test]
fn test_config_init_and_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("store_path"))
        .stdout(predicate::str::contains("rules.json"));

    // Existing file is kept without --force
    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_missing_explicit_config_fails() {
    let dir = TempDir::new().unwrap();
    portkeep()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_run_with_empty_store_fails() {
    let (_dir, path, _config) = temp_config();
    portkeep()
        .arg("--config")
        .arg(&path)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No forwarding rules found"));
}

#[test]
fn test_default_command_is_run() {
    let (_dir, path, _config) = temp_config();
    portkeep()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No forwarding rules found"));
}

#[test]
fn test_run_with_malformed_store_fails() {
    let (_dir, path, config) = temp_config();
    std::fs::write(&config.store_path, "{ not json").unwrap();

    portkeep()
        .arg("--config")
        .arg(&path)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reconciliation pass aborted"));
}

#[test]
fn test_status_lists_stopped_rules() {
    let (_dir, path, config) = temp_config();
    RuleStore::new(&config.store_path)
        .save(&[Rule::new(
            41999,
            "198.51.100.99",
            443,
            AddressFamily::Ipv4,
            AddressFamily::Ipv4,
        )])
        .unwrap();

    portkeep()
        .arg("--config")
        .arg(&path)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("41999"))
        .stdout(predicate::str::contains("198.51.100.99:443"))
        .stdout(predicate::str::contains("stopped"));
}

#[test]
fn test_status_with_no_rules() {
    let (_dir, path, _config) = temp_config();
    portkeep()
        .arg("--config")
        .arg(&path)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No forwarding rules configured"));
}

#[test]
fn test_init_no_run_saves_rules() {
    let (_dir, path, config) = temp_config();

    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["init", "--no-run"])
        .write_stdin("1\n41998\n2\n2001:db8::7\n8443\nn\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved 1 rule(s)"));

    let rules = RuleStore::new(&config.store_path).load().unwrap();
    assert_eq!(
        rules,
        vec![Rule::new(
            41998,
            "2001:db8::7",
            8443,
            AddressFamily::Ipv4,
            AddressFamily::Ipv6,
        )]
    );
}

#[test]
fn test_init_append_keeps_existing_rules() {
    let (_dir, path, config) = temp_config();
    let existing = Rule::new(41997, "198.51.100.1", 80, AddressFamily::Ipv4, AddressFamily::Ipv4);
    RuleStore::new(&config.store_path)
        .save(&[existing.clone()])
        .unwrap();

    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["init", "--append", "--no-run"])
        .write_stdin("1\n41996\n1\n198.51.100.2\n81\nn\n")
        .assert()
        .success();

    let rules = RuleStore::new(&config.store_path).load().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0], existing);
    assert_eq!(rules[1].listen_port(), 41996);
}

#[test]
fn test_init_with_truncated_input_fails() {
    let (_dir, path, config) = temp_config();
    portkeep()
        .arg("--config")
        .arg(&path)
        .args(["init", "--no-run"])
        .write_stdin("1\n41995\n")
        .assert()
        .failure();

    assert!(!config.store_path.exists());
}

#[test]
fn test_invalid_confirm_settings_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[confirm]\nmultiplier = -1.0\n").unwrap();

    portkeep()
        .arg("--config")
        .arg(&path)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("multiplier"));
}
