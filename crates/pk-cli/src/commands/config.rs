//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::{print_error, print_info, print_success, print_warning};
use pk_core::config::{self, SupervisorConfig};

fn config_file(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Print the configuration file path
pub fn config_path(config_path: Option<&Path>) {
    println!("{}", config_file(config_path).display());
}

/// Show current configuration
///
/// Falls back to printing the effective defaults when no file exists.
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = config_file(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'portkeep config init' to create one. Effective defaults:");
        println!();
        println!("{}", toml::to_string_pretty(&SupervisorConfig::default())?);
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    println!("{}", content);

    Ok(())
}

/// Initialize default configuration
///
/// State files are placed next to the configuration file.
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = config_file(config_path);
    let config_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_dir);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        anyhow::bail!("refusing to overwrite {:?}", path);
    }

    let config_dir = if config_dir.as_os_str().is_empty() {
        std::env::current_dir().context("Failed to resolve current directory")?
    } else {
        config_dir
    };

    config::save_config(&path, &SupervisorConfig::in_dir(&config_dir))
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    Ok(())
}
