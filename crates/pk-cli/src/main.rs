//! portkeep CLI
//!
//! Keeps a declared set of socat TCP forwards running:
//! - `run` performs one reconciliation pass (intended for cron)
//! - `init` collects rules interactively
//! - `status`, `setup` and `config` manage the host and configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pk_core::config::{self, SupervisorConfig};
use portkeep::commands;

#[derive(Parser)]
#[command(name = "portkeep")]
#[command(author, version, about = "Keeps a declared set of socat TCP forwards running")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "PORTKEEP_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass (default)
    Run,

    /// Enter forwarding rules interactively
    Init {
        /// Add to the existing rules instead of replacing them
        #[arg(short, long)]
        append: bool,
        /// Save the rules without starting them
        #[arg(long)]
        no_run: bool,
    },

    /// Show each rule and whether its forwarder is running
    Status,

    /// Install the forwarder and register daily log truncation (root only)
    Setup {
        /// Don't install the forwarding executable
        #[arg(long)]
        skip_install: bool,
        /// Don't register the cron job
        #[arg(long)]
        skip_cron: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Show config file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.as_deref();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::run_command(&load_config(config_path)?).await,
        Commands::Init { append, no_run } => {
            commands::init_command(&load_config(config_path)?, append, no_run).await
        }
        Commands::Status => commands::status_command(&load_config(config_path)?),
        Commands::Setup {
            skip_install,
            skip_cron,
        } => commands::setup_command(&load_config(config_path)?, skip_install, skip_cron),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Path => {
                commands::config_path(config_path);
                Ok(())
            }
            ConfigAction::Init { force } => commands::config_init(config_path, force),
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<SupervisorConfig> {
    let config = config::resolve_config(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {:?}", path),
        None => "Failed to load configuration".to_string(),
    })?;
    tracing::debug!("Using rule store {:?}", config.store_path);
    Ok(config)
}
