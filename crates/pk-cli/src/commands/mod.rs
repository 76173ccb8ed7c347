//! CLI command implementations

mod config;
mod init;
mod run;
mod setup;
mod status;

pub use config::{config_init, config_path, config_show};
pub use init::{collect_rules, init_command};
pub use run::run_command;
pub use setup::setup_command;
pub use status::status_command;
