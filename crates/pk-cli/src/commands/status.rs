//! Status command implementation

use anyhow::{Context, Result};

use pk_core::{Reconciler, SupervisorConfig, SystemProcessTable};

use crate::output::{format_rules, print_info};

/// Execute the status command
///
/// Probes every stored rule without launching anything.
pub fn status_command(config: &SupervisorConfig) -> Result<()> {
    let reconciler = Reconciler::new(config, SystemProcessTable);
    let rules = reconciler
        .store()
        .load()
        .context("Failed to load forwarding rules")?;

    let rows: Vec<_> = rules
        .into_iter()
        .map(|rule| {
            let running = reconciler.prober().is_running(&rule);
            (rule, running)
        })
        .collect();

    println!("{}", format_rules(&rows));
    if rows.is_empty() {
        print_info("Run 'portkeep init' to add rules");
    }

    Ok(())
}
