//! Run command implementation

use anyhow::{Context, Result};

use pk_core::{Reconciler, SupervisorConfig, SystemProcessTable};

use crate::output::{format_summary, print_error, print_info, print_report, print_warning};

/// Execute one reconciliation pass
///
/// Fails when there are no rules to reconcile or when any rule could not
/// be started.
pub async fn run_command(config: &SupervisorConfig) -> Result<()> {
    let reconciler = Reconciler::new(config, SystemProcessTable);
    let report = reconciler
        .run_pass()
        .await
        .context("Reconciliation pass aborted")?;

    if report.is_empty() {
        print_error(&format!(
            "No forwarding rules found in {:?}",
            reconciler.store().path()
        ));
        print_info("Run 'portkeep init' to add rules");
        anyhow::bail!("nothing to reconcile");
    }

    print_report(&report);
    print_info(&format_summary(&report));

    let failed = report.failures().count();
    if failed > 0 {
        print_warning(&format!(
            "Forwarder output is logged to {:?}",
            reconciler.launcher().log().path()
        ));
        anyhow::bail!("{} rule(s) failed to start", failed);
    }

    Ok(())
}
