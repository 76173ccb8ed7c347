//! Host setup: install the forwarder and register log truncation

use anyhow::{Context, Result};

use pk_core::cron::{register_log_rotation, CronTarget};
use pk_core::host::{detect_host, install_package, is_executable_installed, is_root};
use pk_core::SupervisorConfig;

use crate::output::{print_info, print_success};

/// Execute the setup command
pub fn setup_command(config: &SupervisorConfig, skip_install: bool, skip_cron: bool) -> Result<()> {
    if !is_root() {
        anyhow::bail!("setup must be run as root");
    }

    let host = detect_host()?.context(
        "Unsupported host: expected a Debian, Ubuntu, Armbian, AlmaLinux, CentOS, Oracle or Alpine system",
    )?;
    print_info(&format!(
        "Detected {} host (package manager: {})",
        host.family, host.package_manager
    ));

    if skip_install {
        tracing::debug!("Skipping forwarder installation");
    } else if is_executable_installed(&config.executable) {
        print_info(&format!("{} is already installed", config.executable));
    } else {
        let package = config.executable_name();
        print_info(&format!("Installing: {}", host.install_command_line(package)));
        install_package(&host, package)?;
        print_success(&format!("Installed {}", package));
    }

    if !skip_cron {
        let target = CronTarget::for_family(host.family);
        if register_log_rotation(&target, &config.log_path)? {
            print_success(&format!(
                "Registered daily truncation of {:?} in {:?}",
                config.log_path, target.path
            ));
        } else {
            print_info(&format!("Log truncation already registered in {:?}", target.path));
        }
    }

    Ok(())
}
