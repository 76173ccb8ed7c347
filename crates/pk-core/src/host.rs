//! Host detection and forwarder installation
//!
//! Identifies the Linux distribution family from `/etc/os-release` and
//! `/etc/alpine-release` and installs the forwarding executable with the
//! matching package manager.

use std::fmt;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

/// Supported distribution families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    /// Debian, Ubuntu, Armbian
    Debian,
    /// AlmaLinux, CentOS, Oracle Linux
    Rhel,
    /// Alpine Linux
    Alpine,
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Debian => write!(f, "debian"),
            OsFamily::Rhel => write!(f, "rhel"),
            OsFamily::Alpine => write!(f, "alpine"),
        }
    }
}

/// Detected host and how to install packages on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub family: OsFamily,
    pub package_manager: &'static str,
    /// Install command prefix; the package name is appended
    pub install_command: &'static [&'static str],
    /// Run before installing, e.g. refreshing package lists
    pub prepare_command: Option<&'static [&'static str]>,
}

impl HostInfo {
    pub fn for_family(family: OsFamily) -> Self {
        match family {
            OsFamily::Debian => Self {
                family,
                package_manager: "apt",
                install_command: &["apt-get", "install", "-y"],
                prepare_command: Some(&["apt-get", "update"]),
            },
            OsFamily::Rhel => Self {
                family,
                package_manager: "yum",
                install_command: &["yum", "install", "-y"],
                prepare_command: None,
            },
            OsFamily::Alpine => Self {
                family,
                package_manager: "apk",
                install_command: &["apk", "add", "--no-cache"],
                prepare_command: None,
            },
        }
    }

    /// Shell-style rendering of the install command for `package`
    pub fn install_command_line(&self, package: &str) -> String {
        let mut parts: Vec<&str> = self.install_command.to_vec();
        parts.push(package);
        parts.join(" ")
    }
}

/// Classify a host from the contents of its release files
///
/// The presence of `/etc/alpine-release` wins over anything in `os-release`.
pub fn detect_from(os_release: Option<&str>, alpine_release: bool) -> Option<HostInfo> {
    if alpine_release {
        return Some(HostInfo::for_family(OsFamily::Alpine));
    }

    let os_release = os_release?.to_lowercase();
    let family = if ["debian", "ubuntu", "armbian"]
        .iter()
        .any(|name| os_release.contains(name))
    {
        OsFamily::Debian
    } else if ["almalinux", "centos", "oracle"]
        .iter()
        .any(|name| os_release.contains(name))
    {
        OsFamily::Rhel
    } else if os_release.contains("alpine") {
        OsFamily::Alpine
    } else {
        return None;
    };

    Some(HostInfo::for_family(family))
}

/// Detect the running host
pub fn detect_host() -> Result<Option<HostInfo>> {
    let os_release = match fs::read_to_string("/etc/os-release") {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(e).context("Failed to read /etc/os-release"),
    };
    let alpine = Path::new("/etc/alpine-release").exists();

    Ok(detect_from(os_release.as_deref(), alpine))
}

/// Check if the forwarding executable can be run
pub fn is_executable_installed(executable: &str) -> bool {
    Command::new(executable)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Install `package` with the host's package manager
pub fn install_package(host: &HostInfo, package: &str) -> Result<()> {
    if let Some(prepare) = host.prepare_command {
        run(prepare).with_context(|| format!("Failed to run {}", prepare.join(" ")))?;
    }

    let mut install: Vec<&str> = host.install_command.to_vec();
    install.push(package);
    run(&install).with_context(|| format!("Failed to install {} with {}", package, host.package_manager))?;

    tracing::info!("Installed {} with {}", package, host.package_manager);
    Ok(())
}

fn run(argv: &[&str]) -> Result<()> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty command"))?;

    tracing::debug!("Running {}", argv.join(" "));
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", program))?;

    if !status.success() {
        anyhow::bail!("{} failed with status: {}", program, status);
    }
    Ok(())
}

/// Whether the current process runs with root privileges
#[cfg(unix)]
pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_debian_family() {
        let ubuntu = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n";
        let host = detect_from(Some(ubuntu), false).unwrap();
        assert_eq!(host.family, OsFamily::Debian);
        assert_eq!(host.package_manager, "apt");
        assert_eq!(host.install_command_line("socat"), "apt-get install -y socat");
    }

    #[test]
    fn test_detect_rhel_family() {
        let alma = "NAME=\"AlmaLinux\"\nID=\"almalinux\"\n";
        let host = detect_from(Some(alma), false).unwrap();
        assert_eq!(host.family, OsFamily::Rhel);
        assert_eq!(host.install_command_line("socat"), "yum install -y socat");
    }

    #[test]
    fn test_alpine_release_wins() {
        let host = detect_from(Some("ID=debian"), true).unwrap();
        assert_eq!(host.family, OsFamily::Alpine);
        assert_eq!(host.install_command_line("socat"), "apk add --no-cache socat");
    }

    #[test]
    fn test_unknown_host() {
        assert!(detect_from(Some("ID=arch\n"), false).is_none());
        assert!(detect_from(None, false).is_none());
    }

    #[test]
    fn test_missing_executable_not_installed() {
        assert!(!is_executable_installed("/nonexistent/portkeep-forwarder"));
    }
}
