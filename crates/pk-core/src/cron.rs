//! Daily log truncation via the host's cron
//!
//! Launches only truncate a stale log; the cron job empties it every midnight
//! regardless of launch activity.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

use crate::host::OsFamily;

/// Drop-in file used on Debian and RHEL hosts
pub const CRON_D_FILE: &str = "/etc/cron.d/portkeep_log_rotation";

/// Root crontab used on Alpine hosts
pub const ALPINE_CRONTAB: &str = "/etc/crontabs/root";

/// Where and how to register the truncation job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronTarget {
    /// File receiving the job line
    pub path: PathBuf,
    /// Replace the whole file instead of appending
    pub exclusive: bool,
    /// Whether job lines carry a user field
    pub with_user: bool,
    /// Permissions applied to the file
    pub mode: u32,
    /// Service restart needed for the change to take effect
    pub reload_command: Option<&'static [&'static str]>,
}

impl CronTarget {
    pub fn for_family(family: OsFamily) -> Self {
        match family {
            OsFamily::Debian | OsFamily::Rhel => Self {
                path: PathBuf::from(CRON_D_FILE),
                exclusive: true,
                with_user: true,
                mode: 0o644,
                reload_command: None,
            },
            OsFamily::Alpine => Self {
                path: PathBuf::from(ALPINE_CRONTAB),
                exclusive: false,
                with_user: false,
                mode: 0o600,
                reload_command: Some(&["rc-service", "crond", "restart"]),
            },
        }
    }

    /// Job line truncating `log_path` at midnight
    pub fn job_line(&self, log_path: &Path) -> String {
        let user = if self.with_user { "root " } else { "" };
        format!(
            "0 0 * * * {}truncate -s 0 {}",
            user,
            cron_quote(&log_path.display().to_string())
        )
    }
}

/// Quote `word` for the shell cron hands the command to
///
/// Plain paths are left as they are. Cron turns a bare `%` into a newline, so
/// it is escaped even inside quotes.
fn cron_quote(word: &str) -> String {
    let plain = |c: char| c.is_ascii_alphanumeric() || "/._-+:@,".contains(c);
    let quoted = if !word.is_empty() && word.chars().all(plain) {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    };
    quoted.replace('%', r"\%")
}

/// Register the midnight truncation job for `log_path`
///
/// Returns `Ok(false)` if an identical job line was already present.
pub fn register_log_rotation(target: &CronTarget, log_path: &Path) -> Result<bool> {
    let log_path = absolute(log_path)?;
    if log_path.to_string_lossy().contains(['\n', '\r']) {
        anyhow::bail!("Log path {:?} contains a line break", log_path);
    }
    let line = target.job_line(&log_path);

    let existing = match fs::read_to_string(&target.path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", target.path)),
    };
    if existing.lines().any(|l| l.trim() == line) {
        tracing::debug!("Cron job already present in {:?}", target.path);
        return Ok(false);
    }

    if let Some(parent) = target.path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(target.exclusive)
        .append(!target.exclusive)
        .open(&target.path)
        .with_context(|| format!("Failed to open {:?}", target.path))?;
    if !target.exclusive && !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    writeln!(file, "{}", line).with_context(|| format!("Failed to write {:?}", target.path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target.path, fs::Permissions::from_mode(target.mode))?;
    }

    if let Some(reload) = target.reload_command {
        if let Some((program, args)) = reload.split_first() {
            let status = Command::new(program)
                .args(args)
                .status()
                .with_context(|| format!("Failed to run {}", reload.join(" ")))?;
            if !status.success() {
                anyhow::bail!("{} failed with status: {}", reload.join(" "), status);
            }
        }
    }

    tracing::info!("Registered log truncation for {:?} in {:?}", log_path, target.path);
    Ok(true)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(path))
    }
}
