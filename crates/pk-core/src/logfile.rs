//! Shared forwarder log
//!
//! Every forwarding process appends its stdout/stderr to one file. Before a
//! launch the file is truncated in place if it has not been written for longer
//! than the retention window. Truncating keeps the inode, so anything tailing
//! the log keeps working.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Bytes read per step when tailing the log from its end
const TAIL_CHUNK: u64 = 8 * 1024;

/// Handle to the shared forwarder log
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the log if it was last modified more than `retention` ago
    ///
    /// Returns `Ok(true)` if the log was truncated. A missing log is left alone.
    pub fn rotate_if_stale(&self, retention: Duration) -> io::Result<bool> {
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e),
        };

        // A modification time in the future counts as fresh
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age <= retention {
            return Ok(false);
        }

        OpenOptions::new().write(true).open(&self.path)?.set_len(0)?;
        tracing::info!("Truncated stale log {:?} (last written {}s ago)", self.path, age.as_secs());
        Ok(true)
    }

    /// Open the log for appending, creating it and its directory if needed
    pub fn open_for_append(&self) -> io::Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    /// Last `lines` lines of the log, or an empty string if there is no log
    ///
    /// Reads backwards from the end so only the tail is held in memory.
    pub fn tail(&self, lines: usize) -> io::Result<String> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e),
        };

        let mut start = file.metadata()?.len();
        let mut buf: Vec<u8> = Vec::new();
        let mut newlines = 0;

        // One newline more than requested guarantees the first kept line is whole
        while start > 0 && newlines <= lines {
            let step = TAIL_CHUNK.min(start);
            start -= step;
            file.seek(SeekFrom::Start(start))?;

            let mut chunk = Vec::with_capacity(step as usize);
            file.by_ref().take(step).read_to_end(&mut chunk)?;
            newlines += chunk.iter().filter(|&&b| b == b'\n').count();
            chunk.extend_from_slice(&buf);
            buf = chunk;
        }

        let content = String::from_utf8_lossy(&buf);
        let all: Vec<&str> = content.lines().collect();
        let first = all.len().saturating_sub(lines);
        Ok(all[first..].join("\n"))
    }
}
