//! Size-based rotation of the reposync log file, checked once at startup.
//!
//! Rotated copies use the scheme
//!   reposync.log → reposync.log.1 → reposync.log.2 → … → reposync.log.<keep>

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Maximum log file size before rotation (10 MiB).
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

/// Number of rotated copies kept next to the live file.
pub const KEEP_ROTATED: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotation {
    pub max_bytes: u64,
    pub keep: usize,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_bytes: MAX_LOG_BYTES,
            keep: KEEP_ROTATED,
        }
    }
}

impl LogRotation {
    /// Move `log_path` aside when it has reached `max_bytes`.
    ///
    /// Returns `true` if the file was rotated. A missing file is not an
    /// error. With `keep == 0` an oversized log is simply removed.
    pub fn rotate_if_needed(&self, log_path: &Path) -> io::Result<bool> {
        let size = match fs::metadata(log_path) {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err),
        };
        if size < self.max_bytes {
            return Ok(false);
        }

        if self.keep == 0 {
            fs::remove_file(log_path)?;
            return Ok(true);
        }

        remove_if_exists(&rotated_path(log_path, self.keep))?;
        for n in (1..self.keep).rev() {
            let from = rotated_path(log_path, n);
            if from.exists() {
                fs::rename(&from, rotated_path(log_path, n + 1))?;
            }
        }
        fs::rename(log_path, rotated_path(log_path, 1))?;
        Ok(true)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// `reposync.log` + 2 → `reposync.log.2`
fn rotated_path(base: &Path, n: usize) -> PathBuf {
    let mut name = base
        .file_name()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "reposync.log".into());
    name.push(format!(".{n}"));
    base.with_file_name(name)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
