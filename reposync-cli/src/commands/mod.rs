pub mod apply;
pub mod module;
pub mod pull;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

/// Resolve a relative target against the current directory.
pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("could not determine current directory")?;
    Ok(cwd.join(path))
}

/// `--timeout 0` disables the timeout, like `timeout_secs: 0` in the settings.
pub(crate) fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
