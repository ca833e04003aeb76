//! Process-wide `tracing` setup.
//!
//! Two layers share one registry: a plain-text file layer (timestamped, no
//! ANSI) and a stderr console layer at a coarser level. `RUST_LOG` replaces
//! the console level when set.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::log_rotation::LogRotation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `None` logs to the console only.
    pub file: Option<PathBuf>,
    pub file_level: LevelFilter,
    pub console_level: LevelFilter,
}

impl LogConfig {
    /// `verbose` is the `-v` count: 0 → info, 1 → debug, 2+ → trace.
    /// The file always records at least debug.
    pub fn new(file: Option<PathBuf>, verbose: u8) -> Self {
        let console_level = match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        };
        Self {
            file,
            file_level: console_level.max(LevelFilter::DEBUG),
            console_level,
        }
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(config: &LogConfig) {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.console_level.into()));
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(console_filter);

    let mut problem: Option<(PathBuf, io::Error)> = None;
    let mut rotated = false;
    let file_layer = match config.file.as_deref().map(open_log_file) {
        Some(Ok((file, did_rotate))) => {
            rotated = did_rotate;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(config.file_level),
            )
        }
        Some(Err(err)) => {
            problem = config.file.clone().map(|path| (path, err));
            None
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init();

    if let Some((path, err)) = problem {
        tracing::warn!(
            path = %path.display(),
            error = %err,
            "cannot open log file, logging to the console only"
        );
    }
    if rotated {
        if let Some(path) = &config.file {
            tracing::info!(path = %path.display(), "log file rotated");
        }
    }
}

/// Rotate if oversized, then open for appending. Parent directories are
/// created on demand.
fn open_log_file(path: &Path) -> io::Result<(File, bool)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let rotated = LogRotation::default().rotate_if_needed(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok((file, rotated))
}
