//! Error types for reposync-core.

use std::path::PathBuf;

use thiserror::Error;

/// A [`SyncRequest`](crate::types::SyncRequest) that cannot be acted upon.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("remote source locator must not be empty")]
    EmptySource,

    #[error("branch/ref name must not be empty")]
    EmptyBranch,

    #[error("target path must not be empty")]
    EmptyTarget,
}

/// All errors that can arise while loading the settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure other than a missing file.
    #[error("I/O error reading settings at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error: includes file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
