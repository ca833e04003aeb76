//! Error types for reposync-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use reposync_core::RequestError;

/// All errors that can arise from executing, synchronizing, or chaining.
///
/// Every variant is fatal to the current invocation; none is retried.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// The program could not be located on `PATH`.
    #[error("executable not found: {program}")]
    ExecutableNotFound { program: String },

    #[error("working directory does not exist: {path}")]
    WorkingDirMissing { path: PathBuf },

    /// The OS refused to start the process for a reason other than lookup.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create target directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit (or death by signal, `code == None`).
    #[error("`{command}` failed with {}:\n{output}", exit_label(.code))]
    ProcessFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("`{command}` timed out after {after:?}:\n{output}")]
    Timeout {
        command: String,
        after: Duration,
        output: String,
    },

    #[error("{path} tracks `{actual}`, expected `{expected}`")]
    RemoteMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("entry point {entry_point} not found in {}", .tree.display())]
    EntryPointNotFound { entry_point: String, tree: PathBuf },

    #[error("chained action failed with {}:\n{output}", exit_label(.code))]
    ChainedActionFailed { code: Option<i32>, output: String },
}

impl SyncError {
    /// Captured output of the failing command, when there is one.
    pub fn output(&self) -> Option<&str> {
        match self {
            SyncError::ProcessFailed { output, .. }
            | SyncError::Timeout { output, .. }
            | SyncError::ChainedActionFailed { output, .. } => Some(output),
            _ => None,
        }
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
