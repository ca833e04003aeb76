//! Domain types for a single synchronization run.
//!
//! Everything here is transient: built at the start of an invocation,
//! consumed by the caller, never persisted. All path fields use `PathBuf`.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// What to synchronize, where, and at which ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Remote source locator handed verbatim to the VCS client.
    pub source: String,
    /// Local working directory to materialize or update.
    pub target: PathBuf,
    /// Branch or ref to converge to.
    pub branch: String,
}

impl SyncRequest {
    /// Build a request, rejecting empty locators and refs.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<PathBuf>,
        branch: impl Into<String>,
    ) -> Result<Self, RequestError> {
        let source = source.into().trim().to_string();
        let target = target.into();
        let branch = branch.into().trim().to_string();

        if source.is_empty() {
            return Err(RequestError::EmptySource);
        }
        if target.as_os_str().is_empty() {
            return Err(RequestError::EmptyTarget);
        }
        if branch.is_empty() {
            return Err(RequestError::EmptyBranch);
        }
        Ok(Self {
            source,
            target,
            branch,
        })
    }
}

// ---------------------------------------------------------------------------
// Repository state
// ---------------------------------------------------------------------------

/// Whether the target already holds a working copy.
///
/// Derived from the presence of the VCS metadata marker; recomputed on every
/// run and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Absent,
    Present,
}

impl RepoState {
    /// Probe `target` for `marker` (e.g. `.git`). A marker file counts too,
    /// since linked worktrees and submodules use a `.git` file.
    pub fn probe(target: &Path, marker: &str) -> Self {
        if target.join(marker).exists() {
            RepoState::Present
        } else {
            RepoState::Absent
        }
    }
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoState::Absent => write!(f, "absent"),
            RepoState::Present => write!(f, "present"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Terminal state of a synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Cloned,
    UpdatedNoChange,
    UpdatedWithChange,
    Failed,
    /// Dry run against an absent target.
    WouldClone,
    /// Dry run against a present target.
    WouldUpdate,
}

impl SyncState {
    pub fn is_changed(self) -> bool {
        matches!(
            self,
            SyncState::Cloned
                | SyncState::UpdatedWithChange
                | SyncState::WouldClone
                | SyncState::WouldUpdate
        )
    }

    pub fn is_dry_run(self) -> bool {
        matches!(self, SyncState::WouldClone | SyncState::WouldUpdate)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Cloned => "cloned",
            SyncState::UpdatedNoChange => "updated_no_change",
            SyncState::UpdatedWithChange => "updated_with_change",
            SyncState::Failed => "failed",
            SyncState::WouldClone => "would_clone",
            SyncState::WouldUpdate => "would_update",
        };
        f.write_str(s)
    }
}

/// Result of one `synchronize` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub changed: bool,
    pub state: SyncState,
    pub message: String,
    /// Captured output of the last step that ran.
    pub output: String,
    /// `HEAD` before the update, when the head comparison strategy is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_after: Option<String>,
}

impl SyncOutcome {
    pub fn new(state: SyncState, message: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            changed: state.is_changed(),
            state,
            message: message.into(),
            output: output.into(),
            head_before: None,
            head_after: None,
        }
    }

    pub fn failed(message: impl Into<String>, output: impl Into<String>) -> Self {
        Self::new(SyncState::Failed, message, output)
    }

    pub fn is_success(&self) -> bool {
        self.state != SyncState::Failed
    }
}

/// Coarse repository state reported in the module payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepoStateLabel {
    #[default]
    Unchanged,
    Cloned,
    Updated,
}

impl From<SyncState> for RepoStateLabel {
    fn from(state: SyncState) -> Self {
        match state {
            SyncState::Cloned => RepoStateLabel::Cloned,
            SyncState::UpdatedWithChange => RepoStateLabel::Updated,
            _ => RepoStateLabel::Unchanged,
        }
    }
}

impl fmt::Display for RepoStateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoStateLabel::Unchanged => write!(f, "unchanged"),
            RepoStateLabel::Cloned => write!(f, "cloned"),
            RepoStateLabel::Updated => write!(f, "updated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Chained action
// ---------------------------------------------------------------------------

/// A local automation run against a freshly synchronized tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedActionRequest {
    /// Working directory for the run: the target of the prior sync.
    pub tree: PathBuf,
    /// File name of the entry point, relative to `tree`.
    pub entry_point: String,
    /// Tag filter; passed to the runner only when non-empty.
    pub tags: Vec<String>,
}

impl ChainedActionRequest {
    pub fn new(tree: impl Into<PathBuf>, entry_point: impl Into<String>, tags: Vec<String>) -> Self {
        let tags = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        Self {
            tree: tree.into(),
            entry_point: entry_point.into(),
            tags,
        }
    }

    pub fn entry_path(&self) -> PathBuf {
        self.tree.join(&self.entry_point)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
