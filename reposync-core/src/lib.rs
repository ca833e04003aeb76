//! reposync core library: domain types, settings, errors.
//!
//! Public API surface:
//! - [`types`]: requests, repository state and sync outcomes
//! - [`error`]: [`RequestError`], [`SettingsError`]
//! - [`settings`]: YAML settings load with built-in defaults
//! - [`paths`]: default file locations

pub mod error;
pub mod paths;
pub mod settings;
pub mod types;

pub use error::{RequestError, SettingsError};
pub use settings::{NoOpDetection, RunnerSettings, Settings, VcsSettings};
pub use types::{
    ChainedActionRequest, RepoState, RepoStateLabel, SyncOutcome, SyncRequest, SyncState,
};
