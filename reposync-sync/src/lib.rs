//! # reposync-sync
//!
//! Idempotent repository synchronization and chained local automation runs.
//!
//! - [`executor`] runs external commands and captures their combined output.
//! - [`controller`] clones or updates a working copy and classifies the result.
//! - [`chained`] runs an automation entry point inside the synchronized tree.
//! - [`pipeline`] composes the two for the configuration-management variant.

pub mod chained;
pub mod controller;
pub mod error;
pub mod executor;
pub mod pipeline;

pub use chained::{ChainedActionResult, ChainedRunner, RunRecap};
pub use controller::{SyncController, SyncOptions};
pub use error::SyncError;
pub use executor::{CommandResult, CommandSpec, Executor, SystemExecutor};
pub use pipeline::{apply, ApplyParams, ApplyReport};

#[cfg(test)]
pub(crate) mod testing;
