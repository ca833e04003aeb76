//! `reposync pull`: clone or fast-forward a working copy.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use reposync_core::{Settings, SyncOutcome, SyncRequest, SyncState};
use reposync_sync::controller::outcome_of;
use reposync_sync::{SyncController, SyncOptions, SystemExecutor};

use super::{absolute, timeout_from_secs};

/// Arguments for `reposync pull`.
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Remote repository to clone from (URL or local path).
    pub source: String,

    /// Working copy to create or update.
    pub target: PathBuf,

    /// Branch or ref to check out (default: `default_branch` from the settings).
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Report what would happen without running git or creating directories.
    #[arg(long)]
    pub dry_run: bool,

    /// Kill any git command still running after this many seconds (0 disables).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Refuse to update a working copy whose origin is not SOURCE.
    #[arg(long)]
    pub verify_remote: bool,
}

impl PullArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let target = absolute(&self.target)?;
        let branch = self
            .branch
            .unwrap_or_else(|| settings.default_branch.clone());
        let request =
            SyncRequest::new(self.source, target, branch).context("invalid pull arguments")?;

        let mut options = SyncOptions::from_settings(settings).dry_run(self.dry_run);
        if let Some(secs) = self.timeout {
            options.timeout = timeout_from_secs(secs);
        }
        options.vcs.verify_remote |= self.verify_remote;

        let controller = SyncController::new(SystemExecutor::new(), options);
        let outcome = outcome_of(controller.synchronize(&request));

        if outcome.is_success() {
            print_outcome(&outcome);
            tracing::info!(state = %outcome.state, "git operation completed");
            Ok(ExitCode::SUCCESS)
        } else {
            tracing::error!("git operation failed: {}", outcome.message);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_outcome(outcome: &SyncOutcome) {
    match outcome.state {
        SyncState::Cloned | SyncState::UpdatedWithChange => {
            println!("{} {}", "✓".green().bold(), outcome.message);
        }
        SyncState::UpdatedNoChange => {
            println!("{} {}", "·".dimmed(), outcome.message);
        }
        SyncState::WouldClone | SyncState::WouldUpdate => {
            println!("[dry-run] {} {}", "~".yellow(), outcome.message);
        }
        SyncState::Failed => {}
    }
}
