//! `reposync apply`: synchronize a repository, then run a playbook from it.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use reposync_core::{RepoStateLabel, Settings};
use reposync_sync::{apply, ApplyParams, ApplyReport, SystemExecutor};

use super::absolute;

/// Arguments for `reposync apply`.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Remote repository to clone from (URL or local path).
    pub source: String,

    /// Working copy to create or update.
    pub target: PathBuf,

    /// Playbook to run, relative to the working copy root.
    #[arg(short, long, alias = "playbook", value_name = "FILE")]
    pub entry_point: String,

    /// Branch or ref to check out (default: `default_branch` from the settings).
    #[arg(short, long)]
    pub branch: Option<String>,

    /// Only run tasks with these tags.
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Report what would happen without cloning, pulling or running anything.
    #[arg(long, alias = "dry-run")]
    pub check: bool,

    /// Print the result as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,

    /// Kill any command still running after this many seconds (0 disables).
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl ApplyArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let mut settings = settings.clone();
        if let Some(secs) = self.timeout {
            settings.timeout_secs = Some(secs);
        }

        let params = ApplyParams {
            repo_url: self.source,
            target_dir: absolute(&self.target)?,
            playbook_name: self.entry_point,
            branch: self.branch,
            tags: self.tags,
            check_mode: self.check,
        };
        let report = apply(&SystemExecutor::new(), &settings, &params);

        if self.json {
            let json =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{json}");
        } else {
            print_summary(&report, self.check);
        }

        Ok(if report.failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}

fn print_summary(report: &ApplyReport, check: bool) {
    let prefix = if check { "[check] " } else { "" };
    if report.failed {
        eprintln!("{prefix}{} {}", "✗".red().bold(), report.msg);
        return;
    }

    let repo = match report.repo_state {
        RepoStateLabel::Cloned => "cloned".green(),
        RepoStateLabel::Updated => "updated".green(),
        RepoStateLabel::Unchanged => "unchanged".dimmed(),
    };
    println!(
        "{prefix}{} {} (repository {repo}, {} ms)",
        "✓".green().bold(),
        report.msg,
        report.duration_ms
    );
    if !report.playbook_output.is_empty() {
        print!("{}", report.playbook_output);
    }
}
