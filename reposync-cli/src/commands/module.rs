//! `reposync module`: automation-module protocol.
//!
//! The caller writes the task arguments to a JSON file and passes its path.
//! Exactly one JSON object goes to stdout; every log line goes to stderr or
//! the log file.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use reposync_core::Settings;
use reposync_sync::{apply, ApplyParams, SystemExecutor};

use super::absolute;

/// Arguments for `reposync module`.
#[derive(Args, Debug)]
pub struct ModuleArgs {
    /// JSON file holding the module arguments.
    pub args_file: PathBuf,
}

impl ModuleArgs {
    pub fn run(self, settings: &Settings) -> Result<ExitCode> {
        let raw = match fs::read_to_string(&self.args_file) {
            Ok(raw) => raw,
            Err(err) => {
                let msg = format!(
                    "cannot read arguments file {}: {err}",
                    self.args_file.display()
                );
                tracing::error!("{msg}");
                return Ok(print_failure(&msg));
            }
        };
        let mut params: ApplyParams = match serde_json::from_str(&raw) {
            Ok(params) => params,
            Err(err) => {
                let msg = format!("invalid module arguments: {err}");
                tracing::error!("{msg}");
                return Ok(print_failure(&msg));
            }
        };

        params.target_dir = match absolute(&params.target_dir) {
            Ok(target) => target,
            Err(err) => {
                let msg = format!("cannot resolve target_dir: {err:#}");
                tracing::error!("{msg}");
                return Ok(print_failure(&msg));
            }
        };

        let report = apply(&SystemExecutor::new(), settings, &params);
        let json = serde_json::to_string(&report).context("failed to serialize module result")?;
        println!("{json}");

        Ok(if report.failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }
}

/// Emit a failure payload for errors that happen before `apply` can run.
pub fn print_failure(msg: &str) -> ExitCode {
    println!(
        "{}",
        json!({
            "changed": false,
            "failed": true,
            "msg": msg,
            "repo_state": "unchanged",
            "playbook_output": "",
        })
    );
    ExitCode::FAILURE
}
