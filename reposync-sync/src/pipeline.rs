//! Sync-then-run pipeline shared by `reposync apply` and `reposync module`.
//!
//! [`apply`] never returns an error: every failure is folded into an
//! [`ApplyReport`] with `failed = true`, keeping whatever progress was made
//! (e.g. the repository was cloned before the entry point turned out to be
//! missing) in `msg` and `repo_state`.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use reposync_core::{ChainedActionRequest, RepoStateLabel, Settings, SyncRequest, SyncState};

use crate::chained::ChainedRunner;
use crate::controller::{SyncController, SyncOptions};
use crate::executor::Executor;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Input of one apply run. Field names follow the automation module options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyParams {
    #[serde(alias = "source")]
    pub repo_url: String,
    #[serde(alias = "target")]
    pub target_dir: PathBuf,
    #[serde(alias = "entry_point")]
    pub playbook_name: String,
    /// Falls back to `default_branch` from the settings.
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "tags_from_list_or_csv")]
    pub tags: Vec<String>,
    #[serde(default, alias = "_ansible_check_mode")]
    pub check_mode: bool,
}

/// Accept `["a", "b"]`, `"a,b"` or `null`.
fn tags_from_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Tags {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match Option::<Tags>::deserialize(deserializer)? {
        Some(Tags::List(list)) => list,
        Some(Tags::Csv(csv)) => csv.split(',').map(|t| t.trim().to_string()).collect(),
        None => Vec::new(),
    })
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Structured result of one apply run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub changed: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
    pub msg: String,
    pub repo_state: RepoStateLabel,
    pub playbook_output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_state: Option<SyncState>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl ApplyReport {
    fn start() -> Self {
        Self {
            changed: false,
            failed: false,
            msg: String::new(),
            repo_state: RepoStateLabel::Unchanged,
            playbook_output: String::new(),
            sync_state: None,
            duration_ms: 0,
            finished_at: Utc::now(),
        }
    }

    fn note(&mut self, sentence: impl AsRef<str>) {
        let sentence = sentence.as_ref().trim_end().trim_end_matches('.');
        if !self.msg.is_empty() {
            self.msg.push(' ');
        }
        self.msg.push_str(sentence);
        self.msg.push('.');
    }

    fn fail(mut self, sentence: impl AsRef<str>, started: Instant) -> Self {
        tracing::error!("{}", sentence.as_ref());
        self.failed = true;
        self.note(sentence);
        self.finish(started)
    }

    fn finish(mut self, started: Instant) -> Self {
        self.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.finished_at = Utc::now();
        self
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// Synchronize the repository, then run the entry point inside it.
///
/// The chained run only happens after a successful, non-dry-run sync.
pub fn apply<E: Executor>(executor: &E, settings: &Settings, params: &ApplyParams) -> ApplyReport {
    let started = Instant::now();
    let mut report = ApplyReport::start();

    let branch = params
        .branch
        .clone()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| settings.default_branch.clone());
    let request = match SyncRequest::new(&params.repo_url, &params.target_dir, branch) {
        Ok(request) => request,
        Err(err) => return report.fail(format!("invalid parameters: {err}"), started),
    };

    let options = SyncOptions::from_settings(settings).dry_run(params.check_mode);
    let controller = SyncController::new(executor, options);
    let outcome = match controller.synchronize(&request) {
        Ok(outcome) => outcome,
        Err(err) => {
            report.sync_state = Some(SyncState::Failed);
            return report.fail(format!("synchronization failed: {err}"), started);
        }
    };

    report.changed = outcome.changed;
    report.repo_state = RepoStateLabel::from(outcome.state);
    report.sync_state = Some(outcome.state);
    report.note(&outcome.message);

    if outcome.state.is_dry_run() {
        return report.finish(started);
    }

    let chained = ChainedActionRequest::new(
        request.target.clone(),
        params.playbook_name.clone(),
        params.tags.clone(),
    );
    let runner =
        ChainedRunner::new(executor, settings.runner.clone()).with_timeout(settings.timeout());
    match runner.run(&chained) {
        Ok(result) => {
            report.changed |= result.changed;
            report.playbook_output = result.output;
            report.note(format!("playbook {} ran successfully", params.playbook_name));
            report.finish(started)
        }
        Err(err) => {
            report.playbook_output = err.output().unwrap_or_default().to_string();
            report.fail(err.to_string(), started)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
