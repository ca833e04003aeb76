//! Local automation run against a synchronized tree.
//!
//! The runner is only ever invoked after a successful sync. It checks that the
//! entry point exists inside the tree, then runs
//! `PROGRAM ENTRY_POINT <local args> [--tags T1,T2]` from the tree root.

use std::path::Component;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use reposync_core::{ChainedActionRequest, RunnerSettings};

use crate::error::SyncError;
use crate::executor::{CommandSpec, Executor};

/// Per-run counters summed over every host in a play recap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunRecap {
    pub ok: u64,
    pub changed: u64,
    pub unreachable: u64,
    pub failed: u64,
}

impl RunRecap {
    /// Parse `host : ok=N changed=N unreachable=N failed=N …` lines.
    ///
    /// Returns `None` when the output carries no recap at all.
    pub fn parse(output: &str) -> Option<Self> {
        static RECAP: OnceLock<Regex> = OnceLock::new();
        let re = RECAP.get_or_init(|| {
            Regex::new(
                r"(?m)^\S.*?:\s+ok=(\d+)\s+changed=(\d+)\s+unreachable=(\d+)\s+failed=(\d+)",
            )
            .expect("recap pattern is valid")
        });

        let mut recap: Option<RunRecap> = None;
        for caps in re.captures_iter(output) {
            let field = |i: usize| {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<u64>().ok())
                    .unwrap_or(0)
            };
            let total = recap.get_or_insert_with(RunRecap::default);
            total.ok += field(1);
            total.changed += field(2);
            total.unreachable += field(3);
            total.failed += field(4);
        }
        recap
    }
}

/// Result of a successful chained run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainedActionResult {
    pub changed: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recap: Option<RunRecap>,
}

/// Runs the automation entry point of a synchronized tree.
pub struct ChainedRunner<E: Executor> {
    executor: E,
    settings: RunnerSettings,
    timeout: Option<Duration>,
}

impl<E: Executor> ChainedRunner<E> {
    pub fn new(executor: E, settings: RunnerSettings) -> Self {
        Self {
            executor,
            settings,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command that [`ChainedRunner::run`] would execute.
    pub fn command_for(&self, request: &ChainedActionRequest) -> CommandSpec {
        let mut spec = CommandSpec::new(self.settings.program.as_str())
            .arg(request.entry_point.as_str())
            .args(self.settings.local_args.iter().cloned())
            .current_dir(&request.tree)
            .timeout(self.timeout);
        if !request.tags.is_empty() {
            spec = spec
                .arg(self.settings.tags_flag.as_str())
                .arg(request.tags.join(","));
        }
        spec
    }

    /// Validate the entry point and run it.
    ///
    /// A successful run counts as a change unless `trust_recap` is set and
    /// the output's recap reports zero changed tasks.
    pub fn run(&self, request: &ChainedActionRequest) -> Result<ChainedActionResult, SyncError> {
        ensure_entry_point(request)?;

        let spec = self.command_for(request);
        tracing::info!(
            entry_point = %request.entry_point,
            tags = %request.tags.join(","),
            "running chained action"
        );
        let result = self.executor.output(&spec)?;
        if !result.success {
            tracing::error!(
                code = ?result.code,
                entry_point = %request.entry_point,
                "chained action failed"
            );
            return Err(SyncError::ChainedActionFailed {
                code: result.code,
                output: result.output,
            });
        }

        let recap = RunRecap::parse(&result.output);
        let changed = match recap {
            Some(recap) if self.settings.trust_recap => recap.changed > 0,
            _ => true,
        };
        tracing::info!(changed, "chained action succeeded");
        Ok(ChainedActionResult {
            changed,
            output: result.output,
            recap,
        })
    }
}

fn ensure_entry_point(request: &ChainedActionRequest) -> Result<(), SyncError> {
    let entry = std::path::Path::new(&request.entry_point);
    let inside_tree = !request.entry_point.is_empty()
        && entry
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

    if inside_tree && request.entry_path().is_file() {
        return Ok(());
    }

    tracing::error!(
        entry_point = %request.entry_point,
        tree = %request.tree.display(),
        "entry point not found"
    );
    Err(SyncError::EntryPointNotFound {
        entry_point: request.entry_point.clone(),
        tree: request.tree.clone(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
