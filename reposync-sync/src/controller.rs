//! Clone-or-update state machine.
//!
//! ```text
//! probe target for marker
//!   Absent  -> ensure dir -> clone --branch REF          -> Cloned
//!   Present -> [verify origin] -> [fetch] -> checkout REF
//!           -> pull --ff-only -> UpdatedNoChange | UpdatedWithChange
//! ```
//!
//! Every failure is fatal and returned as a [`SyncError`]; nothing is retried
//! and a half-finished clone is left in place. In dry-run mode the controller
//! stops right after probing and reports what it would have done.

use std::path::Path;
use std::time::Duration;

use reposync_core::{
    NoOpDetection, RepoState, Settings, SyncOutcome, SyncRequest, SyncState, VcsSettings,
};

use crate::error::SyncError;
use crate::executor::{CommandSpec, Executor};

/// Knobs for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub vcs: VcsSettings,
    pub dry_run: bool,
    pub timeout: Option<Duration>,
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            vcs: settings.vcs.clone(),
            dry_run: false,
            timeout: settings.timeout(),
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Brings a target directory in line with a remote source.
pub struct SyncController<E: Executor> {
    executor: E,
    options: SyncOptions,
}

impl<E: Executor> SyncController<E> {
    pub fn new(executor: E, options: SyncOptions) -> Self {
        Self { executor, options }
    }

    /// Run the state machine once for `request`.
    pub fn synchronize(&self, request: &SyncRequest) -> Result<SyncOutcome, SyncError> {
        let state = RepoState::probe(&request.target, &self.options.vcs.marker);
        tracing::info!(
            path = %request.target.display(),
            state = %state,
            branch = %request.branch,
            "checked target for an existing working copy"
        );

        match state {
            RepoState::Absent => self.materialize(request),
            RepoState::Present => self.update(request),
        }
    }

    fn materialize(&self, request: &SyncRequest) -> Result<SyncOutcome, SyncError> {
        if self.options.dry_run {
            return Ok(SyncOutcome::new(
                SyncState::WouldClone,
                format!(
                    "Would clone {} into {}",
                    request.source,
                    request.target.display()
                ),
                "",
            ));
        }

        tracing::info!(source = %request.source, "no working copy found, cloning");
        ensure_dir(&request.target)?;

        let clone = self.vcs().args([
            "clone".to_string(),
            "--branch".to_string(),
            request.branch.clone(),
            request.source.clone(),
            request.target.to_string_lossy().into_owned(),
        ]);
        let result = self.executor.run(&clone)?;

        tracing::info!(
            source = %request.source,
            branch = %request.branch,
            "clone succeeded"
        );
        Ok(SyncOutcome::new(
            SyncState::Cloned,
            format!(
                "repository cloned into {} on branch {}",
                request.target.display(),
                request.branch
            ),
            result.output,
        ))
    }

    fn update(&self, request: &SyncRequest) -> Result<SyncOutcome, SyncError> {
        if self.options.dry_run {
            return Ok(SyncOutcome::new(
                SyncState::WouldUpdate,
                format!(
                    "Would pull branch {} in {}",
                    request.branch,
                    request.target.display()
                ),
                "",
            ));
        }

        tracing::info!(branch = %request.branch, "working copy found, updating");
        let target = &request.target;

        if self.options.vcs.verify_remote {
            self.verify_origin(request)?;
        }

        let head_before = match self.options.vcs.no_op_detection {
            NoOpDetection::Head => Some(self.head(target)?),
            NoOpDetection::Phrases => None,
        };

        if self.options.vcs.fetch_before_checkout {
            self.executor
                .run(&self.vcs_in(target).args(["fetch", "--prune"]))?;
        }

        // Checkout first so a changed ref converges instead of pulling onto
        // whatever was checked out last.
        self.executor
            .run(&self.vcs_in(target).args(["checkout", request.branch.as_str()]))?;

        let pull = self
            .executor
            .run(&self.vcs_in(target).args(["pull", "--ff-only"]))?;

        let (unchanged, head_after) = match (self.options.vcs.no_op_detection, &head_before) {
            (NoOpDetection::Head, Some(before)) => {
                let after = self.head(target)?;
                (*before == after, Some(after))
            }
            _ => (
                is_no_op_output(&pull.output, &self.options.vcs.no_op_phrases),
                None,
            ),
        };

        let mut outcome = if unchanged {
            tracing::info!("pull succeeded: already up to date");
            SyncOutcome::new(
                SyncState::UpdatedNoChange,
                format!("repository in {} already up to date", target.display()),
                pull.output,
            )
        } else {
            tracing::info!("pull succeeded: working copy updated");
            SyncOutcome::new(
                SyncState::UpdatedWithChange,
                format!(
                    "repository in {} updated on branch {}",
                    target.display(),
                    request.branch
                ),
                pull.output,
            )
        };
        outcome.head_before = head_before;
        outcome.head_after = head_after;
        Ok(outcome)
    }

    fn verify_origin(&self, request: &SyncRequest) -> Result<(), SyncError> {
        let result = self.executor.run(
            &self
                .vcs_in(&request.target)
                .args(["remote", "get-url", "origin"]),
        )?;
        let actual = result.output.trim();
        if same_remote(actual, &request.source) {
            Ok(())
        } else {
            Err(SyncError::RemoteMismatch {
                path: request.target.clone(),
                expected: request.source.clone(),
                actual: actual.to_string(),
            })
        }
    }

    fn head(&self, target: &Path) -> Result<String, SyncError> {
        let result = self
            .executor
            .run(&self.vcs_in(target).args(["rev-parse", "HEAD"]))?;
        Ok(result.output.trim().to_string())
    }

    fn vcs(&self) -> CommandSpec {
        CommandSpec::new(self.options.vcs.program.as_str()).timeout(self.options.timeout)
    }

    fn vcs_in(&self, dir: &Path) -> CommandSpec {
        self.vcs().current_dir(dir)
    }
}

/// Fold a `synchronize` result into an outcome; errors become `Failed`.
pub fn outcome_of(result: Result<SyncOutcome, SyncError>) -> SyncOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(err) => SyncOutcome::failed(err.to_string(), err.output().unwrap_or_default()),
    }
}

/// `true` when `output` contains one of the known "nothing to do" phrases.
///
/// Case-sensitive; empty phrases never match.
pub fn is_no_op_output(output: &str, phrases: &[String]) -> bool {
    phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && output.contains(phrase.as_str()))
}

fn same_remote(actual: &str, expected: &str) -> bool {
    fn normalize(url: &str) -> &str {
        let url = url.trim().trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url)
    }
    normalize(actual) == normalize(expected)
}

fn ensure_dir(target: &Path) -> Result<(), SyncError> {
    if target.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(target).map_err(|source| {
        tracing::error!(path = %target.display(), error = %source, "cannot create target directory");
        SyncError::DirectoryCreationFailed {
            path: target.to_path_buf(),
            source,
        }
    })?;
    tracing::info!(path = %target.display(), "created target directory");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedExecutor;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    const SRC: &str = "https://example.com/acme/config.git";

    fn present_target() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        tmp
    }

    fn request(target: &Path, branch: &str) -> SyncRequest {
        SyncRequest::new(SRC, target, branch).unwrap()
    }

    fn without_fetch() -> SyncOptions {
        let mut options = SyncOptions::default();
        options.vcs.fetch_before_checkout = false;
        options
    }

    #[test]
    fn absent_target_is_created_and_cloned_with_branch() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("t1");
        let exec = ScriptedExecutor::new().ok("Cloning into 't1'...\n");
        let controller = SyncController::new(&exec, SyncOptions::default());

        let outcome = controller.synchronize(&request(&target, "main")).unwrap();

        assert_eq!(outcome.state, SyncState::Cloned);
        assert!(outcome.changed);
        assert!(target.is_dir());
        assert_eq!(
            exec.lines(),
            vec![format!("git clone --branch main {SRC} {}", target.display())]
        );
        assert!(exec.calls()[0].cwd.is_none());
    }

    #[test]
    fn absent_target_never_pulls() {
        let root = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new().ok("");
        let controller = SyncController::new(&exec, SyncOptions::default());
        controller
            .synchronize(&request(&root.path().join("fresh"), "develop"))
            .unwrap();

        let lines = exec.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines.iter().all(|l| !l.contains("pull") && !l.contains("checkout")));
    }

    #[test]
    fn clone_failure_is_fatal_with_output() {
        let root = TempDir::new().unwrap();
        let exec = ScriptedExecutor::new().exit(128, "fatal: repository not found\n");
        let controller = SyncController::new(&exec, SyncOptions::default());

        let err = controller
            .synchronize(&request(&root.path().join("t"), "main"))
            .unwrap_err();
        assert!(matches!(err, SyncError::ProcessFailed { code: Some(128), .. }));
        assert!(err.to_string().contains("repository not found"));
    }

    #[test]
    #[cfg(unix)]
    fn directory_creation_failure_runs_no_command() {
        let root = TempDir::new().unwrap();
        let blocker = root.path().join("file");
        fs::write(&blocker, "not a dir").unwrap();
        let exec = ScriptedExecutor::new();
        let controller = SyncController::new(&exec, SyncOptions::default());

        let err = controller
            .synchronize(&request(&blocker.join("nested"), "main"))
            .unwrap_err();
        assert!(matches!(err, SyncError::DirectoryCreationFailed { .. }));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn present_target_fetches_checks_out_then_pulls_ff_only() {
        let target = present_target();
        let exec = ScriptedExecutor::new()
            .ok("")
            .ok("Switched to branch 'main'\n")
            .ok("Already up to date.\n");
        let controller = SyncController::new(&exec, SyncOptions::default());

        controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();

        assert_eq!(
            exec.lines(),
            vec![
                "git fetch --prune",
                "git checkout main",
                "git pull --ff-only"
            ]
        );
        assert!(exec
            .calls()
            .iter()
            .all(|c| c.cwd.as_deref() == Some(target.path())));
    }

    #[test]
    fn already_up_to_date_is_no_change() {
        let target = present_target();
        let exec = ScriptedExecutor::new()
            .ok("Already on 'main'\n")
            .ok("Already up to date.\n");
        let controller = SyncController::new(&exec, without_fetch());

        let outcome = controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        assert_eq!(outcome.state, SyncState::UpdatedNoChange);
        assert!(!outcome.changed);
    }

    #[test]
    fn legacy_hyphenated_phrase_is_no_change() {
        let target = present_target();
        let exec = ScriptedExecutor::new().ok("").ok("Already up-to-date.\n");
        let controller = SyncController::new(&exec, without_fetch());

        let outcome = controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        assert_eq!(outcome.state, SyncState::UpdatedNoChange);
    }

    #[test]
    fn new_commits_are_a_change() {
        let target = present_target();
        let exec = ScriptedExecutor::new().ok("").ok(
            "Updating 1a2b3c4..5d6e7f8\nFast-forward\n site.yml | 2 +-\n 1 file changed\n",
        );
        let controller = SyncController::new(&exec, without_fetch());

        let outcome = controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        assert_eq!(outcome.state, SyncState::UpdatedWithChange);
        assert!(outcome.changed);
        assert!(outcome.output.contains("Fast-forward"));
    }

    #[test]
    fn phrase_match_is_case_sensitive() {
        assert!(!is_no_op_output(
            "already up to date",
            &VcsSettings::default().no_op_phrases
        ));
        assert!(!is_no_op_output("anything", &["".to_string()]));
    }

    #[test]
    fn non_fast_forward_pull_is_fatal() {
        let target = present_target();
        let exec = ScriptedExecutor::new()
            .ok("")
            .exit(128, "fatal: Not possible to fast-forward, aborting.\n");
        let controller = SyncController::new(&exec, without_fetch());

        let result = controller.synchronize(&request(target.path(), "main"));
        let outcome = outcome_of(result);
        assert_eq!(outcome.state, SyncState::Failed);
        assert!(!outcome.changed);
        assert!(outcome.output.contains("Not possible to fast-forward"));
    }

    #[test]
    fn checkout_failure_stops_before_pull() {
        let target = present_target();
        let exec = ScriptedExecutor::new()
            .exit(1, "error: pathspec 'nope' did not match\n");
        let controller = SyncController::new(&exec, without_fetch());

        let err = controller
            .synchronize(&request(target.path(), "nope"))
            .unwrap_err();
        assert!(matches!(err, SyncError::ProcessFailed { .. }));
        assert_eq!(exec.calls().len(), 1);
    }

    #[test]
    fn switching_ref_checks_out_the_new_ref() {
        let target = present_target();
        let exec = ScriptedExecutor::new()
            .ok("")
            .ok("")
            .ok("Already up to date.\n")
            .ok("")
            .ok("Switched to branch 'release'\n")
            .ok("Already up to date.\n");
        let controller = SyncController::new(&exec, SyncOptions::default());

        controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        controller
            .synchronize(&request(target.path(), "release"))
            .unwrap();

        let lines = exec.lines();
        assert_eq!(lines[4], "git checkout release");
        assert_eq!(lines[5], "git pull --ff-only");
    }

    #[test]
    fn head_detection_ignores_wording() {
        let target = present_target();
        let mut options = without_fetch();
        options.vcs.no_op_detection = NoOpDetection::Head;

        // Same HEAD before and after, even though output looks like a change.
        let exec = ScriptedExecutor::new()
            .ok("abc123\n")
            .ok("")
            .ok("Fast-forward\n")
            .ok("abc123\n");
        let controller = SyncController::new(&exec, options.clone());
        let outcome = controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        assert_eq!(outcome.state, SyncState::UpdatedNoChange);
        assert_eq!(outcome.head_before.as_deref(), Some("abc123"));

        // Different HEAD, output says nothing happened.
        let exec = ScriptedExecutor::new()
            .ok("abc123\n")
            .ok("")
            .ok("Already up to date.\n")
            .ok("def456\n");
        let controller = SyncController::new(&exec, options);
        let outcome = controller
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        assert_eq!(outcome.state, SyncState::UpdatedWithChange);
        assert_eq!(outcome.head_after.as_deref(), Some("def456"));
        assert_eq!(exec.lines()[0], "git rev-parse HEAD");
    }

    #[test]
    fn verify_remote_rejects_foreign_tree() {
        let target = present_target();
        let mut options = without_fetch();
        options.vcs.verify_remote = true;
        let exec = ScriptedExecutor::new().ok("https://example.com/other/repo.git\n");
        let controller = SyncController::new(&exec, options);

        let err = controller
            .synchronize(&request(target.path(), "main"))
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteMismatch { .. }), "got: {err}");
        assert_eq!(exec.lines(), vec!["git remote get-url origin"]);
    }

    #[rstest]
    #[case("https://example.com/acme/config", "https://example.com/acme/config.git", true)]
    #[case("https://example.com/acme/config/", "https://example.com/acme/config", true)]
    #[case(" git@example.com:acme/config.git\n", "git@example.com:acme/config", true)]
    #[case("https://example.com/acme/other", "https://example.com/acme/config", false)]
    fn remote_comparison_ignores_git_suffix_and_slash(
        #[case] actual: &str,
        #[case] expected: &str,
        #[case] same: bool,
    ) {
        assert_eq!(same_remote(actual, expected), same);
    }

    #[test]
    fn dry_run_never_executes_or_creates() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("t1");
        let exec = ScriptedExecutor::new();
        let controller = SyncController::new(&exec, SyncOptions::default().dry_run(true));

        let outcome = controller.synchronize(&request(&target, "main")).unwrap();
        assert_eq!(outcome.state, SyncState::WouldClone);
        assert!(outcome.message.starts_with("Would clone"));
        assert!(!target.exists());

        let present = present_target();
        let outcome = controller
            .synchronize(&request(present.path(), "dev"))
            .unwrap();
        assert_eq!(outcome.state, SyncState::WouldUpdate);
        assert!(outcome.message.contains("Would pull branch dev"));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn timeout_is_forwarded_to_every_command() {
        let target = present_target();
        let mut options = SyncOptions::default();
        options.timeout = Some(Duration::from_secs(9));
        let exec = ScriptedExecutor::new().ok("").ok("").ok("Already up to date.\n");
        SyncController::new(&exec, options)
            .synchronize(&request(target.path(), "main"))
            .unwrap();
        assert!(exec
            .calls()
            .iter()
            .all(|c| c.timeout == Some(Duration::from_secs(9))));
    }

    #[test]
    fn custom_vcs_program_is_used() {
        let root = TempDir::new().unwrap();
        let mut options = SyncOptions::default();
        options.vcs.program = "/opt/git/bin/git".to_string();
        let exec = ScriptedExecutor::new().ok("");
        SyncController::new(&exec, options)
            .synchronize(&request(&root.path().join("x"), "main"))
            .unwrap();
        assert_eq!(exec.calls()[0].program, "/opt/git/bin/git");
    }
}
