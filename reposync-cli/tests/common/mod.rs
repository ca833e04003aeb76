//! Shared harness: fake `git` and `ansible-playbook` scripts wired in through
//! a settings file, plus a local "remote" directory holding `site.yml`.
//!
//! The fake git `clone` copies the source directory into the target and
//! creates a `.git` marker; `pull` prints `$FAKE_GIT_PULL` (default
//! "Already up to date."). Both fakes append their arguments to a call log.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

const FAKE_GIT: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_GIT_LOG"
case "$1" in
  clone)
    src="$4"; dest="$5"
    if [ ! -d "$src" ]; then
      echo "fatal: repository '$src' does not exist" >&2
      exit 128
    fi
    echo "Cloning into '$dest'..." >&2
    mkdir -p "$dest/.git" && cp -R "$src"/. "$dest"/
    ;;
  fetch) ;;
  checkout) echo "Already on '$2'" ;;
  pull) printf '%s\n' "${FAKE_GIT_PULL:-Already up to date.}" ;;
  *) echo "unsupported: $*" >&2; exit 1 ;;
esac
"#;

const FAKE_PLAYBOOK: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_PLAYBOOK_LOG"
echo "PLAY [localhost] ***"
echo "PLAY RECAP ***"
echo "localhost : ok=2 changed=1 unreachable=0 failed=0"
exit "${FAKE_PLAYBOOK_EXIT:-0}"
"#;

pub struct Harness {
    pub root: TempDir,
    pub config: PathBuf,
    pub log_file: PathBuf,
    pub source: PathBuf,
    git_log: PathBuf,
    playbook_log: PathBuf,
}

impl Harness {
    pub fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let bin = root.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let git = write_script(&bin, "git", FAKE_GIT);
        let playbook = write_script(&bin, "ansible-playbook", FAKE_PLAYBOOK);

        let source = root.path().join("remote");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("site.yml"), "- hosts: localhost\n").unwrap();

        let harness = Self {
            config: root.path().join("config.yaml"),
            log_file: root.path().join("logs").join("reposync.log"),
            git_log: root.path().join("git-calls.log"),
            playbook_log: root.path().join("playbook-calls.log"),
            source,
            root,
        };
        harness.write_config(&format!(
            "vcs:\n  program: {}\nrunner:\n  program: {}\n",
            git.display(),
            playbook.display()
        ));
        harness
    }

    pub fn write_config(&self, yaml: &str) {
        fs::write(&self.config, yaml).unwrap();
    }

    pub fn source_arg(&self) -> String {
        self.source.to_string_lossy().into_owned()
    }

    pub fn target(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    /// A target that already looks like a working copy.
    pub fn present_target(&self, name: &str) -> PathBuf {
        let target = self.target(name);
        fs::create_dir_all(target.join(".git")).unwrap();
        fs::write(target.join("site.yml"), "- hosts: localhost\n").unwrap();
        target
    }

    pub fn cmd(&self) -> Command {
        self.cmd_logging_to(&self.log_file)
    }

    pub fn cmd_logging_to(&self, log_file: &Path) -> Command {
        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("reposync"));
        cmd.arg("--config")
            .arg(&self.config)
            .arg("--log-file")
            .arg(log_file)
            .env("FAKE_GIT_LOG", &self.git_log)
            .env("FAKE_PLAYBOOK_LOG", &self.playbook_log)
            .env_remove("RUST_LOG");
        cmd
    }

    pub fn git_calls(&self) -> Vec<String> {
        read_lines(&self.git_log)
    }

    pub fn playbook_calls(&self) -> Vec<String> {
        read_lines(&self.playbook_log)
    }

    pub fn log_contents(&self) -> String {
        fs::read_to_string(&self.log_file).unwrap_or_default()
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
