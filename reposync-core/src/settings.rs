//! YAML settings file.
//!
//! # Lookup
//!
//! 1. `--config <path>` when given
//! 2. `$XDG_CONFIG_HOME/reposync/config.yaml`
//! 3. built-in defaults
//!
//! A missing file is not an error; every field has a default so a partial
//! file only overrides what it names.
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit path; used in tests with `TempDir`
//! - `load(explicit)`: resolves the lookup order above, delegates to `load_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::paths::{default_settings_path, DEFAULT_BRANCH, DEFAULT_LOG_FILE, GIT_MARKER};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a successful pull is classified as "nothing changed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NoOpDetection {
    /// Match pull output against [`VcsSettings::no_op_phrases`].
    #[default]
    Phrases,
    /// Compare `HEAD` before checkout and after pull.
    Head,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VcsSettings {
    pub program: String,
    /// Metadata entry whose presence means the target is a working copy.
    pub marker: String,
    pub fetch_before_checkout: bool,
    /// Refuse to update a tree whose `origin` differs from the requested source.
    pub verify_remote: bool,
    pub no_op_detection: NoOpDetection,
    /// Case-sensitive phrases the VCS prints when a pull had nothing to do.
    pub no_op_phrases: Vec<String>,
}

impl Default for VcsSettings {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            marker: GIT_MARKER.to_string(),
            fetch_before_checkout: true,
            verify_remote: false,
            no_op_detection: NoOpDetection::Phrases,
            no_op_phrases: vec![
                "Already up to date".to_string(),
                "Already up-to-date".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub program: String,
    /// Arguments that scope the run to the local host.
    pub local_args: Vec<String>,
    pub tags_flag: String,
    /// Derive `changed` from the run's recap counters instead of assuming it.
    pub trust_recap: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            program: "ansible-playbook".to_string(),
            local_args: vec!["--connection".to_string(), "local".to_string()],
            tags_flag: "--tags".to_string(),
            trust_recap: false,
        }
    }
}

/// Root of the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_branch: String,
    /// `None` disables the log file; console logging is unaffected.
    pub log_file: Option<PathBuf>,
    /// Per-command timeout; `None` waits forever.
    pub timeout_secs: Option<u64>,
    pub vcs: VcsSettings,
    pub runner: RunnerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            timeout_secs: None,
            vcs: VcsSettings::default(),
            runner: RunnerSettings::default(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load settings from `path`, falling back to defaults when it does not exist.
///
/// Returns `SettingsError::Parse` (with path + line context) if malformed YAML.
pub fn load_at(path: &Path) -> Result<Settings, SettingsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve the settings location and load it.
pub fn load(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    match explicit {
        Some(path) => load_at(path),
        None => match default_settings_path() {
            Some(path) => load_at(&path),
            None => Ok(Settings::default()),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
