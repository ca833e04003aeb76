use std::path::PathBuf;

pub const APP_DIR: &str = "reposync";
pub const SETTINGS_FILE: &str = "config.yaml";
pub const DEFAULT_LOG_FILE: &str = "/var/log/reposync.log";
pub const DEFAULT_BRANCH: &str = "main";
pub const GIT_MARKER: &str = ".git";

/// `$XDG_CONFIG_HOME/reposync/config.yaml` (or the platform equivalent).
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
}
