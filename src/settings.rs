//! # Runtime Settings
//!
//! Process-wide settings resolved once at startup and passed down by
//! reference. Each value is taken from the first layer that provides it:
//!
//! 1. command-line flag
//! 2. environment variable (`METAREPO_WORKSPACE`, `METAREPO_JOBS`,
//!    `METAREPO_GIT_TIMEOUT`, `METAREPO_LOG`, then `RUST_LOG`)
//! 3. user settings file (`<config dir>/metarepo/settings.yaml`)
//! 4. the workspace's `logging.level` (log filter only)
//! 5. built-in default
//!
//! Settings are not workspace state; they describe how this user wants the
//! tool to behave on this machine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::config::load_yaml;
use crate::defaults::default_settings_file;
use crate::error::{Error, Result};
use crate::workspace::Workspace;

pub const ENV_WORKSPACE: &str = "METAREPO_WORKSPACE";
pub const ENV_JOBS: &str = "METAREPO_JOBS";
pub const ENV_GIT_TIMEOUT: &str = "METAREPO_GIT_TIMEOUT";
pub const ENV_LOG: &str = "METAREPO_LOG";

const DEFAULT_LOG_FILTER: &str = "warn";
const DEFAULT_COLOR: &str = "auto";

/// Contents of the optional user settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub workspace: Option<PathBuf>,
    pub jobs: Option<usize>,
    /// Seconds.
    pub git_timeout: Option<u64>,
    pub log_level: Option<String>,
    pub color: Option<String>,
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workspace: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub git_timeout: Option<u64>,
    pub log_level: Option<String>,
    pub color: Option<String>,
    /// Alternative settings file; unlike the default location it must exist.
    pub settings_file: Option<PathBuf>,
}

/// Fully resolved settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Workspace root to use instead of searching upwards from the current
    /// directory.
    pub workspace: Option<PathBuf>,
    /// Worker threads for repository inspection; always at least 1.
    pub jobs: usize,
    /// Bound on each individual git invocation.
    pub git_timeout: Option<Duration>,
    /// `env_logger` filter directives.
    pub log_filter: String,
    /// `always`, `never` or `auto`.
    pub color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workspace: None,
            jobs: 1,
            git_timeout: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            color: DEFAULT_COLOR.to_string(),
        }
    }
}

impl Settings {
    /// Resolve settings against the real process environment and the settings
    /// file on disk.
    pub fn load(overrides: &Overrides) -> Result<Self> {
        let file = match &overrides.settings_file {
            Some(path) => Some(load_yaml::<SettingsFile>(path)?),
            None => read_default_file()?,
        };
        Ok(Self::resolve(
            overrides,
            |key| std::env::var(key).ok(),
            file,
            workspace_log_level,
        ))
    }

    /// Layer `overrides`, the environment seen through `env`, and `file` over
    /// the defaults. `workspace_level` is asked for the workspace's logging
    /// level, given the resolved workspace root, only when no other layer
    /// sets the log filter.
    pub fn resolve<F, W>(
        overrides: &Overrides,
        env: F,
        file: Option<SettingsFile>,
        workspace_level: W,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
        W: FnOnce(Option<&Path>) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let defaults = Self::default();
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let workspace = overrides
            .workspace
            .clone()
            .or_else(|| env(ENV_WORKSPACE).map(PathBuf::from))
            .or(file.workspace);

        let jobs = overrides
            .jobs
            .or_else(|| env(ENV_JOBS).and_then(|v| parse_number(ENV_JOBS, &v)))
            .or(file.jobs)
            .unwrap_or(defaults.jobs)
            .max(1);

        let git_timeout = overrides
            .git_timeout
            .or_else(|| env(ENV_GIT_TIMEOUT).and_then(|v| parse_number(ENV_GIT_TIMEOUT, &v)))
            .or(file.git_timeout)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let log_filter = overrides
            .log_level
            .clone()
            .or_else(|| env(ENV_LOG))
            .or_else(|| env("RUST_LOG"))
            .or(file.log_level)
            .or_else(|| workspace_level(workspace.as_deref()))
            .unwrap_or(defaults.log_filter);

        let color = overrides
            .color
            .clone()
            .or(file.color)
            .unwrap_or(defaults.color);

        Self {
            workspace,
            jobs,
            git_timeout,
            log_filter,
            color,
        }
    }
}

/// Logging level stored in the workspace config. Runs before logging is
/// installed, so a missing or unreadable workspace yields `None` here and
/// is reported by the command that needs it.
fn workspace_log_level(explicit: Option<&Path>) -> Option<String> {
    let cwd = std::env::current_dir().ok()?;
    let workspace = Workspace::locate(explicit, &cwd).ok()?;
    workspace.config.logging.level
}

fn read_default_file() -> Result<Option<SettingsFile>> {
    let Some(path) = default_settings_file() else {
        return Ok(None);
    };
    read_optional(&path)
}

fn read_optional(path: &Path) -> Result<Option<SettingsFile>> {
    match load_yaml(path) {
        Ok(file) => Ok(Some(file)),
        Err(Error::ConfigurationMissing { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("ignoring {}={:?}: not a number", key, value);
            None
        }
    }
}
