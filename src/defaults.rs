//! Default values and fixed names for metarepo.
//!
//! This module provides centralized constants used across the library and the
//! commands, ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Name of the directory whose presence marks a repository root.
pub const MARKER_DIR: &str = ".git";

/// Directory names that are never descended into while scanning, at any depth.
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    ".venv",
    "venv",
    "__pycache__",
    "dist",
    "build",
];

/// Workspace metadata directory, relative to the workspace root.
pub const METAREPO_DIR: &str = ".metarepo";

/// Workspace configuration file inside [`METAREPO_DIR`].
pub const CONFIG_FILE: &str = "config.yaml";

/// Repository manifest file inside [`METAREPO_DIR`].
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Device registry file inside [`METAREPO_DIR`].
pub const DEVICES_FILE: &str = "devices.yaml";

/// Per-device editor configuration snapshots inside [`METAREPO_DIR`].
pub const WORKSPACE_CONFIG_DIR: &str = "workspace-config";

/// Format version written into every persisted file.
pub const FORMAT_VERSION: &str = "1.0";

/// Remote queried for a repository's URL.
pub const DEFAULT_REMOTE: &str = "origin";

/// Name git reports for the current branch when HEAD is detached.
pub const DETACHED_HEAD: &str = "HEAD";

/// Paths the editor-configuration mirror never copies.
pub const MIRROR_EXCLUDES: &[&str] = &[
    ".git/",
    "node_modules/",
    ".venv/",
    "venv/",
    "__pycache__/",
    ".DS_Store",
];

/// Returns the default location of the user-level settings file.
///
/// Uses the platform-appropriate configuration directory:
/// - Linux: `~/.config/metarepo/settings.yaml`
/// - macOS: `~/Library/Application Support/metarepo/settings.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\metarepo\settings.yaml`
///
/// Returns `None` when the platform configuration directory cannot be
/// determined; settings then come only from flags, environment and defaults.
pub fn default_settings_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("metarepo").join("settings.yaml"))
}
