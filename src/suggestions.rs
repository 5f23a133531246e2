//! # Error Suggestions
//!
//! This module provides helper functions for generating helpful error
//! messages with hints and suggestions. Errors should tell users what went
//! wrong AND how to fix it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metarepo::suggestions;
//!
//! let workspace = Workspace::locate(explicit, &cwd).map_err(suggestions::explain)?;
//! ```

use std::path::Path;

use crate::error::Error;

/// Turn a library error into a command-boundary error, adding hints for the
/// failures a user can do something about.
pub fn explain(error: Error) -> anyhow::Error {
    let hints: &[&str] = match &error {
        Error::WorkspaceNotFound { .. } => &[
            "hint: Run 'metarepo init' to create a workspace here",
            "hint: Use --workspace <DIR> or set METAREPO_WORKSPACE to point at one",
        ],
        Error::ConfigurationMissing { path } if path.ends_with("manifest.yaml") => &[
            "hint: Run 'metarepo repo scan' to record the repositories already present",
            "hint: Run 'metarepo repo add <url>' to declare one",
        ],
        Error::ConfigurationMissing { .. } => {
            &["hint: Run 'metarepo init' to create the workspace files"]
        }
        Error::ConfigurationCorrupt { .. } => &[
            "hint: Fix the YAML by hand, or run 'metarepo init --force' to rewrite the configuration",
        ],
        Error::DeviceIdentity { .. } => {
            &["hint: Set METAREPO_DEVICE_SERIAL to a stable identifier for this machine"]
        }
        Error::AlreadyRegistered { .. } => {
            &["hint: Run 'metarepo device list' to see registered devices"]
        }
        Error::ExternalToolMissing { program, .. } if program == "git" => {
            &["hint: Install git and make sure it is on PATH"]
        }
        _ => &[],
    };

    if hints.is_empty() {
        anyhow::Error::new(error)
    } else {
        anyhow::anyhow!("{}\n\n{}", error, hints.join("\n"))
    }
}

/// `init` found an existing workspace and `--force` was not given.
pub fn workspace_exists(root: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "A metarepo workspace already exists at {root}\n\n\
         hint: Use --force to rewrite its configuration (the workspace id is kept)",
        root = root.display()
    )
}

/// `repo add` was asked for a name the manifest already has.
pub fn repo_already_declared(name: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Repository '{name}' is already in the manifest\n\n\
         hint: Run 'metarepo clone' to check it out if it is missing locally\n\
         hint: Remove its entry from .metarepo/manifest.yaml to declare it again"
    )
}

/// No repository name could be derived from a clone URL.
pub fn unnamed_url(url: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Cannot derive a repository name from '{url}'\n\n\
         hint: Use --path <DIR> to choose the directory name"
    )
}

/// An exclude pattern is not a valid glob. Only exact matching applies to it.
pub fn invalid_exclude(pattern: &str, error: &glob::PatternError) -> String {
    format!(
        "Exclude pattern '{pattern}' is not a valid glob ({error}); only exact names match it\n\
         hint: Use * and ? as wildcards, [abc] for character classes"
    )
}
