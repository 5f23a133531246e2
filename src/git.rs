//! Thin wrappers over the system `git` binary.
//!
//! All version-control work is delegated to `git` itself, which automatically
//! handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers
//! - Personal access tokens
//! - Any authentication configured in ~/.gitconfig

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::defaults::MARKER_DIR;
use crate::error::Result;
use crate::process;

const GIT: &str = "git";

/// Check whether `path` directly contains the `.git` marker directory.
///
/// The marker is authoritative: nothing else about the directory is looked at.
/// A `.git` *file* (as used by linked worktrees) does not count.
pub fn is_repository(path: &Path) -> bool {
    fs::metadata(path.join(MARKER_DIR))
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Run a git query in `repo` and return its standard output.
pub fn run(repo: &Path, args: &[&str], timeout: Option<Duration>) -> Result<String> {
    process::capture(GIT, args, Some(repo), timeout)
}

/// Clone `url` into `dest`, creating missing parent directories first.
///
/// Progress and credential prompts go straight to the terminal.
pub fn clone(url: &str, dest: &Path, timeout: Option<Duration>) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    process::interactive(
        GIT,
        [OsStr::new("clone"), OsStr::new(url), dest.as_os_str()],
        None,
        timeout,
    )
}

/// Push the current branch of `repo` to its upstream.
pub fn push(repo: &Path, timeout: Option<Duration>) -> Result<()> {
    process::capture(GIT, ["push"], Some(repo), timeout).map(|_| ())
}

/// Pull the current branch of `repo` from its upstream.
pub fn pull(repo: &Path, timeout: Option<Duration>) -> Result<()> {
    process::capture(GIT, ["pull"], Some(repo), timeout).map(|_| ())
}

/// Derive a repository name from a clone URL.
///
/// Handles regular URLs (`https://host/org/name.git`) through the `url` crate
/// and falls back to plain path splitting for scp-like addresses
/// (`git@host:org/name.git`) and local paths.
pub fn repo_name_from_url(address: &str) -> Option<String> {
    let trimmed = address.trim().trim_end_matches('/');
    let last = match url::Url::parse(trimmed) {
        Ok(parsed) if parsed.has_host() || parsed.scheme() == "file" => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        _ => trimmed
            .rsplit(|c| c == '/' || c == ':' || c == '\\')
            .next()
            .map(str::to_string),
    }?;

    let name = last.strip_suffix(".git").unwrap_or(&last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
