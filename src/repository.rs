//! # Repository Inspection
//!
//! This module turns a directory containing a `.git` marker into a
//! [`Repository`] record describing its remote, branch, last commit and
//! working-tree state.
//!
//! ## Design
//!
//! Inspection is built around the [`GitOperations`] trait, which separates the
//! decisions made here from the way git is actually invoked. The application
//! uses [`SystemGit`], which shells out to the `git` binary; tests substitute a
//! scripted implementation so that inspector and orchestration behaviour can
//! be checked without a git installation.
//!
//! ## Field tolerance
//!
//! Repositories in a multi-repo workspace are routinely fresh, remoteless,
//! detached or empty. Each query is therefore run independently and a failing
//! query only leaves its own field at the zero value. The only hard failure is
//! a missing marker directory ([`Error::NotARepository`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use log::debug;
use serde::Serialize;

use crate::defaults::{DEFAULT_REMOTE, DETACHED_HEAD};
use crate::error::{Error, Result};
use crate::git;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Run a read-only git query inside `repo` and return standard output.
    fn query(&self, repo: &Path, args: &[&str]) -> Result<String>;

    /// Clone `url` into `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Push the current branch of `repo`.
    fn push(&self, repo: &Path) -> Result<()>;

    /// Pull the current branch of `repo`.
    fn pull(&self, repo: &Path) -> Result<()>;
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
#[derive(Debug, Clone, Default)]
pub struct SystemGit {
    timeout: Option<Duration>,
}

impl SystemGit {
    /// Create a git runner. `timeout` bounds every individual invocation.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl GitOperations for SystemGit {
    fn query(&self, repo: &Path, args: &[&str]) -> Result<String> {
        git::run(repo, args, self.timeout)
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        git::clone(url, dest, self.timeout)
    }

    fn push(&self, repo: &Path) -> Result<()> {
        git::push(repo, self.timeout)
    }

    fn pull(&self, repo: &Path) -> Result<()> {
        git::pull(repo, self.timeout)
    }
}

/// Metadata about the most recent commit. Every field is empty for a
/// repository without commits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    /// Abbreviated commit hash.
    pub hash: String,
    /// Author name.
    pub author: String,
    /// Committer date; `None` when missing or unparsable.
    pub timestamp: Option<DateTime<FixedOffset>>,
    /// Subject line of the commit message.
    pub message: String,
}

/// A repository found in the workspace, rebuilt on every scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    /// Base name of the repository directory.
    pub name: String,
    /// Path relative to the scan root (`.` for the root itself).
    pub relative_path: PathBuf,
    /// Absolute path of the repository directory.
    pub absolute_path: PathBuf,
    /// URL of the `origin` remote, empty when there is none.
    pub remote_url: String,
    /// True iff the remote URL query succeeded.
    pub has_remote: bool,
    /// Current branch, or `HEAD` when detached.
    pub branch: String,
    /// True when HEAD does not point at a branch.
    pub is_detached: bool,
    /// Most recent commit.
    pub last_commit: CommitInfo,
    /// True when `git status --porcelain` printed anything.
    pub has_uncommitted_changes: bool,
}

impl Repository {
    /// Branch name for display, replacing the detached sentinel.
    pub fn display_branch(&self) -> &str {
        if self.is_detached {
            "(detached)"
        } else if self.branch.is_empty() {
            "-"
        } else {
            &self.branch
        }
    }
}

/// Textual format of `git log --format=%ci`.
const COMMIT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Inspect the repository at `path`.
///
/// # Errors
///
/// Returns [`Error::NotARepository`] when `path` has no `.git` marker
/// directory. Individual git query failures never produce an error.
pub fn inspect<G>(git: &G, path: &Path) -> Result<Repository>
where
    G: GitOperations + ?Sized,
{
    if !git::is_repository(path) {
        return Err(Error::NotARepository {
            path: path.to_path_buf(),
        });
    }

    let absolute_path = std::path::absolute(path)?;
    let name = absolute_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| absolute_path.display().to_string());

    let query = |args: &[&str]| -> Option<String> {
        match git.query(&absolute_path, args) {
            Ok(out) => Some(out.trim().to_string()),
            Err(e) => {
                debug!("{}: `git {}` failed: {}", name, args.join(" "), e);
                None
            }
        }
    };

    let remote = query(&["remote", "get-url", DEFAULT_REMOTE]);
    let branch = query(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();
    let is_detached = branch == DETACHED_HEAD;

    let last_commit = CommitInfo {
        hash: query(&["rev-parse", "--short", "HEAD"]).unwrap_or_default(),
        author: query(&["log", "-1", "--format=%an"]).unwrap_or_default(),
        timestamp: query(&["log", "-1", "--format=%ci"])
            .and_then(|date| parse_commit_date(&date)),
        message: query(&["log", "-1", "--format=%s"]).unwrap_or_default(),
    };

    let has_uncommitted_changes = query(&["status", "--porcelain"])
        .map(|status| !status.is_empty())
        .unwrap_or(false);

    Ok(Repository {
        name,
        relative_path: path.to_path_buf(),
        has_remote: remote.is_some(),
        remote_url: remote.unwrap_or_default(),
        branch,
        is_detached,
        last_commit,
        has_uncommitted_changes,
        absolute_path,
    })
}

/// Parse a `%ci` commit date, returning `None` for anything unexpected.
pub fn parse_commit_date(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(text.trim(), COMMIT_DATE_FORMAT).ok()
}
