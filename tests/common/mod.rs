//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a workspace fixture, git helpers, and a preconfigured
//! `metarepo` command so each test file stays focused on behavior.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().initialized();
//!     fixture.command().args(["repo", "list"]).assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::git;
    pub use super::TestFixture;
    #[allow(unused_imports)]
    pub use super::SERIAL;
}

/// Device serial every fixture command runs with.
pub const SERIAL: &str = "TEST-SERIAL-0001";

/// Git helpers for building repositories on disk.
#[allow(dead_code)]
pub mod git {
    use super::*;

    fn run(dir: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    /// Initialize a repository on `main` with a throwaway identity.
    pub fn init(dir: &Path) {
        std::fs::create_dir_all(dir).expect("failed to create repository directory");
        run(dir, &["init", "-b", "main"]);
        configure(dir);
    }

    /// Set a throwaway identity on an existing repository.
    pub fn configure(dir: &Path) {
        run(dir, &["config", "user.email", "test@example.com"]);
        run(dir, &["config", "user.name", "Test User"]);
        run(dir, &["config", "commit.gpgsign", "false"]);
    }

    /// Write `files` and commit them.
    pub fn commit(dir: &Path, files: &[(&str, &str)], message: &str) {
        for (path, content) in files {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("failed to create parent directory");
            }
            std::fs::write(full, content).expect("failed to write file");
        }
        run(dir, &["add", "."]);
        run(dir, &["commit", "-m", message]);
    }

    /// Initialize a repository with one commit.
    pub fn init_with_commit(dir: &Path) {
        init(dir);
        commit(dir, &[("README.md", "# test\n")], "Initial commit");
    }

    /// Point `origin` at `url`.
    pub fn add_origin(dir: &Path, url: &str) {
        run(dir, &["remote", "add", "origin", url]);
    }

    /// Create a bare repository to act as a remote.
    pub fn bare(dir: &Path) {
        std::fs::create_dir_all(dir).expect("failed to create bare directory");
        run(dir, &["init", "--bare", "-b", "main"]);
    }

    /// Push `main` to `origin` and track it.
    pub fn push_upstream(dir: &Path) {
        run(dir, &["push", "-u", "origin", "main"]);
    }

    /// Detach HEAD at the current commit.
    pub fn detach(dir: &Path) {
        run(dir, &["checkout", "--detach"]);
    }
}

/// A temporary directory that can be turned into a metarepo workspace.
///
/// Commands created from the fixture run inside the directory with a fixed
/// device serial, no colors, and a private home so user settings on the
/// machine running the tests are never read.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new().initialized();
/// fixture.command().args(["device", "list"]).assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    home: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            home: assert_fs::TempDir::new().expect("Failed to create home directory"),
        }
    }

    /// Run `metarepo init` in the fixture with fixed names.
    pub fn initialized(self) -> Self {
        self.command()
            .args(["init", "--name", "test-ws", "--device-name", "laptop"])
            .assert()
            .success();
        self
    }

    /// Add a file with the given path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Path of a file under `.metarepo/`.
    #[allow(dead_code)]
    pub fn metarepo_file(&self, name: &str) -> PathBuf {
        self.path().join(".metarepo").join(name)
    }

    /// Read a file under `.metarepo/`.
    #[allow(dead_code)]
    pub fn read_metarepo_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.metarepo_file(name)).expect("Failed to read metarepo file")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("metarepo");
        cmd.current_dir(self.path())
            .env("METAREPO_DEVICE_SERIAL", SERIAL)
            .env("NO_COLOR", "1")
            .env("HOME", self.home.path())
            .env("XDG_CONFIG_HOME", self.home.path())
            .env_remove("METAREPO_WORKSPACE")
            .env_remove("METAREPO_JOBS")
            .env_remove("METAREPO_GIT_TIMEOUT")
            .env_remove("METAREPO_LOG")
            .env_remove("RUST_LOG")
            .write_stdin("");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_file() {
        let fixture = TestFixture::new().with_file("test.txt", "hello");
        assert!(fixture.path().join("test.txt").exists());
    }
}
