//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `metarepo` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`Context`] and performs the command's logic.
//!
//! The [`Context`] carries the settings resolved once at startup, so no
//! command reads flags or environment variables on its own.

pub mod clone;
pub mod completions;
pub mod device;
pub mod init;
pub mod pull;
pub mod push;
pub mod repo;
pub mod version;
pub mod workspace;

use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::ProgressBar;

use metarepo::device::{default_source, DeviceInfo};
use metarepo::error::Error;
use metarepo::output::{self, OutputConfig};
use metarepo::repository::{Repository, SystemGit};
use metarepo::scanner::{self, ScanOptions};
use metarepo::settings::Settings;
use metarepo::suggestions;
use metarepo::sync::{Operation, Outcome, Record, Summary};
use metarepo::workspace::{self as ws, Workspace};

/// State shared by every command.
#[derive(Debug)]
pub struct Context {
    pub settings: Settings,
    pub output: OutputConfig,
    pub cwd: PathBuf,
}

impl Context {
    pub fn new(settings: Settings) -> Result<Self> {
        let output = OutputConfig::from_env_and_flag(&settings.color);
        let cwd = std::env::current_dir()?;
        Ok(Self {
            settings,
            output,
            cwd,
        })
    }

    pub fn git(&self) -> SystemGit {
        SystemGit::new(self.settings.git_timeout)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            jobs: self.settings.jobs,
        }
    }

    /// The workspace this invocation operates on.
    pub fn workspace(&self) -> Result<Workspace> {
        Workspace::locate(self.settings.workspace.as_deref(), &self.cwd)
            .map_err(suggestions::explain)
    }

    /// Directory to scan: the workspace root when there is one, otherwise the
    /// current directory. An explicitly configured workspace must exist.
    pub fn scan_root(&self) -> Result<PathBuf> {
        if self.settings.workspace.is_some() {
            return Ok(self.workspace()?.root().to_path_buf());
        }
        match ws::find_root(&self.cwd) {
            Ok(root) => Ok(root),
            Err(Error::WorkspaceNotFound { .. }) => Ok(self.cwd.clone()),
            Err(e) => Err(suggestions::explain(e)),
        }
    }

    /// Scan `root` with a spinner on stderr, sorted by relative path.
    pub fn scan(&self, root: &Path) -> Result<Vec<Repository>> {
        let mut progress = Progress::start("Scanning repositories...");
        let result = scanner::scan(&self.git(), root, &self.scan_options());
        progress.clear();
        let mut repos = result.map_err(suggestions::explain)?;
        scanner::sort_by_path(&mut repos);
        Ok(repos)
    }

    /// Identity of this machine. Failing to determine it is fatal.
    pub fn device(&self) -> Result<DeviceInfo> {
        DeviceInfo::current(default_source().as_ref()).map_err(suggestions::explain)
    }
}

/// A spinner that disappears on the first line of real output.
pub struct Progress(Option<ProgressBar>);

impl Progress {
    pub fn start(message: &str) -> Self {
        Self(output::spinner(message))
    }

    pub fn clear(&mut self) {
        if let Some(bar) = self.0.take() {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Print one batch record as a status line.
pub fn print_record(out: &OutputConfig, operation: Operation, record: &Record) {
    match &record.outcome {
        Outcome::Skipped(reason) => {
            println!("  {} {} ({})", output::skip(out), record.name, reason)
        }
        Outcome::WouldDo(note) => println!("  {} {} ({})", output::dry(out), record.name, note),
        Outcome::Done => println!(
            "  {} {}... {}",
            output::action(out, operation.label()),
            record.name,
            output::ok(out)
        ),
        Outcome::Failed(_) => println!(
            "  {} {}... {}",
            output::action(out, operation.label()),
            record.name,
            output::failed(out)
        ),
    }
}

/// Print the counts of a batch.
pub fn print_summary(operation: Operation, summary: &Summary, dry_run: bool) {
    let done = match operation {
        Operation::Clone => "Cloned:",
        Operation::Push => "Pushed:",
        Operation::Pull => "Pulled:",
    };
    println!("Summary:");
    println!("  {:<9}{}", done, summary.succeeded);
    println!("  {:<9}{}", "Skipped:", summary.skipped);
    println!("  {:<9}{}", "Errors:", summary.failed);
    if dry_run {
        println!("  (dry run: {} would {})", summary.would, operation.verb());
    }
}

/// Name this machine is registered under, or its default name.
pub fn device_name(info: &DeviceInfo, registry: &metarepo::config::DeviceRegistry) -> String {
    registry
        .find(&info.serial)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| info.default_name())
}

/// Print warnings for editor-configuration paths that failed to sync.
pub fn print_sync_warnings(report: &metarepo::ide_sync::SyncReport) {
    for (path, error) in &report.failed {
        eprintln!("Warning: failed to sync {}: {}", path, error);
    }
}
