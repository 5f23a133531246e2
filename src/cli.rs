//! CLI argument parsing and command dispatch
//!
//! The full command table is declared once here and dispatched from
//! [`Cli::execute`], after settings have been resolved and logging installed.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use metarepo::settings::{Overrides, Settings};
use metarepo::suggestions;

use crate::commands::{self, Context};

/// Metarepo - Manage a workspace of git repositories across devices
#[derive(Parser, Debug)]
#[command(name = "metarepo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Workspace root (default: nearest directory with .metarepo/ above the
    /// current one) [env: METAREPO_WORKSPACE]
    #[arg(long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Repositories inspected in parallel while scanning [env: METAREPO_JOBS]
    #[arg(short, long, global = true, value_name = "N")]
    jobs: Option<usize>,

    /// Give up on any single git invocation after this many seconds
    /// [env: METAREPO_GIT_TIMEOUT]
    #[arg(long, global = true, value_name = "SECS")]
    git_timeout: Option<u64>,

    /// User settings file (default: <config dir>/metarepo/settings.yaml)
    #[arg(long, global = true, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", value_parser = ["always", "never", "auto"])]
    color: Option<String>,

    /// Set log level (error, warn, info, debug, trace) [env: METAREPO_LOG]
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a workspace in the given directory (default: current)
    Init(commands::init::InitArgs),

    /// Clone every manifest repository that is missing locally
    Clone(commands::clone::CloneArgs),

    /// Push all repositories and snapshot this device's editor configuration
    Push(commands::push::PushArgs),

    /// Clone missing repositories, pull all, optionally restore editor configuration
    Pull(commands::pull::PullArgs),

    /// Inspect and declare repositories
    Repo(commands::repo::RepoArgs),

    /// Show and register devices
    Device(commands::device::DeviceArgs),

    /// Show workspace information
    Workspace(commands::workspace::WorkspaceArgs),

    /// Print version, commit and build date
    Version,

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            workspace: self.workspace.clone(),
            jobs: self.jobs,
            git_timeout: self.git_timeout,
            log_level: self.log_level.clone(),
            color: self.color.clone(),
            settings_file: self.settings.clone(),
        }
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let settings = Settings::load(&self.overrides()).map_err(suggestions::explain)?;
        init_logging(&settings.log_filter);
        log::debug!("settings: {:?}", settings);
        let ctx = Context::new(settings)?;

        match self.command {
            Commands::Init(args) => commands::init::execute(args, &ctx),
            Commands::Clone(args) => commands::clone::execute(args, &ctx),
            Commands::Push(args) => commands::push::execute(args, &ctx),
            Commands::Pull(args) => commands::pull::execute(args, &ctx),
            Commands::Repo(args) => commands::repo::execute(args, &ctx),
            Commands::Device(args) => commands::device::execute(args, &ctx),
            Commands::Workspace(args) => commands::workspace::execute(args, &ctx),
            Commands::Version => commands::version::execute(),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Install `env_logger` writing to stderr with the given filter directives.
fn init_logging(filter: &str) {
    let _ = env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .try_init();
}
