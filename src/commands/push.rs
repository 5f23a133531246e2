//! # Push Command Implementation
//!
//! This module implements the `push` subcommand.
//!
//! ## Functionality
//!
//! - **Repositories**: Scans the workspace and pushes every repository that
//!   has a remote and is on a branch. Others are skipped with the reason.
//! - **Editor configuration**: Snapshots the configured editor paths into
//!   this device's `.metarepo/workspace-config/<device>/` directory, unless
//!   `--skip-config` is given or sync is disabled in the configuration.
//! - **Device registry**: Records the sync time for this device.
//!
//! In dry-run mode every decision is made and reported, but nothing is pushed,
//! copied or written.

use anyhow::Result;
use clap::Args;
use log::{debug, warn};

use metarepo::config::DeviceRegistry;
use metarepo::ide_sync::{self, Rsync};
use metarepo::suggestions;
use metarepo::sync::{self, Operation, Record};

use super::{device_name, print_record, print_summary, print_sync_warnings, Context, Progress};

/// Push all repositories and sync workspace configuration
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Show what would be pushed without pushing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not snapshot editor configuration
    #[arg(long)]
    pub skip_config: bool,
}

/// Execute the `push` command.
pub fn execute(args: PushArgs, ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let info = ctx.device()?;
    let devices_file = workspace.layout.devices_file();
    let registry = DeviceRegistry::load(&devices_file).map_err(suggestions::explain)?;
    let device = device_name(&info, &registry);

    println!("Pushing from device: {} ({})\n", device, info.serial);

    let mut progress = Progress::start("Scanning repositories...");
    let report = sync::push(
        &ctx.git(),
        workspace.root(),
        &workspace.config.excludes(),
        &ctx.scan_options(),
        args.dry_run,
        &mut |record: &Record| {
            progress.clear();
            print_record(&ctx.output, Operation::Push, record)
        },
    );
    progress.clear();
    let report = report.map_err(suggestions::explain)?;
    if report.records.is_empty() {
        println!("No repositories found.");
    }
    println!();

    if !args.skip_config && !args.dry_run {
        if workspace.config.sync.enabled {
            println!("Syncing workspace configuration...");
            let synced = ide_sync::snapshot(
                &Rsync,
                &workspace.layout,
                &device,
                &workspace.config.ide_paths(),
            );
            print_sync_warnings(&synced);
            if synced.is_clean() {
                println!("Workspace configuration synced.");
            }
            println!();
        } else {
            debug!("editor configuration sync is disabled");
        }
    }

    if !args.dry_run {
        match sync::record_sync(&devices_file, &info.serial) {
            Ok(true) => {}
            Ok(false) => debug!(
                "device {} is not registered, sync time not recorded",
                info.serial
            ),
            Err(e) => warn!("could not record sync time: {}", e),
        }
    }

    print_summary(Operation::Push, &report.summary, args.dry_run);
    Ok(())
}
