//! # Pull Command Implementation
//!
//! This module implements the `pull` subcommand.
//!
//! ## Functionality
//!
//! - **New repositories**: Clones manifest entries that are missing locally.
//! - **Repositories**: Scans the workspace and pulls every repository that
//!   has a remote and is on a branch.
//! - **Editor configuration**: With `--from <device>`, restores the editor
//!   paths from that device's snapshot into the workspace root.
//! - **Device registry**: Records the sync time for this device.

use anyhow::Result;
use clap::Args;
use log::{debug, warn};

use metarepo::config::{DeviceRegistry, Manifest};
use metarepo::ide_sync::{self, Rsync};
use metarepo::suggestions;
use metarepo::sync::{self, Operation, Record};

use super::{device_name, print_record, print_summary, print_sync_warnings, Context, Progress};

/// Pull all repositories and sync workspace configuration
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Show what would be cloned and pulled without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not restore editor configuration
    #[arg(long)]
    pub skip_config: bool,

    /// Restore editor configuration from this device's snapshot
    #[arg(long, value_name = "DEVICE")]
    pub from: Option<String>,
}

/// Execute the `pull` command.
pub fn execute(args: PullArgs, ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let info = ctx.device()?;
    let devices_file = workspace.layout.devices_file();
    let registry = DeviceRegistry::load(&devices_file).map_err(suggestions::explain)?;
    let device = device_name(&info, &registry);
    let manifest =
        Manifest::load_or_default(&workspace.layout.manifest_file()).map_err(suggestions::explain)?;

    println!("Pulling to device: {} ({})\n", device, info.serial);

    let mut progress = Progress::start("Checking repositories...");
    let mut phase: Option<Operation> = None;
    let report = sync::pull(
        &ctx.git(),
        workspace.root(),
        &manifest,
        &workspace.config.excludes(),
        &ctx.scan_options(),
        args.dry_run,
        &mut |operation: Operation, record: &Record| {
            progress.clear();
            if phase != Some(operation) {
                if phase.is_some() {
                    println!();
                }
                match operation {
                    Operation::Clone => println!("Checking for new repositories..."),
                    _ => println!("Pulling repositories..."),
                }
                phase = Some(operation);
            }
            print_record(&ctx.output, operation, record)
        },
    );
    progress.clear();
    let report = report.map_err(suggestions::explain)?;
    println!();

    if let Some(from) = args.from.as_deref() {
        if !args.skip_config && !args.dry_run {
            println!("Syncing workspace configuration from {}...", from);
            let paths = workspace.config.ide_paths();
            match ide_sync::restore(&Rsync, &workspace.layout, from, &paths) {
                Ok(restored) => {
                    print_sync_warnings(&restored);
                    if restored.is_clean() {
                        println!("Workspace configuration synced.");
                    }
                }
                Err(e) => eprintln!(
                    "Warning: no configuration found for device '{}': {}",
                    from, e
                ),
            }
            println!();
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

    if report.cloned.summary.total() > 0 {
        print_summary(Operation::Clone, &report.cloned.summary, args.dry_run);
        println!();
    }
    print_summary(Operation::Pull, &report.pulled.summary, args.dry_run);
    Ok(())
}
