//! # Clone Command Implementation
//!
//! Clones every repository declared in the manifest that is not present
//! locally yet, typically when setting up a new device. Entries that already
//! exist, have no URL, or match an exclude pattern are skipped with the reason
//! printed.

use anyhow::Result;
use clap::Args;

use metarepo::config::Manifest;
use metarepo::suggestions;
use metarepo::sync::{self, Operation, Record};

use super::{print_record, print_summary, Context};

/// Clone all repositories from the manifest
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Show what would be cloned without cloning
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the `clone` command.
pub fn execute(args: CloneArgs, ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let manifest = Manifest::load(&workspace.layout.manifest_file()).map_err(suggestions::explain)?;

    if manifest.repositories.is_empty() {
        println!("No repositories in manifest.");
        return Ok(());
    }
    println!(
        "Found {} repositories in manifest\n",
        manifest.repositories.len()
    );

    let report = sync::clone_missing(
        &ctx.git(),
        workspace.root(),
        &manifest,
        &workspace.config.excludes(),
        args.dry_run,
        &mut |record: &Record| print_record(&ctx.output, Operation::Clone, record),
    );

    println!();
    print_summary(Operation::Clone, &report.summary, args.dry_run);
    Ok(())
}
