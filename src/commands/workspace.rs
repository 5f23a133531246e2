//! # Workspace Command Implementation
//!
//! Shows the workspace identity, where it lives on this device, the editor
//! sync configuration and the registered devices.

use anyhow::Result;
use clap::{Args, Subcommand};

use metarepo::config::{DeviceRegistry, Manifest};
use metarepo::suggestions;

use super::Context;

/// Inspect the workspace
#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub command: WorkspaceSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceSubcommand {
    /// Show workspace information
    Info,
}

/// Execute the `workspace` command.
pub fn execute(args: WorkspaceArgs, ctx: &Context) -> Result<()> {
    match args.command {
        WorkspaceSubcommand::Info => execute_info(ctx),
    }
}

/// Execute the `workspace info` command.
fn execute_info(ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let info = ctx.device()?;
    let registry =
        DeviceRegistry::load(&workspace.layout.devices_file()).map_err(suggestions::explain)?;
    let manifest = Manifest::load_or_default(&workspace.layout.manifest_file())
        .map_err(suggestions::explain)?;
    let config = &workspace.config;

    println!("Workspace Information:");
    println!("  ID:   {}", config.workspace.id);
    println!("  Name: {}", config.workspace.name);
    if let Some(description) = &config.workspace.description {
        println!("  Description: {}", description);
    }
    println!();

    println!("Location:");
    println!("  Device:   {}", super::device_name(&info, &registry));
    println!("  Serial:   {}", info.serial);
    println!("  Path:     {}", workspace.root().display());
    println!("  Platform: {}/{}", info.platform, info.arch);
    println!();

    println!("Sync Configuration:");
    println!("  Enabled: {}", config.sync.enabled);
    if !config.sync.remote.is_empty() {
        println!("  Remote:  {}", config.sync.remote);
    }
    for (editor, paths) in &config.sync.ide {
        println!("  {}: {}", editor, paths.join(", "));
    }
    println!();

    println!("Repositories in manifest: {}", manifest.repositories.len());
    if !config.repos.exclude.is_empty() {
        println!("Excluded: {}", config.repos.exclude.join(", "));
    }
    for (pattern, error) in config.invalid_excludes() {
        eprintln!("Warning: {}", suggestions::invalid_exclude(pattern, &error));
    }
    println!();

    println!("Registered Devices: {}", registry.devices.len());
    for device in &registry.devices {
        if device.serial == info.serial {
            println!("  - {} (current)", device.name);
        } else {
            println!("  - {}", device.name);
        }
    }
    Ok(())
}
