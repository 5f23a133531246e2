//! # Device Command Implementation
//!
//! This module implements the `device` subcommand.
//!
//! ## Subcommands
//!
//! - **`info`**: Identity of this machine and whether it is registered with
//!   the current workspace (works outside a workspace)
//! - **`list`**: Devices registered with the workspace, marking this one
//! - **`register`**: Add this machine to the workspace's device registry

use std::fs;

use anyhow::Result;
use clap::{Args, Subcommand};
use log::{debug, warn};

use metarepo::config::{Device, DeviceRegistry};
use metarepo::output::{self, emoji};
use metarepo::suggestions;

use super::Context;

/// Manage devices registered with the workspace
#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[command(subcommand)]
    pub command: DeviceSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum DeviceSubcommand {
    /// Show information about this device
    Info,
    /// List registered devices
    List,
    /// Register this device with the workspace
    Register(RegisterArgs),
}

/// Arguments for the device register command
#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Name for this device (default: hostname)
    pub name: Option<String>,
}

/// Execute the `device` command.
pub fn execute(args: DeviceArgs, ctx: &Context) -> Result<()> {
    match args.command {
        DeviceSubcommand::Info => execute_info(ctx),
        DeviceSubcommand::List => execute_list(ctx),
        DeviceSubcommand::Register(register_args) => execute_register(register_args, ctx),
    }
}

/// Execute the `device info` command.
fn execute_info(ctx: &Context) -> Result<()> {
    let info = ctx.device()?;

    println!("Current Device:");
    println!("  Serial:   {}", info.serial);
    println!("  Platform: {}", info.platform);
    println!("  Arch:     {}", info.arch);
    println!("  Hostname: {}", info.hostname);
    println!("  Username: {}", info.username);
    println!();

    let registered = match ctx.workspace() {
        Ok(workspace) => DeviceRegistry::load(&workspace.layout.devices_file())
            .map_err(suggestions::explain)?
            .find(&info.serial)
            .cloned(),
        Err(e) => {
            debug!("no workspace: {}", e);
            None
        }
    };

    match registered {
        Some(device) => {
            println!("  Registered as: {}", device.name);
            println!(
                "  Registered:    {}",
                device.registered_at.format("%Y-%m-%d %H:%M")
            );
            if let Some(at) = device.last_sync_at {
                println!("  Last sync:     {}", at.format("%Y-%m-%d %H:%M"));
            }
        }
        None => println!("  Status: Not registered in this workspace"),
    }
    Ok(())
}

/// Execute the `device list` command.
fn execute_list(ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let registry =
        DeviceRegistry::load(&workspace.layout.devices_file()).map_err(suggestions::explain)?;

    if registry.devices.is_empty() {
        println!("No devices registered.");
        return Ok(());
    }

    let current = match ctx.device() {
        Ok(info) => Some(info.serial),
        Err(e) => {
            warn!("cannot identify this device: {}", e);
            None
        }
    };

    let rows: Vec<Vec<String>> = registry
        .devices
        .iter()
        .map(|device| device_row(device, current.as_deref()))
        .collect();
    print!(
        "{}",
        output::table(&["NAME", "SERIAL", "PLATFORM", "LAST SYNC"], &rows)
    );
    println!("\n* = current device");
    Ok(())
}

fn device_row(device: &Device, current: Option<&str>) -> Vec<String> {
    let mut name = device.name.clone();
    if current == Some(device.serial.as_str()) {
        name.push_str(" *");
    }
    let last_sync = device
        .last_sync_at
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "never".to_string());
    vec![
        name,
        device.serial.clone(),
        device.platform.clone(),
        last_sync,
    ]
}

/// Execute the `device register` command.
fn execute_register(args: RegisterArgs, ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let info = ctx.device()?;
    let devices_file = workspace.layout.devices_file();
    let mut registry = DeviceRegistry::load(&devices_file).map_err(suggestions::explain)?;

    let name = args
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| info.default_name());
    if let Some(other) = registry.find_by_name(&name) {
        warn!(
            "device name '{}' is already used by serial {}",
            name, other.serial
        );
    }

    registry
        .register(info.to_device(&name))
        .map_err(suggestions::explain)?;
    registry.save(&devices_file)?;
    fs::create_dir_all(workspace.layout.snapshot_dir(&name))?;

    println!(
        "{} Device registered successfully as '{}'",
        emoji(&ctx.output, "✅", "[OK]"),
        name
    );
    println!("  Serial: {}", info.serial);
    Ok(())
}
