//! # Init Command Implementation
//!
//! This module implements the `init` subcommand, which turns a directory into
//! a metarepo workspace.
//!
//! ## Functionality
//!
//! - **Workspace files**: Writes `.metarepo/config.yaml` with a fresh
//!   workspace id, an empty `manifest.yaml`, and `devices.yaml` containing
//!   this machine.
//! - **Device snapshot directory**: Creates
//!   `.metarepo/workspace-config/<device>/` for editor configuration.
//! - **Prompts**: Asks for the workspace and device names when they were not
//!   given and stdin is a terminal; otherwise uses the directory name and the
//!   hostname.
//! - **Force Mode**: Rewrites an existing configuration, keeping its id.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Input};
use log::{debug, warn};

use metarepo::config::{DeviceRegistry, Manifest, WorkspaceConfig};
use metarepo::output::emoji;
use metarepo::suggestions;
use metarepo::workspace::Layout;

use super::Context;

/// Initialize a new metarepo workspace
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Workspace name (default: directory name)
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Name to register this device under (default: hostname)
    #[arg(long, value_name = "NAME")]
    pub device_name: Option<String>,

    /// Rewrite an existing workspace configuration
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the `init` command.
pub fn execute(args: InitArgs, ctx: &Context) -> Result<()> {
    let root = match &args.path {
        Some(path) => ctx.cwd.join(path),
        None => ctx.cwd.clone(),
    };
    fs::create_dir_all(&root)?;
    let root = std::path::absolute(&root)?;
    let layout = Layout::new(&root);

    let previous = if layout.is_initialized() {
        if !args.force {
            return Err(suggestions::workspace_exists(&root));
        }
        match WorkspaceConfig::load(&layout.config_file()) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(
                    "existing configuration is unreadable, a new id will be generated: {}",
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let interactive = std::io::stdin().is_terminal();
    let default_name = previous
        .as_ref()
        .map(|c| c.workspace.name.clone())
        .unwrap_or_else(|| directory_name(&root));
    let name = choose(args.name, "Workspace name", default_name, interactive)?;

    let info = ctx.device()?;
    let mut registry = DeviceRegistry::load(&layout.devices_file()).map_err(suggestions::explain)?;
    let device_name = match registry.find(&info.serial) {
        Some(existing) => {
            debug!("device already registered as '{}'", existing.name);
            existing.name.clone()
        }
        None => {
            let default_device = info.default_name();
            let device_name = choose(args.device_name, "Device name", default_device, interactive)?;
            registry
                .register(info.to_device(&device_name))
                .map_err(suggestions::explain)?;
            device_name
        }
    };

    let mut config = WorkspaceConfig::new(name, &root);
    if let Some(previous) = previous {
        config.workspace.id = previous.workspace.id;
        config.workspace.description = previous.workspace.description;
        config.repos = previous.repos;
        config.sync = previous.sync;
        config.logging = previous.logging;
    }
    config.save(&layout.config_file())?;

    let manifest_file = layout.manifest_file();
    if !manifest_file.exists() {
        Manifest::default().save(&manifest_file)?;
    }
    registry.save(&layout.devices_file())?;
    fs::create_dir_all(layout.snapshot_dir(&device_name))?;

    let out = &ctx.output;
    println!(
        "{} Initialized workspace '{}' in {}",
        emoji(out, "✅", "[OK]"),
        config.workspace.name,
        root.display()
    );
    println!("  ID:     {}", config.workspace.id);
    println!("  Device: {} ({})", device_name, info.serial);
    println!();
    println!(
        "{} Run `metarepo repo scan` to record the repositories already here",
        emoji(out, "💡", "hint:")
    );
    Ok(())
}

/// Use `given` if present, else prompt on a terminal, else `default`.
fn choose(
    given: Option<String>,
    prompt: &str,
    default: String,
    interactive: bool,
) -> Result<String> {
    if let Some(value) = given.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }
    if !interactive {
        return Ok(default);
    }
    let value: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(default)
        .interact_text()?;
    Ok(value.trim().to_string())
}

fn directory_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workspace".to_string())
}
