//! # Repo Command Implementation
//!
//! This module implements the `repo` subcommand and its children.
//!
//! ## Subcommands
//!
//! - **`list`**: Table of discovered repositories with branch and last commit
//!   (`--short` for names only, `--runtimes` for detected ecosystems, `--json`)
//! - **`status`**: Clean/modified state and remote presence of each repository
//! - **`add`**: Clone a repository into the workspace and declare it in the
//!   manifest
//! - **`scan`**: Rebuild the manifest from the repositories on disk
//! - **`runtimes`**: Language ecosystems and pinned versions per repository
//!
//! `list`, `status` and `runtimes` work outside a workspace too, scanning the
//! current directory.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use log::warn;
use serde::Serialize;

use metarepo::config::{Manifest, ManifestEntry};
use metarepo::git;
use metarepo::output::{self, emoji, paint, Tone};
use metarepo::repository::{self, GitOperations, Repository};
use metarepo::runtimes::{self, RuntimeInfo};
use metarepo::suggestions;

use super::Context;

/// Manage repositories in the workspace
#[derive(Args, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RepoSubcommand {
    /// List repositories
    List(ListArgs),
    /// Show the state of every repository
    Status(StatusArgs),
    /// Clone a repository and add it to the manifest
    Add(AddArgs),
    /// Rebuild the manifest from the repositories on disk
    Scan,
    /// Show detected language runtimes
    Runtimes,
}

/// Arguments for the repo list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print repository names only
    #[arg(short, long, conflicts_with = "json")]
    pub short: bool,

    /// Show detected language runtimes instead of the last commit
    #[arg(short, long)]
    pub runtimes: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the repo status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the repo add command
#[derive(Args, Debug)]
pub struct AddArgs {
    /// URL to clone
    pub url: String,

    /// Workspace-relative directory to clone into (default: repository name)
    #[arg(long, value_name = "DIR")]
    pub path: Option<PathBuf>,
}

/// A scanned repository with its runtimes, for JSON output.
#[derive(Serialize)]
struct Listed<'a> {
    #[serde(flatten)]
    repo: &'a Repository,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtimes: Option<Vec<RuntimeInfo>>,
}

/// Execute the `repo` command.
pub fn execute(args: RepoArgs, ctx: &Context) -> Result<()> {
    match args.command {
        RepoSubcommand::List(list_args) => execute_list(list_args, ctx),
        RepoSubcommand::Status(status_args) => execute_status(status_args, ctx),
        RepoSubcommand::Add(add_args) => execute_add(add_args, ctx),
        RepoSubcommand::Scan => execute_scan(ctx),
        RepoSubcommand::Runtimes => execute_runtimes(ctx),
    }
}

/// Execute the `repo list` command.
fn execute_list(args: ListArgs, ctx: &Context) -> Result<()> {
    let root = ctx.scan_root()?;
    let repos = ctx.scan(&root)?;

    if args.json {
        let listed: Vec<Listed> = repos
            .iter()
            .map(|repo| Listed {
                repo,
                runtimes: args
                    .runtimes
                    .then(|| runtimes::detect(&repo.absolute_path)),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }

    if args.short {
        for repo in &repos {
            println!("{}", repo.name);
        }
        return Ok(());
    }

    let (headers, rows): ([&str; 4], Vec<Vec<String>>) = if args.runtimes {
        (
            ["NAME", "BRANCH", "RUNTIMES", "PATH"],
            repos
                .iter()
                .map(|repo| {
                    vec![
                        repo.name.clone(),
                        repo.display_branch().to_string(),
                        runtimes::summarize(&runtimes::detect(&repo.absolute_path)),
                        repo.relative_path.display().to_string(),
                    ]
                })
                .collect(),
        )
    } else {
        (
            ["NAME", "BRANCH", "LAST COMMIT", "PATH"],
            repos
                .iter()
                .map(|repo| {
                    vec![
                        repo.name.clone(),
                        repo.display_branch().to_string(),
                        commit_date(repo),
                        repo.relative_path.display().to_string(),
                    ]
                })
                .collect(),
        )
    };

    print!("{}", output::table(&headers, &rows));
    println!("\nTotal: {} repositories", repos.len());
    Ok(())
}

fn commit_date(repo: &Repository) -> String {
    repo.last_commit
        .timestamp
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Execute the `repo status` command.
fn execute_status(args: StatusArgs, ctx: &Context) -> Result<()> {
    let root = ctx.scan_root()?;
    let repos = ctx.scan(&root)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&repos)?);
        return Ok(());
    }

    if repos.is_empty() {
        println!("No repositories found.");
        return Ok(());
    }

    let out = &ctx.output;
    let rows: Vec<Vec<String>> = repos
        .iter()
        .map(|repo| {
            let status = if repo.has_uncommitted_changes {
                paint(out, "modified", Tone::Bad)
            } else {
                paint(out, "clean", Tone::Good)
            };
            let remote = if repo.has_remote { "yes" } else { "no" };
            vec![
                repo.name.clone(),
                repo.display_branch().to_string(),
                status,
                remote.to_string(),
            ]
        })
        .collect();

    let modified = repos.iter().filter(|r| r.has_uncommitted_changes).count();
    print!(
        "{}",
        output::table(&["NAME", "BRANCH", "STATUS", "REMOTE"], &rows)
    );
    println!(
        "\nTotal: {} repositories ({} clean, {} modified)",
        repos.len(),
        repos.len() - modified,
        modified
    );
    Ok(())
}

/// Execute the `repo add` command.
fn execute_add(args: AddArgs, ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let manifest_file = workspace.layout.manifest_file();
    let mut manifest = Manifest::load_or_default(&manifest_file).map_err(suggestions::explain)?;

    let name = git::repo_name_from_url(&args.url)
        .or_else(|| {
            args.path
                .as_ref()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
        })
        .ok_or_else(|| suggestions::unnamed_url(&args.url))?;
    if manifest.find(&name).is_some() {
        return Err(suggestions::repo_already_declared(&name));
    }

    let relative = args.path.unwrap_or_else(|| PathBuf::from(&name));
    let dest = workspace.root().join(&relative);

    println!("Cloning {}...", args.url);
    let runner = ctx.git();
    runner
        .clone_repo(&args.url, &dest)
        .map_err(suggestions::explain)?;

    let mut entry = match repository::inspect(&runner, &dest) {
        Ok(repo) => ManifestEntry::from_repository(&repo),
        Err(e) => {
            warn!("could not inspect {}: {}", dest.display(), e);
            ManifestEntry {
                name: name.clone(),
                path: String::new(),
                url: String::new(),
                branch: String::new(),
                tags: Vec::new(),
                description: String::new(),
            }
        }
    };
    entry.name = name.clone();
    entry.path = relative.to_string_lossy().into_owned();
    entry.url = args.url.clone();
    manifest.add(entry);
    manifest.save(&manifest_file)?;

    println!(
        "{} Repository '{}' added successfully.",
        emoji(&ctx.output, "✅", "[OK]"),
        name
    );
    Ok(())
}

/// Execute the `repo scan` command.
fn execute_scan(ctx: &Context) -> Result<()> {
    let workspace = ctx.workspace()?;
    let manifest_file = workspace.layout.manifest_file();
    let mut manifest = Manifest::load_or_default(&manifest_file).map_err(suggestions::explain)?;

    println!("Scanning for repositories...");
    let repos = ctx.scan(workspace.root())?;
    manifest.replace_with_scan(&repos);
    manifest.save(&manifest_file)?;

    println!(
        "Found and registered {} repositories.",
        manifest.repositories.len()
    );
    Ok(())
}

/// Execute the `repo runtimes` command.
fn execute_runtimes(ctx: &Context) -> Result<()> {
    let root = ctx.scan_root()?;
    let repos = ctx.scan(&root)?;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut any = false;
    for repo in &repos {
        let detected = runtimes::detect(&repo.absolute_path);
        if detected.is_empty() {
            continue;
        }
        any = true;
        println!("{}:", repo.name);
        for rt in &detected {
            let version = if rt.version.is_empty() {
                "(unknown)"
            } else {
                rt.version.as_str()
            };
            println!("  {} {}", rt.language, version);
            println!("    files: {}", rt.files.join(", "));
            *counts.entry(rt.language.clone()).or_default() += 1;
        }
        println!();
    }

    if !any {
        println!("No runtimes detected.");
        return Ok(());
    }

    println!("Summary:");
    for (language, count) in &counts {
        println!("  {}: {} repos", language, count);
    }
    Ok(())
}
