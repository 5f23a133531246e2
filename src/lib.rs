//! # Metarepo Library
//!
//! This library provides the core functionality for managing a workspace of
//! independently versioned git repositories. It is designed to be used by the
//! `metarepo` command-line tool but can also be integrated into other
//! applications that need to discover and aggregate many repositories.
//!
//! ## Quick Example
//!
//! ```no_run
//! use metarepo::repository::SystemGit;
//! use metarepo::scanner::{self, ScanOptions};
//!
//! let git = SystemGit::new(None);
//! let mut repos = scanner::scan(&git, std::path::Path::new("."), &ScanOptions::default())?;
//! scanner::sort_by_path(&mut repos);
//! for repo in &repos {
//!     println!("{} {}", repo.name, repo.display_branch());
//! }
//! # Ok::<(), metarepo::error::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Discovery (`scanner`, `repository`, `git`)**: Walks a directory tree,
//!   finds repository roots by their `.git` marker directory and inspects
//!   each one by asking `git` for remote, branch, last commit and dirty state.
//!   Inspection tolerates failures field by field.
//! - **Runtimes (`runtimes`)**: Classifies the language ecosystems a
//!   repository uses from its marker files.
//! - **Persisted state (`config`, `workspace`)**: The workspace
//!   configuration, the repository manifest and the device registry, stored
//!   as YAML under `.metarepo/`.
//! - **Orchestration (`sync`)**: Plans and runs clone, push and pull across
//!   every repository, with skip reasons, dry runs and exact counts.
//! - **Devices (`device`, `ide_sync`)**: Identifies the current machine and
//!   mirrors editor configuration per device.
//! - **Ambient (`settings`, `output`, `suggestions`, `error`, `defaults`)**:
//!   Layered runtime settings, terminal output policy, and error reporting.

pub mod config;
pub mod defaults;
pub mod device;
pub mod error;
pub mod git;
pub mod ide_sync;
pub mod output;
pub mod process;
pub mod repository;
pub mod runtimes;
pub mod scanner;
pub mod settings;
pub mod suggestions;
pub mod sync;
pub mod workspace;
