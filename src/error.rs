//! # Error Handling
//!
//! This module defines the centralized error type for the `metarepo`
//! library. It uses the `thiserror` library to create a single `Error` enum
//! covering every failure the core can report, with messages meant to be shown
//! to a user as-is.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into a few groups:
//!   - repository identity (`NotARepository`)
//!   - external tools (`ExternalTool`, `ExternalToolTimeout`,
//!     `ExternalToolMissing`)
//!   - persisted state (`ConfigurationMissing`, `ConfigurationCorrupt`)
//!   - devices (`AlreadyRegistered`, `DeviceIdentity`)
//!   - workspace layout (`ScanRoot`, `WorkspaceNotFound`)
//!   - wrapped library errors (`Io`, `Yaml`)
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Skip decisions made by the orchestration layer (no remote, detached HEAD,
//! and so on) are not errors and live in [`crate::sync::SkipReason`].

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Main error type for metarepo operations
#[derive(Error, Debug)]
pub enum Error {
    /// The candidate directory has no `.git` marker directory.
    #[error("not a git repository: {}", path.display())]
    NotARepository { path: PathBuf },

    /// An external command ran but exited unsuccessfully.
    ///
    /// Standard error of the command is discarded; only the exit status is kept.
    #[error("{program} {args} failed ({status})")]
    ExternalTool {
        program: String,
        args: String,
        status: ExitStatus,
    },

    /// An external command did not finish within the configured timeout and
    /// was killed.
    #[error("{program} {args} timed out after {timeout:?}")]
    ExternalToolTimeout {
        program: String,
        args: String,
        timeout: Duration,
    },

    /// An external command could not be started at all.
    #[error("could not run {program}: {message}")]
    ExternalToolMissing { program: String, message: String },

    /// An expected persisted file does not exist.
    #[error("configuration file not found: {}", path.display())]
    ConfigurationMissing { path: PathBuf },

    /// A persisted file exists but cannot be parsed.
    #[error("configuration file {} is malformed: {message}", path.display())]
    ConfigurationCorrupt { path: PathBuf, message: String },

    /// The device serial is already present in the registry.
    #[error("device already registered as '{name}' ({serial})")]
    AlreadyRegistered { name: String, serial: String },

    /// The hardware identifier of this machine could not be determined.
    #[error("failed to determine device identity: {message}")]
    DeviceIdentity { message: String },

    /// The scan root does not exist or is not a directory.
    #[error("cannot scan {}: {message}", path.display())]
    ScanRoot { path: PathBuf, message: String },

    /// No `.metarepo/config.yaml` was found at or above the start directory.
    #[error("not in a metarepo workspace (searched upwards from {})", start.display())]
    WorkspaceNotFound { start: PathBuf },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML error, wrapped from `serde_yaml::Error`.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
