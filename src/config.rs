//! # Persisted Workspace State
//!
//! This module defines the three YAML documents kept under `.metarepo/`, and
//! the logic for reading and writing them:
//!
//! - **`WorkspaceConfig`** (`config.yaml`): the singleton workspace record
//!   holding its immutable id, name, root, repository exclude patterns and
//!   editor-sync paths.
//! - **`Manifest`** (`manifest.yaml`): the declared list of repositories the
//!   workspace should contain, in declaration order.
//! - **`DeviceRegistry`** (`devices.yaml`): machines that have synchronized
//!   with the workspace, keyed by hardware serial.
//!
//! ## Persistence
//!
//! Every save rewrites the whole file and every command re-reads it. There is
//! no locking: two invocations racing on one workspace may lose an update.
//!
//! Loading distinguishes a file that is absent ([`Error::ConfigurationMissing`])
//! from one that exists but cannot be parsed ([`Error::ConfigurationCorrupt`]).

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use glob::{Pattern, PatternError};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults::FORMAT_VERSION;
use crate::error::{Error, Result};
use crate::repository::Repository;

/// Read and deserialize a YAML file.
///
/// # Errors
///
/// - [`Error::ConfigurationMissing`] if the file does not exist.
/// - [`Error::ConfigurationCorrupt`] if it exists but does not parse.
/// - [`Error::Io`] for any other read failure.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(Error::ConfigurationMissing {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(e.into()),
    };
    serde_yaml::from_str(&text).map_err(|e| Error::ConfigurationCorrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Serialize `value` as YAML and replace the file at `path`, creating parent
/// directories as needed.
pub fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let text = serde_yaml::to_string(value)?;
    fs::write(path, text)?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Workspace configuration (`config.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "format_version")]
    pub version: String,
    pub workspace: WorkspaceSection,
    #[serde(default)]
    pub repos: ReposSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Identity of the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSection {
    /// Generated once by `init`, never rewritten afterwards.
    pub id: Uuid,
    pub name: String,
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Repository filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReposSection {
    /// Repository names or shell-glob patterns (`temp-*`) to leave alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Editor-configuration synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSection {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    /// Editor name to workspace-relative paths mirrored per device.
    #[serde(default)]
    pub ide: BTreeMap<String, Vec<String>>,
}

impl Default for SyncSection {
    fn default() -> Self {
        let ide = [
            ("claude", ".claude/"),
            ("cursor", ".cursor/"),
            ("vscode", ".vscode/"),
        ]
        .into_iter()
        .map(|(editor, path)| (editor.to_string(), vec![path.to_string()]))
        .collect();
        Self {
            enabled: true,
            remote: String::new(),
            branch: "main".to_string(),
            ide,
        }
    }
}

/// Logging defaults stored with the workspace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

fn format_version() -> String {
    FORMAT_VERSION.to_string()
}

impl WorkspaceConfig {
    /// A fresh configuration with a newly generated id.
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            version: format_version(),
            workspace: WorkspaceSection {
                id: Uuid::new_v4(),
                name: name.into(),
                root: root.into(),
                description: None,
            },
            repos: ReposSection::default(),
            sync: SyncSection::default(),
            logging: LoggingSection::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        load_yaml(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_yaml(path, self)
    }

    /// Compiled exclude patterns.
    pub fn excludes(&self) -> ExcludeSet {
        ExcludeSet::new(&self.repos.exclude)
    }

    /// Exclude patterns that are not valid globs, with their parse errors.
    ///
    /// Matching itself stays lenient (see [`ExcludeSet`]); this is for
    /// reporting.
    pub fn invalid_excludes(&self) -> Vec<(&str, PatternError)> {
        self.repos
            .exclude
            .iter()
            .filter_map(|p| Pattern::new(p).err().map(|e| (p.as_str(), e)))
            .collect()
    }

    /// Every configured editor path, in editor-name order.
    pub fn ide_paths(&self) -> Vec<String> {
        self.sync.ide.values().flatten().cloned().collect()
    }
}

/// Repository names excluded from clone, push and pull.
///
/// A name is excluded when it equals a pattern exactly, or when it matches a
/// pattern as a shell glob. Patterns that are not valid globs still take part
/// in exact matching.
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<(String, Option<Pattern>)>,
}

impl ExcludeSet {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns = patterns
            .iter()
            .map(|p| {
                let raw = p.as_ref().to_string();
                let compiled = match Pattern::new(&raw) {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        debug!(
                            "exclude pattern '{}' is not a glob ({}), matching exactly",
                            raw, e
                        );
                        None
                    }
                };
                (raw, compiled)
            })
            .collect();
        Self { patterns }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.patterns.iter().any(|(raw, compiled)| {
            raw == name || compiled.as_ref().is_some_and(|p| p.matches(name))
        })
    }
}

/// Repository manifest (`manifest.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default = "format_version")]
    pub version: String,
    /// Rewritten on every save.
    pub generated: DateTime<Utc>,
    #[serde(default)]
    pub repositories: Vec<ManifestEntry>,
}

/// One declared repository. `name` is unique within a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    /// Workspace-relative path; empty means "same as name".
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl ManifestEntry {
    /// Build an entry from a scanned repository.
    pub fn from_repository(repo: &Repository) -> Self {
        Self {
            name: repo.name.clone(),
            path: repo.relative_path.to_string_lossy().into_owned(),
            url: repo.remote_url.clone(),
            branch: repo.branch.clone(),
            tags: Vec::new(),
            description: String::new(),
        }
    }

    /// Where this repository lives (or should live) under `root`.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        if self.path.is_empty() {
            root.join(&self.name)
        } else {
            root.join(&self.path)
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: format_version(),
            generated: Utc::now(),
            repositories: Vec::new(),
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        load_yaml(path)
    }

    /// Load the manifest, or start an empty one if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::ConfigurationMissing { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Stamp the generation time and rewrite the file.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.generated = Utc::now();
        save_yaml(path, self)
    }

    pub fn find(&self, name: &str) -> Option<&ManifestEntry> {
        self.repositories.iter().find(|e| e.name == name)
    }

    /// Append `entry`, returning `false` (and leaving the manifest unchanged)
    /// if an entry with that name already exists.
    pub fn add(&mut self, entry: ManifestEntry) -> bool {
        if self.find(&entry.name).is_some() {
            return false;
        }
        self.repositories.push(entry);
        true
    }

    /// Replace the entries with the result of a scan.
    ///
    /// The new list is sorted by path. Tags and descriptions of entries whose
    /// name survives the scan are carried over; the first repository found for
    /// a duplicated name wins.
    pub fn replace_with_scan(&mut self, repos: &[Repository]) {
        let mut previous: BTreeMap<String, ManifestEntry> = self
            .repositories
            .drain(..)
            .map(|e| (e.name.clone(), e))
            .collect();

        let mut sorted: Vec<&Repository> = repos.iter().collect();
        sorted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        for repo in sorted {
            let mut entry = ManifestEntry::from_repository(repo);
            if let Some(old) = previous.remove(&entry.name) {
                entry.tags = old.tags;
                entry.description = old.description;
            }
            if !self.add(entry) {
                debug!(
                    "manifest already has '{}', keeping the first one",
                    repo.name
                );
            }
        }
    }
}

/// Device registry (`devices.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRegistry {
    #[serde(default = "format_version")]
    pub version: String,
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// A machine registered with the workspace. `serial` is the identity; names
/// are labels and may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub serial: String,
    pub name: String,
    pub platform: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    pub registered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self {
            version: format_version(),
            devices: Vec::new(),
        }
    }
}

impl DeviceRegistry {
    /// Load the registry. A missing file is an empty registry.
    pub fn load(path: &Path) -> Result<Self> {
        match load_yaml(path) {
            Err(Error::ConfigurationMissing { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_yaml(path, self)
    }

    pub fn find(&self, serial: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.serial == serial)
    }

    /// Find a device by its human label. With duplicate names the first
    /// registered device wins.
    pub fn find_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    /// Add a device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyRegistered`] if the serial is already present.
    pub fn register(&mut self, device: Device) -> Result<()> {
        if let Some(existing) = self.find(&device.serial) {
            return Err(Error::AlreadyRegistered {
                name: existing.name.clone(),
                serial: existing.serial.clone(),
            });
        }
        self.devices.push(device);
        Ok(())
    }

    /// Stamp `last_sync_at` for `serial`. Returns `false` if the device is not
    /// registered.
    pub fn touch(&mut self, serial: &str, at: DateTime<Utc>) -> bool {
        match self.devices.iter_mut().find(|d| d.serial == serial) {
            Some(device) => {
                device.last_sync_at = Some(at);
                true
            }
            None => false,
        }
    }
}
