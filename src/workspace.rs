//! Workspace root resolution and the `.metarepo/` file layout.

use std::path::{Path, PathBuf};

use log::debug;

use crate::config::WorkspaceConfig;
use crate::defaults::{
    CONFIG_FILE, DEVICES_FILE, MANIFEST_FILE, METAREPO_DIR, WORKSPACE_CONFIG_DIR,
};
use crate::error::{Error, Result};

/// Fixed locations inside a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metarepo_dir(&self) -> PathBuf {
        self.root.join(METAREPO_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.metarepo_dir().join(CONFIG_FILE)
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.metarepo_dir().join(MANIFEST_FILE)
    }

    pub fn devices_file(&self) -> PathBuf {
        self.metarepo_dir().join(DEVICES_FILE)
    }

    /// Editor-configuration snapshot directory of one device.
    pub fn snapshot_dir(&self, device_name: &str) -> PathBuf {
        self.metarepo_dir()
            .join(WORKSPACE_CONFIG_DIR)
            .join(device_name)
    }

    pub fn is_initialized(&self) -> bool {
        self.config_file().is_file()
    }
}

/// Walk from `start` up to the filesystem root looking for a directory that
/// holds `.metarepo/config.yaml`.
pub fn find_root(start: &Path) -> Result<PathBuf> {
    let start = std::path::absolute(start)?;
    for dir in start.ancestors() {
        if Layout::new(dir).is_initialized() {
            debug!("workspace root: {}", dir.display());
            return Ok(dir.to_path_buf());
        }
    }
    Err(Error::WorkspaceNotFound { start })
}

/// An initialized workspace: its layout plus the loaded configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub layout: Layout,
    pub config: WorkspaceConfig,
}

impl Workspace {
    /// Open the workspace rooted exactly at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let layout = Layout::new(std::path::absolute(root)?);
        let config = WorkspaceConfig::load(&layout.config_file())?;
        Ok(Self { layout, config })
    }

    /// Open the workspace at `explicit` if given, otherwise the nearest one at
    /// or above `cwd`.
    pub fn locate(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        match explicit {
            Some(root) => Self::open(root),
            None => Self::open(&find_root(cwd)?),
        }
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }
}
