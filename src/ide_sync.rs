//! # Editor Configuration Sync
//!
//! Editor settings directories (`.cursor/`, `.claude/`, `.vscode/` and any
//! other configured path) are mirrored per device into
//! `.metarepo/workspace-config/<device>/`, so that one machine's setup can be
//! restored on another.
//!
//! The copy itself is delegated to a [`Mirror`]; the application uses
//! [`Rsync`], which runs `rsync -a --delete` with a fixed exclusion list.
//!
//! Failures here never affect repository results. Callers report them as
//! warnings.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::defaults::MIRROR_EXCLUDES;
use crate::error::{Error, Result};
use crate::process;
use crate::workspace::Layout;

/// Something that can make `dest` an exact copy of `src`.
pub trait Mirror {
    /// Mirror `src` into `dest`, deleting entries of `dest` that are absent
    /// from `src`. Both are directories or both are files.
    fn mirror(&self, src: &Path, dest: &Path) -> Result<()>;
}

/// Mirror through the `rsync` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rsync;

impl Rsync {
    /// Arguments passed to `rsync` for one copy.
    pub fn args(src: &Path, dest: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-a".into(), "--delete".into()];
        for exclude in MIRROR_EXCLUDES {
            args.push("--exclude".into());
            args.push((*exclude).into());
        }
        if src.is_dir() {
            // Trailing slashes copy directory contents instead of nesting.
            args.push(with_trailing_slash(src));
            args.push(with_trailing_slash(dest));
        } else {
            args.push(src.as_os_str().to_os_string());
            args.push(dest.as_os_str().to_os_string());
        }
        args
    }
}

impl Mirror for Rsync {
    fn mirror(&self, src: &Path, dest: &Path) -> Result<()> {
        process::capture("rsync", Self::args(src, dest), None, None).map(|_| ())
    }
}

fn with_trailing_slash(path: &Path) -> OsString {
    let mut s = path.as_os_str().to_os_string();
    if !s.to_string_lossy().ends_with('/') {
        s.push("/");
    }
    s
}

/// What happened to each configured path.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub synced: Vec<String>,
    /// Paths with nothing to copy from.
    pub missing: Vec<String>,
    pub failed: Vec<(String, Error)>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Copy each configured path from the workspace root into the snapshot
/// directory of `device_name`.
pub fn snapshot(
    mirror: &dyn Mirror,
    layout: &Layout,
    device_name: &str,
    paths: &[String],
) -> SyncReport {
    let target = layout.snapshot_dir(device_name);
    transfer(mirror, layout.root(), &target, paths)
}

/// Copy each configured path from the snapshot directory of `from_device`
/// back into the workspace root.
///
/// # Errors
///
/// Returns [`Error::ConfigurationMissing`] if `from_device` has no snapshot.
pub fn restore(
    mirror: &dyn Mirror,
    layout: &Layout,
    from_device: &str,
    paths: &[String],
) -> Result<SyncReport> {
    let source = layout.snapshot_dir(from_device);
    if !source.is_dir() {
        return Err(Error::ConfigurationMissing { path: source });
    }
    Ok(transfer(mirror, &source, layout.root(), paths))
}

fn transfer(mirror: &dyn Mirror, from: &Path, to: &Path, paths: &[String]) -> SyncReport {
    let mut report = SyncReport::default();
    for rel in paths {
        let src = from.join(rel.trim_end_matches('/'));
        let dest = to.join(rel.trim_end_matches('/'));
        if !src.exists() {
            debug!("nothing to sync at {}", src.display());
            report.missing.push(rel.clone());
            continue;
        }
        match prepare(&src, &dest).and_then(|()| mirror.mirror(&src, &dest)) {
            Ok(()) => report.synced.push(rel.clone()),
            Err(e) => {
                warn!("failed to sync {}: {}", rel, e);
                report.failed.push((rel.clone(), e));
            }
        }
    }
    report
}

fn prepare(src: &Path, dest: &Path) -> Result<()> {
    let dir: PathBuf = if src.is_dir() {
        dest.to_path_buf()
    } else {
        match dest.parent() {
            Some(parent) => parent.to_path_buf(),
            None => return Ok(()),
        }
    };
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recording {
        calls: RefCell<Vec<(PathBuf, PathBuf)>>,
        fail_on: Option<&'static str>,
    }

    impl Mirror for Recording {
        fn mirror(&self, src: &Path, dest: &Path) -> Result<()> {
            self.calls
                .borrow_mut()
                .push((src.to_path_buf(), dest.to_path_buf()));
            if self.fail_on.is_some_and(|name| src.ends_with(name)) {
                return Err(Error::ExternalToolMissing {
                    program: "rsync".to_string(),
                    message: "not found".to_string(),
                });
            }
            Ok(())
        }
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rsync_args_for_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join(".vscode");
        fs::create_dir(&src).unwrap();
        let dest = temp.path().join("snap/.vscode");

        let args = Rsync::args(&src, &dest);
        assert_eq!(args[0], "-a");
        assert_eq!(args[1], "--delete");
        assert!(args.iter().any(|a| a == "node_modules/"));
        assert!(args.iter().any(|a| a == ".DS_Store"));
        let n = args.len();
        assert!(args[n - 2].to_string_lossy().ends_with(".vscode/"));
        assert!(args[n - 1].to_string_lossy().ends_with("snap/.vscode/"));
    }

    #[test]
    fn test_rsync_args_for_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join(".editorconfig");
        fs::write(&src, "root = true").unwrap();

        let args = Rsync::args(&src, Path::new("/snap/.editorconfig"));
        assert_eq!(args.last().unwrap(), "/snap/.editorconfig");
    }

    #[test]
    fn test_snapshot_copies_existing_paths_only() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir(temp.path().join(".cursor")).unwrap();
        let mirror = Recording::default();

        let editors = paths(&[".cursor/", ".vscode/"]);
        let report = snapshot(&mirror, &layout, "laptop", &editors);
        assert_eq!(report.synced, vec![".cursor/"]);
        assert_eq!(report.missing, vec![".vscode/"]);
        assert!(report.is_clean());

        let calls = mirror.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, temp.path().join(".cursor"));
        assert_eq!(calls[0].1, layout.snapshot_dir("laptop").join(".cursor"));
        assert!(layout.snapshot_dir("laptop").join(".cursor").is_dir());
    }

    #[test]
    fn test_snapshot_failure_is_reported_not_raised() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir(temp.path().join(".claude")).unwrap();
        fs::create_dir(temp.path().join(".cursor")).unwrap();
        let mirror = Recording {
            fail_on: Some(".claude"),
            ..Recording::default()
        };

        let editors = paths(&[".claude/", ".cursor/"]);
        let report = snapshot(&mirror, &layout, "laptop", &editors);
        assert_eq!(report.synced, vec![".cursor/"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, ".claude/");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_restore_requires_snapshot() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        let mirror = Recording::default();

        let err = restore(&mirror, &layout, "desktop", &paths(&[".vscode/"])).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { .. }));
    }

    #[test]
    fn test_restore_copies_back_into_root() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path());
        fs::create_dir_all(layout.snapshot_dir("desktop").join(".vscode")).unwrap();
        let mirror = Recording::default();

        let editors = paths(&[".vscode/", ".cursor/"]);
        let report = restore(&mirror, &layout, "desktop", &editors).unwrap();
        assert_eq!(report.synced, vec![".vscode/"]);
        assert_eq!(report.missing, vec![".cursor/"]);
        let calls = mirror.calls.borrow();
        assert_eq!(calls[0].1, temp.path().join(".vscode"));
    }
}
