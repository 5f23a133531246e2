//! # Workspace Scanning
//!
//! Finds every repository under a workspace root and inspects it.
//!
//! ## Traversal rules
//!
//! 1. Directories whose name begins with `.` are not descended into. This
//!    includes `.git` itself: the marker is looked for from its parent, never
//!    visited as a candidate.
//! 2. Conventional artifact directories ([`SKIP_DIRS`]) are skipped at any
//!    depth.
//! 3. A directory containing the marker is emitted and its subtree is pruned,
//!    so nested repositories are invisible.
//! 4. Unreadable directories below the root are logged and skipped. Only a
//!    missing, non-directory, or unreadable root aborts the scan.
//! 5. Results come back in walk order. Callers that display them sort first.
//!
//! ## Inspection
//!
//! The walk is always a single sequential traversal that produces a list of
//! candidate paths. Candidates are then inspected either sequentially or on a
//! bounded `rayon` pool ([`ScanOptions::jobs`]); the result list keeps walk
//! order either way. A candidate whose inspection fails is dropped with a
//! warning instead of failing the scan.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use rayon::prelude::*;
use walkdir::{DirEntry, WalkDir};

use crate::defaults::SKIP_DIRS;
use crate::error::{Error, Result};
use crate::git;
use crate::repository::{inspect, GitOperations, Repository};

/// Options controlling a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Number of repositories inspected concurrently. `0` and `1` both mean
    /// sequential inspection.
    pub jobs: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}

/// Scan `root` for repositories and inspect each one.
///
/// # Errors
///
/// Returns [`Error::ScanRoot`] when `root` does not exist, is not a directory
/// or cannot be read. Problems below the root never fail the scan.
pub fn scan<G>(git: &G, root: &Path, options: &ScanOptions) -> Result<Vec<Repository>>
where
    G: GitOperations + ?Sized,
{
    let root = std::path::absolute(root)?;
    let candidates = find_candidates(&root)?;
    debug!(
        "found {} repository candidates under {}",
        candidates.len(),
        root.display()
    );

    let inspected: Vec<Option<Repository>> = if options.jobs > 1 && candidates.len() > 1 {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs)
            .build()
        {
            Ok(pool) => pool.install(|| {
                candidates
                    .par_iter()
                    .map(|path| inspect_candidate(git, &root, path))
                    .collect()
            }),
            Err(e) => {
                warn!(
                    "could not start {} inspection threads ({}), inspecting sequentially",
                    options.jobs, e
                );
                inspect_all(git, &root, &candidates)
            }
        }
    } else {
        inspect_all(git, &root, &candidates)
    };

    Ok(inspected.into_iter().flatten().collect())
}

/// Walk `root` and return the absolute path of every repository root, in walk
/// order.
///
/// # Errors
///
/// Returns [`Error::ScanRoot`] when the root itself cannot be walked.
pub fn find_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let root = std::path::absolute(root)?;
    match std::fs::metadata(&root) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(Error::ScanRoot {
                path: root,
                message: "not a directory".to_string(),
            })
        }
        Err(e) => {
            return Err(Error::ScanRoot {
                path: root,
                message: e.to_string(),
            })
        }
    }

    let mut candidates = Vec::new();
    let mut walker = WalkDir::new(&root)
        .follow_links(false)
        .into_iter()
        .filter_entry(should_visit);

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::ScanRoot {
                    path: root,
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!("skipping unreadable path: {}", e);
                continue;
            }
        };

        if git::is_repository(entry.path()) {
            candidates.push(entry.into_path());
            walker.skip_current_dir();
        }
    }

    Ok(candidates)
}

/// Sort repositories by relative path, the order every listing uses.
pub fn sort_by_path(repos: &mut [Repository]) {
    repos.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
}

fn should_visit(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    if !entry.file_type().is_dir() {
        return false;
    }

    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
        debug!("not descending into {}", entry.path().display());
        return false;
    }
    true
}

fn inspect_all<G>(git: &G, root: &Path, candidates: &[PathBuf]) -> Vec<Option<Repository>>
where
    G: GitOperations + ?Sized,
{
    candidates
        .iter()
        .map(|path| inspect_candidate(git, root, path))
        .collect()
}

fn inspect_candidate<G>(git: &G, root: &Path, path: &Path) -> Option<Repository>
where
    G: GitOperations + ?Sized,
{
    match inspect(git, path) {
        Ok(mut repo) => {
            repo.relative_path = relative_to(root, path);
            Some(repo)
        }
        Err(e) => {
            warn!("dropping {} from scan: {}", path.display(), e);
            None
        }
    }
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fake::{FakeGit, FakeRepo};
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn make_repo(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.join(".git")).unwrap();
        path
    }

    fn names(repos: &[Repository]) -> BTreeSet<String> {
        repos.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let err = scan(
            &FakeGit::new(),
            &temp.path().join("nope"),
            &ScanOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::ScanRoot { .. }));
    }

    #[test]
    fn test_scan_file_root_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = scan(&FakeGit::new(), &file, &ScanOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ScanRoot { .. }));
    }

    #[test]
    fn test_scan_empty_root_yields_nothing() {
        let temp = TempDir::new().unwrap();
        let repos = scan(&FakeGit::new(), temp.path(), &ScanOptions::default()).unwrap();
        assert!(repos.is_empty());
    }

    #[test]
    fn test_scan_finds_repositories_at_any_depth() {
        let temp = TempDir::new().unwrap();
        make_repo(temp.path(), "a");
        make_repo(temp.path(), "group/b");
        make_repo(temp.path(), "group/deeper/c");
        fs::create_dir_all(temp.path().join("plain/src")).unwrap();

        let repos = scan(&FakeGit::new(), temp.path(), &ScanOptions::default()).unwrap();
        assert_eq!(
            names(&repos),
            ["a", "b", "c"].iter().map(|s| s.to_string()).collect()
        );

        let mut repos = repos;
        sort_by_path(&mut repos);
        let rels: Vec<_> = repos.iter().map(|r| r.relative_path.clone()).collect();
        assert_eq!(
            rels,
            vec![
                PathBuf::from("a"),
                PathBuf::from("group/b"),
                PathBuf::from("group/deeper/c"),
            ]
        );
    }

    #[test]
    fn test_scan_does_not_descend_into_repositories() {
        let temp = TempDir::new().unwrap();
        make_repo(temp.path(), "a");
        make_repo(temp.path(), "a/vendor/b");
        make_repo(temp.path(), "a/nested/c");

        let repos = scan(&FakeGit::new(), temp.path(), &ScanOptions::default()).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].name, "a");
    }

    #[test]
    fn test_scan_skip_list_applies_without_nesting() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a")).unwrap();
        make_repo(temp.path(), "a/vendor");
        make_repo(temp.path(), "node_modules/pkg");
        make_repo(temp.path(), "x/build/out");
        make_repo(temp.path(), "x/__pycache__");

        let repos = scan(&FakeGit::new(), temp.path(), &ScanOptions::default()).unwrap();
        assert!(repos.is_empty(), "unexpected: {:?}", names(&repos));
    }

    #[test]
    fn test_scan_skips_hidden_directories() {
        let temp = TempDir::new().unwrap();
        make_repo(temp.path(), ".hidden/repo");
        make_repo(temp.path(), ".metarepo/workspace-config/laptop/thing");
        make_repo(temp.path(), "visible");

        let repos = scan(&FakeGit::new(), temp.path(), &ScanOptions::default()).unwrap();
        assert_eq!(names(&repos), ["visible".to_string()].into_iter().collect());
    }

    #[test]
    fn test_scan_root_that_is_a_repository() {
        let temp = TempDir::new().unwrap();
        let root = make_repo(temp.path(), "solo");
        make_repo(&root, "inner");

        let repos = scan(&FakeGit::new(), &root, &ScanOptions::default()).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].relative_path, PathBuf::from("."));
    }

    #[test]
    fn test_scan_root_may_be_hidden_or_skip_listed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("build");
        make_repo(&root, "inside");

        let repos = scan(&FakeGit::new(), &root, &ScanOptions::default()).unwrap();
        assert_eq!(repos.len(), 1);
    }

    #[test]
    fn test_scan_keeps_other_repositories_when_one_is_broken() {
        let temp = TempDir::new().unwrap();
        let a = make_repo(temp.path(), "a");
        let b = make_repo(temp.path(), "b");
        make_repo(temp.path(), "broken");

        let git = FakeGit::new()
            .with_repo(&a, FakeRepo::clean("https://x/a.git"))
            .with_repo(&b, FakeRepo::clean("https://x/b.git"));

        let repos = scan(&git, temp.path(), &ScanOptions::default()).unwrap();
        let populated: Vec<_> = repos.iter().filter(|r| r.has_remote).collect();
        assert_eq!(populated.len(), 2);
        for repo in populated {
            assert_eq!(repo.branch, "main");
            assert_eq!(repo.last_commit.hash, "abc1234");
        }
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let temp = TempDir::new().unwrap();
        let mut git = FakeGit::new();
        for i in 0..12 {
            let path = make_repo(temp.path(), &format!("group{}/repo{}", i % 3, i));
            git = git.with_repo(&path, FakeRepo::clean(&format!("https://x/{i}.git")));
        }

        let sequential = scan(&git, temp.path(), &ScanOptions { jobs: 1 }).unwrap();
        let parallel = scan(&git, temp.path(), &ScanOptions { jobs: 4 }).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), 12);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_swallows_unreadable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        make_repo(temp.path(), "ok");
        let locked = temp.path().join("locked");
        make_repo(&locked, "hidden-from-us");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = scan(&FakeGit::new(), temp.path(), &ScanOptions::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let repos = result.unwrap();
        assert!(names(&repos).contains("ok"));
    }
}
