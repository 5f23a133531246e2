//! # Batch Orchestration
//!
//! This module drives `clone`, `push` and `pull` across every repository of a
//! workspace. Each run happens in two steps:
//!
//! 1. **Planning**: decide per repository whether to act or to skip, and why.
//!    [`plan_clones`] works from the manifest; [`plan_remote_actions`] works
//!    from a live scan.
//! 2. **Execution**: [`execute`] performs the action for every step that was
//!    not skipped, or only reports what it would do in dry-run mode.
//!
//! Planning is identical in dry-run and real runs; only the final action is
//! substituted. A failed action is recorded and the batch moves on to the
//! next repository. Nothing is retried.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;

use crate::config::{DeviceRegistry, ExcludeSet, Manifest};
use crate::error::{Error, Result};
use crate::git;
use crate::repository::{GitOperations, Repository};
use crate::scanner::{self, ScanOptions};

/// Why a repository was left alone. Skips are not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The name matches an exclude pattern.
    Excluded,
    /// The repository has no `origin` remote.
    NoRemoteConfigured,
    /// HEAD is not on a branch.
    DetachedHead,
    /// The clone target already holds a repository.
    AlreadyExists,
    /// The manifest entry has no URL to clone from.
    NoUrl,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Excluded => "excluded",
            SkipReason::NoRemoteConfigured => "no remote",
            SkipReason::DetachedHead => "detached HEAD",
            SkipReason::AlreadyExists => "already exists",
            SkipReason::NoUrl => "no URL",
        };
        f.write_str(text)
    }
}

/// The mutating action of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Clone,
    Push,
    Pull,
}

impl Operation {
    pub fn verb(self) -> &'static str {
        match self {
            Operation::Clone => "clone",
            Operation::Push => "push",
            Operation::Pull => "pull",
        }
    }

    /// Status label printed in front of an attempted action.
    pub fn label(self) -> &'static str {
        match self {
            Operation::Clone => "[CLONE]",
            Operation::Push => "[PUSH]",
            Operation::Pull => "[PULL]",
        }
    }
}

/// One repository's planned step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub name: String,
    /// Local directory the action runs in (or clones into).
    pub path: PathBuf,
    /// Clone source; empty for push and pull.
    pub url: String,
    pub has_uncommitted_changes: bool,
    /// `None` means act.
    pub skip: Option<SkipReason>,
}

/// Plan a clone for every manifest entry.
///
/// Decision order per entry: excluded, already present (the target holds a
/// `.git` directory), no URL, clone. A target directory without the marker is
/// not "already present"; cloning into it is attempted and fails if git
/// refuses.
pub fn plan_clones(manifest: &Manifest, root: &Path, excludes: &ExcludeSet) -> Vec<Step> {
    manifest
        .repositories
        .iter()
        .map(|entry| {
            let path = entry.local_path(root);
            let skip = if excludes.is_excluded(&entry.name) {
                Some(SkipReason::Excluded)
            } else if git::is_repository(&path) {
                Some(SkipReason::AlreadyExists)
            } else if entry.url.trim().is_empty() {
                Some(SkipReason::NoUrl)
            } else {
                None
            };
            Step {
                name: entry.name.clone(),
                path,
                url: entry.url.clone(),
                has_uncommitted_changes: false,
                skip,
            }
        })
        .collect()
}

/// Plan a push or pull for every scanned repository.
///
/// Decision order: excluded, no remote, detached HEAD, act. A repository
/// without a remote is reported as such whatever else is true of it.
pub fn plan_remote_actions(repos: &[Repository], excludes: &ExcludeSet) -> Vec<Step> {
    repos
        .iter()
        .map(|repo| {
            let skip = if excludes.is_excluded(&repo.name) {
                Some(SkipReason::Excluded)
            } else if !repo.has_remote {
                Some(SkipReason::NoRemoteConfigured)
            } else if repo.is_detached {
                Some(SkipReason::DetachedHead)
            } else {
                None
            };
            Step {
                name: repo.name.clone(),
                path: repo.absolute_path.clone(),
                url: repo.remote_url.clone(),
                has_uncommitted_changes: repo.has_uncommitted_changes,
                skip,
            }
        })
        .collect()
}

/// Result of one step.
#[derive(Debug)]
pub enum Outcome {
    Skipped(SkipReason),
    /// Dry run: the action that would have run, with notes.
    WouldDo(String),
    Done,
    Failed(Error),
}

/// A step together with its outcome.
#[derive(Debug)]
pub struct Record {
    pub name: String,
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Exact counts for a batch. In dry run `succeeded` stays zero and `would`
/// counts the eligible repositories instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub would: usize,
}

impl Summary {
    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::WouldDo(_) => self.would += 1,
            Outcome::Done => self.succeeded += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed + self.would
    }
}

/// Every record of a batch, in plan order, plus the counts.
#[derive(Debug, Default)]
pub struct Report {
    pub records: Vec<Record>,
    pub summary: Summary,
}

/// Note attached to a dry-run step.
fn dry_run_note(operation: Operation, step: &Step) -> String {
    let mut note = format!("would {}", operation.verb());
    if operation == Operation::Push && step.has_uncommitted_changes {
        note.push_str(", uncommitted changes not included");
    }
    note
}

/// Run `operation` for every step that is not skipped.
///
/// `observe` is called with each record as soon as it is known, so callers can
/// print progress while the batch runs.
pub fn execute<G>(
    git: &G,
    operation: Operation,
    steps: &[Step],
    dry_run: bool,
    observe: &mut dyn FnMut(&Record),
) -> Report
where
    G: GitOperations + ?Sized,
{
    let mut report = Report::default();
    for step in steps {
        let outcome = match step.skip {
            Some(reason) => Outcome::Skipped(reason),
            None if dry_run => Outcome::WouldDo(dry_run_note(operation, step)),
            None => {
                let result = match operation {
                    Operation::Clone => git.clone_repo(&step.url, &step.path),
                    Operation::Push => git.push(&step.path),
                    Operation::Pull => git.pull(&step.path),
                };
                match result {
                    Ok(()) => Outcome::Done,
                    Err(e) => {
                        warn!("{} {} failed: {}", operation.verb(), step.name, e);
                        Outcome::Failed(e)
                    }
                }
            }
        };
        report.summary.count(&outcome);
        let record = Record {
            name: step.name.clone(),
            path: step.path.clone(),
            outcome,
        };
        observe(&record);
        report.records.push(record);
    }
    info!(
        "{}: {} ok, {} skipped, {} failed, {} dry-run",
        operation.verb(),
        report.summary.succeeded,
        report.summary.skipped,
        report.summary.failed,
        report.summary.would
    );
    report
}

/// Scan `root` and push every eligible repository.
pub fn push<G>(
    git: &G,
    root: &Path,
    excludes: &ExcludeSet,
    options: &ScanOptions,
    dry_run: bool,
    observe: &mut dyn FnMut(&Record),
) -> Result<Report>
where
    G: GitOperations + ?Sized,
{
    let repos = scan_sorted(git, root, options)?;
    let steps = plan_remote_actions(&repos, excludes);
    Ok(execute(git, Operation::Push, &steps, dry_run, observe))
}

/// Clone every manifest entry that is not present yet.
pub fn clone_missing<G>(
    git: &G,
    root: &Path,
    manifest: &Manifest,
    excludes: &ExcludeSet,
    dry_run: bool,
    observe: &mut dyn FnMut(&Record),
) -> Report
where
    G: GitOperations + ?Sized,
{
    let steps = plan_clones(manifest, root, excludes);
    execute(git, Operation::Clone, &steps, dry_run, observe)
}

/// Reports of a pull: the manifest clone phase, then the pull phase.
#[derive(Debug, Default)]
pub struct PullReport {
    pub cloned: Report,
    pub pulled: Report,
}

/// Clone missing manifest entries, then scan `root` and pull every eligible
/// repository. Repositories cloned in the first phase are pulled too; in dry
/// run nothing is created, so only repositories already present are seen.
pub fn pull<G>(
    git: &G,
    root: &Path,
    manifest: &Manifest,
    excludes: &ExcludeSet,
    options: &ScanOptions,
    dry_run: bool,
    observe: &mut dyn FnMut(Operation, &Record),
) -> Result<PullReport>
where
    G: GitOperations + ?Sized,
{
    let mut on_clone = |record: &Record| observe(Operation::Clone, record);
    let cloned = clone_missing(git, root, manifest, excludes, dry_run, &mut on_clone);

    let repos = scan_sorted(git, root, options)?;
    let steps = plan_remote_actions(&repos, excludes);
    let mut on_pull = |record: &Record| observe(Operation::Pull, record);
    let pulled = execute(git, Operation::Pull, &steps, dry_run, &mut on_pull);
    Ok(PullReport { cloned, pulled })
}

fn scan_sorted<G>(git: &G, root: &Path, options: &ScanOptions) -> Result<Vec<Repository>>
where
    G: GitOperations + ?Sized,
{
    let mut repos = scanner::scan(git, root, options)?;
    scanner::sort_by_path(&mut repos);
    Ok(repos)
}

/// Stamp the last synchronization time of `serial` in the registry at
/// `devices_file`. Returns `false` when the device is not registered, in which
/// case nothing is written.
pub fn record_sync(devices_file: &Path, serial: &str) -> Result<bool> {
    let mut registry = DeviceRegistry::load(devices_file)?;
    if !registry.touch(serial, Utc::now()) {
        return Ok(false);
    }
    registry.save(devices_file)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestEntry;
    use crate::repository::fake::{FakeGit, FakeRepo};
    use crate::repository::CommitInfo;
    use std::fs;
    use tempfile::TempDir;

    fn live(name: &str, has_remote: bool, detached: bool, dirty: bool) -> Repository {
        Repository {
            name: name.to_string(),
            relative_path: PathBuf::from(name),
            absolute_path: PathBuf::from("/ws").join(name),
            remote_url: if has_remote {
                format!("https://x/{name}.git")
            } else {
                String::new()
            },
            has_remote,
            branch: if detached { "HEAD" } else { "main" }.to_string(),
            is_detached: detached,
            last_commit: CommitInfo::default(),
            has_uncommitted_changes: dirty,
        }
    }

    fn entry(name: &str, path: &str, url: &str) -> ManifestEntry {
        ManifestEntry {
            name: name.to_string(),
            path: path.to_string(),
            url: url.to_string(),
            branch: "main".to_string(),
            tags: Vec::new(),
            description: String::new(),
        }
    }

    fn ignore(_: &Record) {}

    fn counts(succeeded: usize, skipped: usize, failed: usize, would: usize) -> Summary {
        Summary {
            succeeded,
            skipped,
            failed,
            would,
        }
    }

    fn make_repo(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.join(".git")).unwrap();
        path
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::NoRemoteConfigured.to_string(), "no remote");
        assert_eq!(SkipReason::DetachedHead.to_string(), "detached HEAD");
        assert_eq!(SkipReason::AlreadyExists.to_string(), "already exists");
        assert_eq!(SkipReason::NoUrl.to_string(), "no URL");
        assert_eq!(SkipReason::Excluded.to_string(), "excluded");
    }

    #[test]
    fn test_no_remote_wins_over_other_predicates() {
        let repos = vec![
            live("dirty-local", false, false, true),
            live("detached-local", false, true, false),
            live("detached", true, true, false),
            live("ok", true, false, false),
        ];
        let steps = plan_remote_actions(&repos, &ExcludeSet::default());
        let skips: Vec<_> = steps.iter().map(|s| s.skip).collect();
        assert_eq!(
            skips,
            vec![
                Some(SkipReason::NoRemoteConfigured),
                Some(SkipReason::NoRemoteConfigured),
                Some(SkipReason::DetachedHead),
                None,
            ]
        );
    }

    #[test]
    fn test_detached_head_never_pushed_in_either_mode() {
        let repos = vec![live("detached", true, true, true)];
        let steps = plan_remote_actions(&repos, &ExcludeSet::default());
        let git = FakeGit::new();

        for dry_run in [true, false] {
            let report = execute(&git, Operation::Push, &steps, dry_run, &mut ignore);
            assert!(matches!(
                report.records[0].outcome,
                Outcome::Skipped(SkipReason::DetachedHead)
            ));
            assert_eq!(report.summary.skipped, 1);
        }
        assert!(git.recorded().is_empty());
    }

    #[test]
    fn test_excluded_before_remote_checks() {
        let repos = vec![
            live("temp-scratch", false, false, false),
            live("archive", true, false, false),
        ];
        let steps = plan_remote_actions(&repos, &ExcludeSet::new(&["temp-*", "archive"]));
        assert!(steps.iter().all(|s| s.skip == Some(SkipReason::Excluded)));
    }

    #[test]
    fn test_dry_run_plans_match_real_run() {
        let temp = TempDir::new().unwrap();
        let ok = make_repo(temp.path(), "ok");
        let broken = make_repo(temp.path(), "broken");
        let mut failing = FakeRepo::clean("https://x/broken.git");
        failing.action_fails = true;
        let git = FakeGit::new()
            .with_repo(&ok, FakeRepo::clean("https://x/ok.git"))
            .with_repo(&broken, failing);
        let repos = vec![
            live("ok", true, false, false),
            live("local", false, false, false),
        ];
        let mut steps = plan_remote_actions(&repos, &ExcludeSet::default());
        steps[0].path = ok;
        steps.push(Step {
            name: "broken".to_string(),
            path: broken,
            url: String::new(),
            has_uncommitted_changes: false,
            skip: None,
        });

        let dry = execute(&git, Operation::Push, &steps, true, &mut ignore);
        assert!(git.recorded().is_empty());
        let real = execute(&git, Operation::Push, &steps, false, &mut ignore);

        assert_eq!(dry.summary, counts(0, 1, 0, 2));
        assert_eq!(real.summary, counts(1, 1, 1, 0));
        assert_eq!(git.recorded().len(), 2);
    }

    #[test]
    fn test_one_failure_does_not_stop_the_batch() {
        let temp = TempDir::new().unwrap();
        let a = make_repo(temp.path(), "a");
        let b = make_repo(temp.path(), "b");
        let c = make_repo(temp.path(), "c");
        let mut failing = FakeRepo::clean("https://x/b.git");
        failing.action_fails = true;
        let git = FakeGit::new()
            .with_repo(&a, FakeRepo::clean("https://x/a.git"))
            .with_repo(&b, failing)
            .with_repo(&c, FakeRepo::clean("https://x/c.git"));

        let report = push(
            &git,
            temp.path(),
            &ExcludeSet::default(),
            &ScanOptions::default(),
            false,
            &mut ignore,
        )
        .unwrap();
        assert_eq!(report.summary.succeeded, 2);
        assert_eq!(report.summary.failed, 1);
        let names: Vec<_> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(matches!(report.records[1].outcome, Outcome::Failed(_)));
    }

    #[test]
    fn test_push_dry_run_end_to_end() {
        let temp = TempDir::new().unwrap();
        let repo_a = make_repo(temp.path(), "repoA");
        fs::create_dir_all(temp.path().join("repoB/src")).unwrap();
        fs::write(temp.path().join("repoB/src/main.rs"), "fn main() {}").unwrap();
        let git = FakeGit::new().with_repo(&repo_a, FakeRepo::clean("https://x/a.git"));

        let mut seen = Vec::new();
        let report = push(
            &git,
            temp.path(),
            &ExcludeSet::default(),
            &ScanOptions::default(),
            true,
            &mut |r: &Record| seen.push(r.name.clone()),
        )
        .unwrap();

        assert_eq!(seen, vec!["repoA"]);
        match &report.records[0].outcome {
            Outcome::WouldDo(note) => assert_eq!(note, "would push"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(report.summary, counts(0, 0, 0, 1));
    }

    #[test]
    fn test_dry_run_note_mentions_uncommitted_changes() {
        let mut step = Step {
            name: "dirty".to_string(),
            path: PathBuf::from("/ws/dirty"),
            url: String::new(),
            has_uncommitted_changes: true,
            skip: None,
        };
        assert_eq!(
            dry_run_note(Operation::Push, &step),
            "would push, uncommitted changes not included"
        );
        assert_eq!(dry_run_note(Operation::Pull, &step), "would pull");
        step.has_uncommitted_changes = false;
        assert_eq!(dry_run_note(Operation::Push, &step), "would push");
    }

    #[test]
    fn test_plan_clones_decision_order() {
        let temp = TempDir::new().unwrap();
        make_repo(temp.path(), "present");
        fs::create_dir_all(temp.path().join("plain-dir")).unwrap();
        let mut manifest = Manifest::default();
        manifest.repositories = vec![
            entry("present", "", "https://x/present.git"),
            entry("no-url", "", ""),
            entry("temp-x", "", "https://x/temp.git"),
            entry("nested", "libs/nested", "https://x/nested.git"),
            entry("plain-dir", "", "https://x/plain.git"),
        ];

        let steps = plan_clones(&manifest, temp.path(), &ExcludeSet::new(&["temp-*"]));
        let skips: Vec<_> = steps.iter().map(|s| s.skip).collect();
        assert_eq!(
            skips,
            vec![
                Some(SkipReason::AlreadyExists),
                Some(SkipReason::NoUrl),
                Some(SkipReason::Excluded),
                None,
                None,
            ]
        );
        assert_eq!(steps[3].path, temp.path().join("libs/nested"));
    }

    #[test]
    fn test_clone_missing_clones_and_counts() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::default();
        manifest.repositories = vec![
            entry("a", "", "https://x/a.git"),
            entry("bad", "", "https://x/fail.git"),
            entry("no-url", "", ""),
        ];
        let git = FakeGit::new();

        let excludes = ExcludeSet::default();
        let report = clone_missing(&git, temp.path(), &manifest, &excludes, false, &mut ignore);
        assert_eq!(report.summary, counts(1, 1, 1, 0));
        assert!(temp.path().join("a/.git").is_dir());
    }

    #[test]
    fn test_pull_clones_then_pulls() {
        let temp = TempDir::new().unwrap();
        let existing = make_repo(temp.path(), "existing");
        let mut manifest = Manifest::default();
        manifest.repositories = vec![
            entry("existing", "", "https://x/existing.git"),
            entry("fresh", "", "https://x/fresh.git"),
        ];
        let git = FakeGit::new().with_repo(&existing, FakeRepo::clean("https://x/existing.git"));

        let mut phases = Vec::new();
        let report = pull(
            &git,
            temp.path(),
            &manifest,
            &ExcludeSet::default(),
            &ScanOptions::default(),
            false,
            &mut |op: Operation, record: &Record| phases.push((op, record.name.clone())),
        )
        .unwrap();

        assert_eq!(report.cloned.summary.succeeded, 1);
        assert_eq!(report.cloned.summary.skipped, 1);
        // The fresh clone has no scripted remote, so it is seen but skipped.
        assert_eq!(report.pulled.summary.succeeded, 1);
        assert_eq!(report.pulled.summary.skipped, 1);
        assert_eq!(phases[0], (Operation::Clone, "existing".to_string()));
        assert_eq!(phases.last().unwrap().0, Operation::Pull);
        assert!(git
            .recorded()
            .contains(&format!("pull {}", existing.display())));
    }

    #[test]
    fn test_pull_dry_run_creates_nothing() {
        let temp = TempDir::new().unwrap();
        let mut manifest = Manifest::default();
        manifest.repositories = vec![entry("fresh", "", "https://x/fresh.git")];
        let git = FakeGit::new();

        let report = pull(
            &git,
            temp.path(),
            &manifest,
            &ExcludeSet::default(),
            &ScanOptions::default(),
            true,
            &mut |_: Operation, _: &Record| {},
        )
        .unwrap();

        assert_eq!(report.cloned.summary.would, 1);
        assert_eq!(report.pulled.summary.total(), 0);
        assert!(!temp.path().join("fresh").exists());
        assert!(git.recorded().is_empty());
    }

    #[test]
    fn test_record_sync() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("devices.yaml");
        assert!(!record_sync(&path, "S1").unwrap());
        assert!(!path.exists());

        let mut registry = DeviceRegistry::default();
        registry
            .register(crate::config::Device {
                serial: "S1".to_string(),
                name: "laptop".to_string(),
                platform: "linux".to_string(),
                hostname: String::new(),
                registered_at: Utc::now(),
                last_sync_at: None,
            })
            .unwrap();
        registry.save(&path).unwrap();

        assert!(record_sync(&path, "S1").unwrap());
        let loaded = DeviceRegistry::load(&path).unwrap();
        assert!(loaded.find("S1").unwrap().last_sync_at.is_some());
    }
}
