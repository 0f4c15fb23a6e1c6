//! Run Driver - one complete mirror pass
//!
//! Ensures the backup root exists, lists the account's repositories, syncs them
//! one after the other and finally records the completion time in the
//! `lastupdated` sentinel.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::MirrorError;
use crate::git::{GitCli, Vcs};
use crate::github::DirectoryClient;
use crate::sync::{ArtifactOutcome, MirrorEntry, RepositoryPlan, RepositoryReport, SyncEngine};

/// Name of the completion timestamp file under the backup root
pub const SENTINEL_FILE: &str = "lastupdated";

/// Results of a complete run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub repositories: Vec<RepositoryReport>,
    pub duration: Duration,
    pub sentinel_written: bool,
}

impl RunReport {
    pub fn total_repositories(&self) -> usize {
        self.repositories.len()
    }

    /// Artifacts cloned, updated or written, plus the unchanged ones
    pub fn succeeded(&self) -> usize {
        self.count(|o| o.is_success())
    }

    /// Artifacts git had nothing to do for
    pub fn unchanged(&self) -> usize {
        self.count(|o| *o == ArtifactOutcome::Unchanged)
    }

    pub fn failed(&self) -> usize {
        self.count(|o| o.is_failure())
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| !o.is_success() && !o.is_failure())
    }

    fn count(&self, predicate: impl Fn(&ArtifactOutcome) -> bool) -> usize {
        self.repositories
            .iter()
            .flat_map(|r| r.outcomes())
            .filter(|(_, outcome)| predicate(outcome))
            .count()
    }
}

/// Run a full mirror pass with the `git` executable
pub async fn run(config: &Config) -> Result<RunReport, MirrorError> {
    let vcs = GitCli::new().with_timeout(config.timeout());
    run_with(config, Box::new(vcs)).await
}

/// Run a full mirror pass with the given version-control backend
pub async fn run_with(config: &Config, vcs: Box<dyn Vcs>) -> Result<RunReport, MirrorError> {
    let start_time = Instant::now();
    let backup_root = config.backup_root();

    ensure_backup_root(&backup_root)?;

    let directory = Arc::new(DirectoryClient::new(config)?);
    let repositories = directory.list_repositories().await?;
    info!("{} repositories found", repositories.len());

    let engine = SyncEngine::new(&backup_root, config.credentials()?, directory, vcs);

    let total = repositories.len();
    let mut reports = Vec::with_capacity(total);
    for (index, repo) in repositories.iter().enumerate() {
        info!("[{}/{}] Handling repository: {}", index + 1, total, repo.name);
        let report = engine.sync_repository(repo).await?;
        debug!("{:?}", report);
        reports.push(report);
    }

    let sentinel_written = match write_sentinel(&backup_root) {
        Ok(()) => true,
        Err(e) => {
            warn!("Could not write {}: {}", SENTINEL_FILE, e);
            false
        }
    };

    Ok(RunReport {
        repositories: reports,
        duration: start_time.elapsed(),
        sentinel_written,
    })
}

/// List repositories and describe what a run would do, touching nothing but
/// the backup root
pub async fn dry_run(config: &Config) -> Result<Vec<RepositoryPlan>, MirrorError> {
    let backup_root = config.backup_root();
    ensure_backup_root(&backup_root)?;

    let repositories = DirectoryClient::new(config)?.list_repositories().await?;
    info!("{} repositories found", repositories.len());

    Ok(repositories
        .iter()
        .map(|repo| MirrorEntry::new(&backup_root, &repo.name).plan(repo))
        .collect())
}

/// Create the backup root if it does not exist yet
pub fn ensure_backup_root(path: &Path) -> Result<(), MirrorError> {
    info!("Checking folder {}", path.display());

    if path.is_dir() {
        return Ok(());
    }

    info!("Folder does not exist, creating it: {}", path.display());
    std::fs::create_dir_all(path).map_err(|source| MirrorError::BackupRoot {
        path: path.to_path_buf(),
        source,
    })
}

/// Overwrite the sentinel with the current local time
pub fn write_sentinel(backup_root: &Path) -> std::io::Result<()> {
    let now = chrono::Local::now().to_rfc3339();
    std::fs::write(backup_root.join(SENTINEL_FILE), format!("{}\n", now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use assert_matches::assert_matches;
    use predicates::prelude::*;

    fn report(name: &str, code: ArtifactOutcome, wiki: ArtifactOutcome, issues: ArtifactOutcome) -> RepositoryReport {
        RepositoryReport {
            name: name.to_string(),
            code,
            wiki,
            issues,
        }
    }

    #[test]
    fn test_run_report_counts() {
        let summary = RunReport {
            repositories: vec![
                report("a", ArtifactOutcome::Cloned, ArtifactOutcome::Cloned, ArtifactOutcome::Written),
                report(
                    "b",
                    ArtifactOutcome::Failed("pull".to_string()),
                    ArtifactOutcome::Skipped,
                    ArtifactOutcome::Skipped,
                ),
                report("c", ArtifactOutcome::Updated, ArtifactOutcome::Skipped, ArtifactOutcome::Failed("410".to_string())),
                report("d", ArtifactOutcome::Updated, ArtifactOutcome::Unchanged, ArtifactOutcome::Skipped),
            ],
            duration: Duration::from_secs(3),
            sentinel_written: true,
        };

        assert_eq!(summary.total_repositories(), 4);
        assert_eq!(summary.succeeded(), 6);
        assert_eq!(summary.unchanged(), 1);
        assert_eq!(summary.failed(), 2);
        assert_eq!(summary.skipped(), 4);
    }

    #[test]
    fn test_ensure_backup_root_creates_missing_dirs() {
        let temp = assert_fs::TempDir::new().unwrap();
        let root = temp.child("nested").child("backup");

        ensure_backup_root(root.path()).unwrap();
        root.assert(predicate::path::is_dir());

        // Second call is a no-op
        ensure_backup_root(root.path()).unwrap();
    }

    #[test]
    fn test_ensure_backup_root_over_file_fails() {
        let temp = assert_fs::TempDir::new().unwrap();
        let blocker = temp.child("blocker");
        blocker.write_str("not a directory").unwrap();

        assert_matches!(
            ensure_backup_root(&blocker.path().join("backup")),
            Err(MirrorError::BackupRoot { .. })
        );
    }

    #[test]
    fn test_write_sentinel_overwrites() {
        let temp = assert_fs::TempDir::new().unwrap();
        temp.child(SENTINEL_FILE).write_str("stale\nhistory\n").unwrap();

        write_sentinel(temp.path()).unwrap();

        let content = std::fs::read_to_string(temp.path().join(SENTINEL_FILE)).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.ends_with('\n'));
        assert!(chrono::DateTime::parse_from_rfc3339(content.trim()).is_ok());
    }
}
