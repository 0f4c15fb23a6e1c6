//! Sync Engine - per-repository artifact synchronization
//!
//! Each repository is mirrored as up to three artifacts: the code, the wiki and
//! a snapshot of the issues. Code and wiki follow the same rule: clone when the
//! target directory is absent, otherwise fetch and pull in place. The issues
//! snapshot is always fetched in full and overwrites the previous file.
//!
//! A failed initial clone stops the run. A failed update or issues fetch is
//! logged and the run moves on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::Credentials;
use crate::error::MirrorError;
use crate::git::{Vcs, VcsFailure, VcsOutcome};
use crate::github::{DirectoryClient, RepoDescriptor};

/// The backed-up units of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Code,
    Wiki,
    Issues,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::Code => "code",
            Artifact::Wiki => "wiki",
            Artifact::Issues => "issues",
        };
        f.write_str(name)
    }
}

/// Result of synchronizing one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// Initial copy made
    Cloned,
    /// Git reported nothing to do; nothing was written
    Unchanged,
    /// Existing working directory fetched and pulled
    Updated,
    /// Issues snapshot written
    Written,
    /// Capability flag is off; nothing was touched
    Skipped,
    /// Recoverable failure, already logged
    Failed(String),
}

impl ArtifactOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Cloned | Self::Unchanged | Self::Updated | Self::Written
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of every artifact of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReport {
    pub name: String,
    pub code: ArtifactOutcome,
    pub wiki: ArtifactOutcome,
    pub issues: ArtifactOutcome,
}

impl RepositoryReport {
    pub fn outcomes(&self) -> [(Artifact, &ArtifactOutcome); 3] {
        [
            (Artifact::Code, &self.code),
            (Artifact::Wiki, &self.wiki),
            (Artifact::Issues, &self.issues),
        ]
    }
}

/// What a sync would do to one artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    Clone,
    Update,
    Write,
    Overwrite,
    Skip,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlannedAction::Clone => "clone",
            PlannedAction::Update => "fetch + pull",
            PlannedAction::Write => "write snapshot",
            PlannedAction::Overwrite => "overwrite snapshot",
            PlannedAction::Skip => "skip",
        };
        f.write_str(label)
    }
}

/// Dry-run view of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPlan {
    pub name: String,
    pub code: PlannedAction,
    pub wiki: PlannedAction,
    pub issues: PlannedAction,
}

/// On-disk layout of one repository under the backup root
#[derive(Debug, Clone)]
pub struct MirrorEntry {
    dir: PathBuf,
}

impl MirrorEntry {
    pub fn new(backup_root: &Path, name: &str) -> Self {
        Self {
            dir: backup_root.join(name),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn code_dir(&self) -> PathBuf {
        self.dir.join("repo")
    }

    pub fn wiki_dir(&self) -> PathBuf {
        self.dir.join("wiki")
    }

    pub fn issues_file(&self) -> PathBuf {
        self.dir.join("issues.json")
    }

    /// Describe what a sync of `repo` would do here, without doing it
    pub fn plan(&self, repo: &RepoDescriptor) -> RepositoryPlan {
        let working_copy = |path: PathBuf| {
            if path.exists() {
                PlannedAction::Update
            } else {
                PlannedAction::Clone
            }
        };

        RepositoryPlan {
            name: repo.name.clone(),
            code: working_copy(self.code_dir()),
            wiki: if repo.has_wiki {
                working_copy(self.wiki_dir())
            } else {
                PlannedAction::Skip
            },
            issues: match (repo.has_issues, self.issues_file().exists()) {
                (false, _) => PlannedAction::Skip,
                (true, true) => PlannedAction::Overwrite,
                (true, false) => PlannedAction::Write,
            },
        }
    }
}

/// A git operation that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done,
    Noop,
}

/// Synchronizes repositories into the backup root, one at a time
pub struct SyncEngine {
    backup_root: PathBuf,
    credentials: Credentials,
    directory: Arc<DirectoryClient>,
    vcs: Box<dyn Vcs>,
}

impl SyncEngine {
    pub fn new(
        backup_root: impl Into<PathBuf>,
        credentials: Credentials,
        directory: Arc<DirectoryClient>,
        vcs: Box<dyn Vcs>,
    ) -> Self {
        Self {
            backup_root: backup_root.into(),
            credentials,
            directory,
            vcs,
        }
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Mirror code, wiki and issues of one repository, in that order
    pub async fn sync_repository(
        &self,
        repo: &RepoDescriptor,
    ) -> Result<RepositoryReport, MirrorError> {
        let entry = MirrorEntry::new(&self.backup_root, &repo.name);

        let code = self
            .sync_working_copy(repo, Artifact::Code, &repo.clone_url, &entry.code_dir())
            .await?;

        let wiki = if repo.has_wiki {
            self.sync_working_copy(repo, Artifact::Wiki, &repo.wiki_clone_url(), &entry.wiki_dir())
                .await?
        } else {
            ArtifactOutcome::Skipped
        };

        let issues = if repo.has_issues {
            self.sync_issues(repo, &entry).await
        } else {
            ArtifactOutcome::Skipped
        };

        Ok(RepositoryReport {
            name: repo.name.clone(),
            code,
            wiki,
            issues,
        })
    }

    /// Clone-if-absent, else fetch + pull
    async fn sync_working_copy(
        &self,
        repo: &RepoDescriptor,
        artifact: Artifact,
        source_url: &str,
        target: &Path,
    ) -> Result<ArtifactOutcome, MirrorError> {
        if !target.exists() {
            info!("Cloning {} {} -> {}", repo.name, artifact, target.display());
            let source = self.credentials.embed_in_url(source_url);
            let outcome = self.vcs.clone_repo(&source, target).await;

            // Clone failures stop the run
            return match self.settle(outcome, repo, "clone", target) {
                Ok(Step::Done) => Ok(ArtifactOutcome::Cloned),
                Ok(Step::Noop) => Ok(ArtifactOutcome::Unchanged),
                Err(failure) => Err(self.abort(failure, repo, "clone", target)),
            };
        }

        info!("Updating {} {} at {}", repo.name, artifact, target.display());

        // Update failures only give up on this artifact
        let outcome = self.vcs.fetch(target).await;
        if let Err(failure) = self.settle(outcome, repo, "fetch -p", target) {
            return Ok(self.give_up(failure, repo, "fetch -p", target));
        }

        let outcome = self.vcs.pull(target).await;
        Ok(match self.settle(outcome, repo, "pull", target) {
            Ok(_) => ArtifactOutcome::Updated,
            Err(failure) => self.give_up(failure, repo, "pull", target),
        })
    }

    /// Separate a failed git outcome from the ones the sync proceeds on
    fn settle(
        &self,
        outcome: VcsOutcome,
        repo: &RepoDescriptor,
        operation: &'static str,
        path: &Path,
    ) -> Result<Step, VcsFailure> {
        match outcome {
            VcsOutcome::Success => Ok(Step::Done),
            VcsOutcome::BenignNoop => {
                debug!(
                    "git {} for {} at {} reported nothing to do",
                    operation,
                    repo.name,
                    path.display()
                );
                Ok(Step::Noop)
            }
            VcsOutcome::Failure(failure) => Err(failure),
        }
    }

    fn abort(
        &self,
        failure: VcsFailure,
        repo: &RepoDescriptor,
        operation: &'static str,
        path: &Path,
    ) -> MirrorError {
        MirrorError::VcsFailed {
            operation,
            repository: repo.name.clone(),
            path: path.to_path_buf(),
            exit_code: failure.exit_code,
            output: failure.output,
        }
    }

    fn give_up(
        &self,
        failure: VcsFailure,
        repo: &RepoDescriptor,
        operation: &'static str,
        path: &Path,
    ) -> ArtifactOutcome {
        let VcsFailure { exit_code, output } = failure;
        error!(
            "Error when trying to run git {} for {} in {} (exit code {:?})",
            operation,
            repo.name,
            path.display(),
            exit_code
        );
        if !output.is_empty() {
            error!("{}", output);
        }
        ArtifactOutcome::Failed(format!("git {} failed: {}", operation, output))
    }

    async fn sync_issues(&self, repo: &RepoDescriptor, entry: &MirrorEntry) -> ArtifactOutcome {
        let destination = entry.issues_file();

        let body = match self.directory.fetch_issues(repo).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not fetch issues for {}: {:#}", repo.name, e);
                return ArtifactOutcome::Failed(format!("{:#}", e));
            }
        };

        match tokio::fs::write(&destination, &body).await {
            Ok(()) => {
                debug!("Wrote {} bytes to {}", body.len(), destination.display());
                ArtifactOutcome::Written
            }
            Err(e) => {
                warn!(
                    "Could not write issues for {} to {}: {}",
                    repo.name,
                    destination.display(),
                    e
                );
                ArtifactOutcome::Failed(format!("write {}: {}", destination.display(), e))
            }
        }
    }
}
