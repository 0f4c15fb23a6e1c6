//! ghmirror - Unattended GitHub Backup
//!
//! ghmirror mirrors every repository of a user or organization to local disk,
//! together with its wiki and a snapshot of its issues. It is meant to run from
//! a scheduler: every run converges the mirror to the current upstream state,
//! cloning what is new and updating what is already there.
//!
//! ## Modules
//!
//! - [`config`]: Configuration file and command line settings
//! - [`auth`]: Credentials and API endpoint
//! - [`github`]: Repository listing and issue snapshots
//! - [`git`]: `git` invocation and exit status classification
//! - [`sync`]: Per-repository clone-or-update engine
//! - [`driver`]: One complete run

pub mod auth;
pub mod config;
pub mod driver;
pub mod error;
pub mod git;
pub mod github;
pub mod sync;

pub use config::Config;
pub use driver::{run, RunReport};
pub use error::MirrorError;
pub use git::{GitCli, Vcs, VcsOutcome};
pub use github::{DirectoryClient, RepoDescriptor};
pub use sync::{ArtifactOutcome, RepositoryReport, SyncEngine};
