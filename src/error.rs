use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a mirror run.
///
/// Per-repository problems that the run tolerates (a failed incremental update,
/// an issues snapshot that could not be fetched) are not represented here; they
/// surface as [`crate::sync::ArtifactOutcome::Failed`] in the run report.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Required settings were not provided.
    #[error("Missing required configuration: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    /// The backup root could not be created or inspected.
    #[error("Could not create backup directory {}: {source}", .path.display())]
    BackupRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform rejected the credentials (HTTP 401).
    #[error("Authentication failed: {body}")]
    Authentication { body: String },

    /// The repository listing could not be fetched or decoded.
    #[error("Failed to fetch repository list: {message}")]
    DirectoryFetch { message: String },

    /// A git operation whose failures abort the run (the initial clone)
    /// exited with a non-benign status.
    #[error(
        "git {operation} for {repository} at {} failed (exit code {}): {output}",
        .path.display(),
        .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string())
    )]
    VcsFailed {
        operation: &'static str,
        repository: String,
        path: PathBuf,
        exit_code: Option<i32>,
        output: String,
    },
}

impl MirrorError {
    /// Create a directory fetch error.
    pub fn directory_fetch(message: impl Into<String>) -> Self {
        Self::DirectoryFetch {
            message: message.into(),
        }
    }
}
