use async_trait::async_trait;
use std::path::Path;
use std::process::{ExitStatus, Output};
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Exit status git uses for its generic fatal errors, including "destination
/// path already exists". Treated as "nothing to do" rather than a failure.
pub const BENIGN_EXIT_CODE: i32 = 128;

/// Classified result of one git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsOutcome {
    /// The command exited with status 0
    Success,
    /// The command exited with [`BENIGN_EXIT_CODE`]
    BenignNoop,
    /// Anything else, including failures to start the process
    Failure(VcsFailure),
}

/// Details of a failed git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsFailure {
    /// `None` when the process never ran, timed out, or was killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout and stderr, or the spawn error
    pub output: String,
}

impl VcsOutcome {
    pub fn failure(exit_code: Option<i32>, output: impl Into<String>) -> Self {
        Self::Failure(VcsFailure {
            exit_code,
            output: output.into(),
        })
    }
}

/// Map an exit status and captured output to a [`VcsOutcome`]
pub fn classify_exit(status: ExitStatus, output: &str) -> VcsOutcome {
    if status.success() {
        return VcsOutcome::Success;
    }
    match status.code() {
        Some(BENIGN_EXIT_CODE) => VcsOutcome::BenignNoop,
        code => VcsOutcome::failure(code, output),
    }
}

/// Version-control operations the sync engine needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `source` into `destination`, creating leading directories
    async fn clone_repo(&self, source: &str, destination: &Path) -> VcsOutcome;

    /// Fetch from the default remote, pruning deleted refs
    async fn fetch(&self, working_dir: &Path) -> VcsOutcome;

    /// Integrate the upstream branch into the checkout
    async fn pull(&self, working_dir: &Path) -> VcsOutcome;
}

/// [`Vcs`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    timeout: Option<Duration>,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
            timeout: None,
        }
    }

    /// Bound every git process by `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, command: &mut AsyncCommand) -> VcsOutcome {
        // Never block on a credential prompt
        command.env("GIT_TERMINAL_PROMPT", "0").kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    return VcsOutcome::failure(
                        None,
                        format!("git timed out after {}s", limit.as_secs()),
                    )
                }
            },
            None => command.output().await,
        };

        match output {
            Ok(output) => classify_exit(output.status, &combined_output(&output)),
            Err(e) => VcsOutcome::failure(None, format!("Failed to execute {}: {}", self.program, e)),
        }
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (true, _) => stderr.trim().to_string(),
        (false, true) => stdout.trim().to_string(),
        (false, false) => format!("{}\n{}", stdout.trim(), stderr.trim()),
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn clone_repo(&self, source: &str, destination: &Path) -> VcsOutcome {
        debug!("git clone into {}", destination.display());

        let mut command = AsyncCommand::new(&self.program);
        command.arg("clone").arg(source).arg(destination);
        self.run(&mut command).await
    }

    async fn fetch(&self, working_dir: &Path) -> VcsOutcome {
        debug!("git fetch -p in {}", working_dir.display());

        let mut command = AsyncCommand::new(&self.program);
        command.args(["fetch", "-p"]).current_dir(working_dir);
        self.run(&mut command).await
    }

    async fn pull(&self, working_dir: &Path) -> VcsOutcome {
        debug!("git pull in {}", working_dir.display());

        let mut command = AsyncCommand::new(&self.program);
        command.arg("pull").current_dir(working_dir);
        self.run(&mut command).await
    }
}
