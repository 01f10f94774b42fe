//! User-triggered pull and push jobs.
//!
//! Each job reloads settings, runs exactly one git command against the
//! configured repository, and folds every possible result (including config
//! errors, a missing `git`, and timeouts) into a [`JobOutcome`] carrying a
//! user-facing message. Nothing here returns `Err`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use partsync_core::{settings, JobKind, JobOutcome, RepositoryTarget};

use crate::error::GitError;
use crate::git::GitClient;

/// Upper bound for a pull or push.
pub const JOB_GIT_TIMEOUT: Duration = Duration::from_secs(30);

pub const PULL_UP_TO_DATE_MESSAGE: &str =
    "No changes were pulled.\n\nThe KiCad libraries are already up to date.";
pub const PULL_UPDATED_MESSAGE: &str =
    "Library successfully updated from remote.\n\nChanges will take effect after restarting KiCad.";
pub const PULL_TIMEOUT_MESSAGE: &str = "Timed out while running 'git pull'.\n\n\
     This usually means the remote is unreachable or Git is waiting for credentials.\n\
     Please verify your network and stored credentials, then try again.";
pub const GIT_NOT_FOUND_MESSAGE: &str = "Git executable not found. Please install Git and try again.";
pub const PUSH_OK_MESSAGE: &str = "git push completed successfully.";
pub const PUSH_UNKNOWN_FAILURE_MESSAGE: &str = "git push failed with unknown error.";

/// Runs a job of the given kind to completion.
#[async_trait]
pub trait JobExecutor: Send + Sync + 'static {
    async fn run(&self, kind: JobKind) -> JobOutcome;
}

/// Production executor: settings file + real git.
#[derive(Debug, Clone)]
pub struct GitJobs {
    settings_path: PathBuf,
    git: GitClient,
}

impl GitJobs {
    pub fn new(settings_path: impl Into<PathBuf>, git: GitClient) -> Self {
        Self {
            settings_path: settings_path.into(),
            git,
        }
    }
}

#[async_trait]
impl JobExecutor for GitJobs {
    async fn run(&self, kind: JobKind) -> JobOutcome {
        let target = match settings::load_target_from(&self.settings_path) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "cannot run job: settings unusable");
                return JobOutcome::failure(err.to_string());
            }
        };
        match kind {
            JobKind::Pull => pull_once(&self.git, &target, JOB_GIT_TIMEOUT).await,
            JobKind::Push => push_once(&self.git, &target, JOB_GIT_TIMEOUT).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

/// `git -C <path> pull --ff-only <remote>`.
pub async fn pull_once(git: &GitClient, target: &RepositoryTarget, timeout: Duration) -> JobOutcome {
    let args = ["pull", "--ff-only", target.remote_name.as_str()];
    let output = match git.run(&target.local_path, &args, timeout).await {
        Ok(output) => output,
        Err(GitError::Timeout { .. }) => return JobOutcome::failure(PULL_TIMEOUT_MESSAGE),
        Err(GitError::NotFound) => return JobOutcome::failure(GIT_NOT_FOUND_MESSAGE),
        Err(err) => {
            return JobOutcome::failure(format!("Unexpected error while running git pull: {err}"))
        }
    };

    if output.success() {
        let combined = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
        if combined.contains("already up to date") || combined.contains("already up-to-date") {
            return JobOutcome::success(PULL_UP_TO_DATE_MESSAGE);
        }
        return JobOutcome::success(PULL_UPDATED_MESSAGE);
    }

    let detail = output
        .detail()
        .unwrap_or_else(|| "Unknown git error.".to_string());
    JobOutcome::failure(format!(
        "Failed to pull from remote.\n\nCommand: {}\n\n{detail}",
        git.command_line(&target.local_path, &args)
    ))
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

/// `git -C <path> push <remote>`.
pub async fn push_once(git: &GitClient, target: &RepositoryTarget, timeout: Duration) -> JobOutcome {
    let args = ["push", target.remote_name.as_str()];
    let output = match git.run(&target.local_path, &args, timeout).await {
        Ok(output) => output,
        Err(GitError::Timeout { after, .. }) => {
            return JobOutcome::failure(format!(
                "git push timed out after {} seconds",
                after.as_secs()
            ))
        }
        Err(GitError::NotFound) => return JobOutcome::failure(GIT_NOT_FOUND_MESSAGE),
        Err(err) => {
            return JobOutcome::failure(format!("Unexpected error while running git push: {err}"))
        }
    };

    if !output.success() {
        let message = [output.stderr, output.stdout]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| PUSH_UNKNOWN_FAILURE_MESSAGE.to_string());
        return JobOutcome::failure(message);
    }

    if output.stdout.is_empty() {
        JobOutcome::success(PUSH_OK_MESSAGE)
    } else {
        JobOutcome::success(output.stdout)
    }
}
