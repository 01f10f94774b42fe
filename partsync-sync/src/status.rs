//! One-shot sync status check.
//!
//! [`check_status`] fetches the configured remote and classifies the checked
//! out branch against `<remote>/<branch>`:
//!
//! | ahead | behind | status     |
//! |-------|--------|------------|
//! | 0     | 0      | `clean`    |
//! | >0    | 0      | `ahead`    |
//! | 0     | >0     | `behind`   |
//! | >0    | >0     | `diverged` |
//!
//! A detached HEAD is reported as `diverged` without fetching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use partsync_core::{settings, RepositoryTarget, SyncStatus};
use url::Url;

use crate::error::{GitError, RepositoryStateError, SyncError};
use crate::git::GitClient;

/// Upper bound for each git subprocess issued by a status check.
pub const STATUS_GIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Anything that can produce a fresh [`SyncStatus`].
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn check(&self) -> Result<SyncStatus, SyncError>;
}

/// Re-reads the settings file on every check, then asks git.
#[derive(Debug, Clone)]
pub struct SettingsStatusSource {
    settings_path: PathBuf,
    git: GitClient,
}

impl SettingsStatusSource {
    pub fn new(settings_path: impl Into<PathBuf>, git: GitClient) -> Self {
        Self {
            settings_path: settings_path.into(),
            git,
        }
    }
}

#[async_trait]
impl StatusSource for SettingsStatusSource {
    async fn check(&self) -> Result<SyncStatus, SyncError> {
        let target = settings::load_target_from(&self.settings_path)?;
        check_status(&self.git, &target).await
    }
}

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

pub async fn check_status(
    git: &GitClient,
    target: &RepositoryTarget,
) -> Result<SyncStatus, SyncError> {
    let path = target.local_path.as_path();
    let remote = target.remote_name.as_str();

    if !path.is_dir() {
        return Err(RepositoryStateError::NotADirectory {
            path: path.to_path_buf(),
        }
        .into());
    }

    match git
        .run_checked(path, &["rev-parse", "--is-bare-repository"], STATUS_GIT_TIMEOUT)
        .await
    {
        Ok(out) if out == "true" => {
            return Err(RepositoryStateError::Bare {
                path: path.to_path_buf(),
            }
            .into())
        }
        Ok(_) => {}
        Err(GitError::Failed { .. }) => {
            return Err(RepositoryStateError::NotARepository {
                path: path.to_path_buf(),
            }
            .into())
        }
        Err(err) => return Err(err.into()),
    }

    // git searches parent directories; the configured path must be the root.
    let toplevel = match git
        .run_checked(path, &["rev-parse", "--show-toplevel"], STATUS_GIT_TIMEOUT)
        .await
    {
        Ok(toplevel) => toplevel,
        Err(GitError::Failed { .. }) => String::new(),
        Err(err) => return Err(err.into()),
    };
    if !same_directory(path, Path::new(&toplevel)) {
        tracing::warn!(
            repository = %target.name,
            path = %path.display(),
            toplevel = %toplevel,
            "configured path is inside another working copy"
        );
        return Err(RepositoryStateError::NotARepository {
            path: path.to_path_buf(),
        }
        .into());
    }

    let remotes = git.run_checked(path, &["remote"], STATUS_GIT_TIMEOUT).await?;
    if !remotes.lines().any(|r| r.trim() == remote) {
        return Err(RepositoryStateError::MissingRemote {
            remote: remote.to_string(),
            path: path.to_path_buf(),
        }
        .into());
    }

    let head = git
        .run(path, &["symbolic-ref", "-q", "--short", "HEAD"], STATUS_GIT_TIMEOUT)
        .await?;
    let branch = match head.status.code() {
        Some(0) if !head.stdout.is_empty() => head.stdout,
        Some(1) => {
            tracing::info!(
                repository = %target.name,
                path = %path.display(),
                remote,
                "HEAD is detached; treating as diverged"
            );
            return Ok(SyncStatus::Diverged);
        }
        _ => {
            return Err(GitError::Failed {
                command: git.command_line(path, &["symbolic-ref", "-q", "--short", "HEAD"]),
                status: head.status.to_string(),
                detail: head.detail().unwrap_or_else(|| "no output".to_string()),
            }
            .into())
        }
    };

    let remote_url = git
        .run_checked(path, &["remote", "get-url", remote], STATUS_GIT_TIMEOUT)
        .await
        .map(|u| sanitize_remote_url(&u))
        .unwrap_or_default();
    tracing::info!(repository = %target.name, remote, url = %remote_url, "fetching");
    git.run_checked(path, &["fetch", "--prune", remote], STATUS_GIT_TIMEOUT)
        .await?;

    let remote_ref = format!("{remote}/{branch}");
    let verify = git
        .run(
            path,
            &["rev-parse", "--verify", "--quiet", &format!("refs/remotes/{remote_ref}")],
            STATUS_GIT_TIMEOUT,
        )
        .await?;
    if !verify.success() {
        return Err(RepositoryStateError::MissingBranch {
            reference: remote_ref,
        }
        .into());
    }

    let range = format!("HEAD...{remote_ref}");
    let args = ["rev-list", "--left-right", "--count", range.as_str()];
    let counts = git.run_checked(path, &args, STATUS_GIT_TIMEOUT).await?;
    let (ahead, behind) = parse_counts(&counts).ok_or_else(|| GitError::Parse {
        command: git.command_line(path, &args),
        output: counts.clone(),
    })?;

    let status = SyncStatus::from_counts(ahead, behind);
    tracing::info!(
        repository = %target.name,
        reference = %remote_ref,
        ahead,
        behind,
        status = %status,
        "sync status"
    );
    Ok(status)
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parse `rev-list --left-right --count` output (`"<ahead>\t<behind>"`).
pub fn parse_counts(output: &str) -> Option<(u64, u64)> {
    let mut fields = output.split_whitespace();
    let ahead = fields.next()?.parse().ok()?;
    let behind = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((ahead, behind))
}

/// Strip `user:password@` from a URL before it is logged.
///
/// Values that do not parse as a URL with a host (scp-style `git@host:path`,
/// local paths) are returned unchanged.
pub fn sanitize_remote_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    if url.host_str().is_none() {
        return raw.trim().to_string();
    }
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.to_string()
}
