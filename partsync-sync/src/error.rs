//! Error types for partsync-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use partsync_core::ConfigError;

/// All errors a status check can produce.
///
/// The three families stay distinguishable so callers can tell "fix your
/// settings" apart from "fix your checkout" apart from "git itself failed".
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryStateError),

    #[error("git error: {0}")]
    Git(#[from] GitError),
}

/// The working copy is not in a state the checker can reason about.
#[derive(Debug, Error)]
pub enum RepositoryStateError {
    #[error("repository path does not exist or is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    #[error("repository at {path} is bare; expected a working copy")]
    Bare { path: PathBuf },

    #[error("remote '{remote}' not found in repository at {path}")]
    MissingRemote { remote: String, path: PathBuf },

    #[error("remote branch '{reference}' not found after fetch")]
    MissingBranch { reference: String },
}

/// Failure of one `git` subprocess.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("git executable not found")]
    NotFound,

    #[error("'{command}' timed out after {} seconds", .after.as_secs())]
    Timeout { command: String, after: Duration },

    #[error("'{command}' exited with {status}: {detail}")]
    Failed {
        command: String,
        status: String,
        detail: String,
    },

    #[error("I/O error running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected output from '{command}': {output:?}")]
    Parse { command: String, output: String },
}
