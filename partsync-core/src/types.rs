//! Domain types shared by the detector, sync engine and daemon.
//!
//! Everything here is plain data: no I/O, no threads. Status values are
//! transient and always recomputed from git, so nothing in this module is
//! persisted except through [`crate::settings`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sync status
// ---------------------------------------------------------------------------

/// Divergence of the local working copy relative to its remote branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Not configured, not checked yet, or the check failed.
    #[default]
    Unknown,
    /// Local and remote point at the same history.
    Clean,
    /// Local has commits the remote lacks.
    Ahead,
    /// Remote has commits the local copy lacks.
    Behind,
    /// Both sides have unique commits, or HEAD is detached.
    Diverged,
}

impl SyncStatus {
    /// Classify from symmetric-difference commit counts.
    pub fn from_counts(ahead: u64, behind: u64) -> Self {
        match (ahead, behind) {
            (0, 0) => SyncStatus::Clean,
            (_, 0) => SyncStatus::Ahead,
            (0, _) => SyncStatus::Behind,
            _ => SyncStatus::Diverged,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Unknown => "unknown",
            SyncStatus::Clean => "clean",
            SyncStatus::Ahead => "ahead",
            SyncStatus::Behind => "behind",
            SyncStatus::Diverged => "diverged",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// The closed set of user-triggered repository jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Pull,
    Push,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Pull => "pull",
            JobKind::Push => "push",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one job attempt: a success flag plus user-facing text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub success: bool,
    pub message: String,
}

impl JobOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// A finished job, as handed back to the control task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    pub kind: JobKind,
    pub outcome: JobOutcome,
}

// ---------------------------------------------------------------------------
// Presence
// ---------------------------------------------------------------------------

/// Confirmed edge of the host application's presence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    Appeared,
    Vanished,
}

// ---------------------------------------------------------------------------
// Repository target
// ---------------------------------------------------------------------------

pub const DEFAULT_REMOTE: &str = "origin";

/// The repository the engine tracks. The branch is always the one currently
/// checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    /// Display name used in logs and messages.
    pub name: String,
    /// Absolute path of the working copy.
    pub local_path: PathBuf,
    pub remote_name: String,
}

impl RepositoryTarget {
    pub fn new(name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            local_path: local_path.into(),
            remote_name: DEFAULT_REMOTE.to_string(),
        }
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote_name = remote.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, SyncStatus::Clean)]
    #[case(3, 0, SyncStatus::Ahead)]
    #[case(0, 2, SyncStatus::Behind)]
    #[case(4, 1, SyncStatus::Diverged)]
    fn counts_classify(#[case] ahead: u64, #[case] behind: u64, #[case] expected: SyncStatus) {
        assert_eq!(SyncStatus::from_counts(ahead, behind), expected);
    }

    #[test]
    fn status_serializes_lowercase() {
        let yaml = serde_yaml::to_string(&SyncStatus::Behind).expect("serialize");
        assert_eq!(yaml.trim(), "behind");
    }

    #[test]
    fn default_remote_is_origin() {
        let target = RepositoryTarget::new("parts", "/tmp/parts");
        assert_eq!(target.remote_name, "origin");
        assert_eq!(target.with_remote("upstream").remote_name, "upstream");
    }
}
