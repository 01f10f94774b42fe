//! # partsync-sync
//!
//! Git-facing half of the engine: status checks, the periodic poller, and
//! single-flight pull / push jobs.
//!
//! - [`check_status`] classifies the working copy against its remote branch
//! - [`SyncStatusPoller`] repeats that check on an interval
//! - [`JobRunner`] runs [`pull_once`] / [`push_once`] at most once per kind

pub mod error;
pub mod git;
pub mod jobs;
pub mod poller;
pub mod runner;
pub mod status;

pub use error::{GitError, RepositoryStateError, SyncError};
pub use git::{GitClient, GitOutput};
pub use jobs::{pull_once, push_once, GitJobs, JobExecutor, JOB_GIT_TIMEOUT};
pub use poller::{StatusCallback, SyncStatusPoller};
pub use runner::{CompletionSink, JobRunner, JobSlots};
pub use status::{
    check_status, sanitize_remote_url, SettingsStatusSource, StatusSource, STATUS_GIT_TIMEOUT,
};
