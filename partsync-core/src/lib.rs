//! partsync core library — domain types, settings persistence, errors.
//!
//! - [`types`] — sync status, job kinds, presence events, repository target
//! - [`error`] — [`ConfigError`], [`DispatchError`]
//! - [`settings`] — load / save `~/.partsync/settings.yaml`

pub mod error;
pub mod settings;
pub mod types;

pub use error::{ConfigError, DispatchError};
pub use settings::{RepositorySettings, Settings};
pub use types::{
    JobCompletion, JobKind, JobOutcome, PresenceEvent, RepositoryTarget, SyncStatus,
};
