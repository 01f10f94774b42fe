//! `partsync init <path> [--remote <name>] [--name <name>] [--poll-interval <secs>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use partsync_core::settings::{self, MIN_POLL_INTERVAL_SECS};
use partsync_core::{ConfigError, RepositorySettings, Settings};

/// Point partsync at a parts-library checkout.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the git working copy of the parts library.
    pub path: PathBuf,

    /// Remote to compare against and pull from.
    #[arg(long, short = 'r')]
    pub remote: Option<String>,

    /// Display name for the library in logs and messages.
    #[arg(long, short = 'n')]
    pub name: Option<String>,

    /// Seconds between background status checks (minimum 30).
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let path = self
            .path
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.path.display()))?;
        if !path.is_dir() {
            anyhow::bail!("'{}' is not a directory", path.display());
        }

        // Re-running init keeps the presence settings a user may have tuned.
        let mut current = match settings::load() {
            Ok(current) => current,
            Err(ConfigError::SettingsNotFound { .. }) => Settings::default(),
            Err(err) => return Err(err).context("failed to read existing settings"),
        };

        current.repository = Some(RepositorySettings {
            name: self.name,
            local_path: Some(path.clone()),
            remote_name: self.remote,
        });
        if let Some(secs) = self.poll_interval {
            if secs < MIN_POLL_INTERVAL_SECS {
                println!("poll interval raised to the {MIN_POLL_INTERVAL_SECS}s minimum");
            }
            current.poll_interval_secs = secs.max(MIN_POLL_INTERVAL_SECS);
        }

        let saved = settings::save(&current).context("failed to write settings")?;

        println!("✓ Tracking parts library at '{}'", path.display());
        println!("  Saved to: {}", saved.display());
        Ok(())
    }
}
