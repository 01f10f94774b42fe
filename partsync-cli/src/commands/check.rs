//! `partsync check` — one status check, no daemon involved.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use partsync_core::{settings, RepositoryTarget, SyncStatus};
use partsync_sync::{check_status, GitClient};

/// Arguments for `partsync check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    repository: &'a str,
    path: String,
    remote: &'a str,
    status: SyncStatus,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let target = settings::load_target_from(&settings::settings_path_at(&home))
            .context("no parts library configured — run `partsync init` first")?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let status = runtime
            .block_on(check_status(&GitClient::new(), &target))
            .with_context(|| format!("status check failed for '{}'", target.name))?;

        if self.json {
            let report = CheckReport {
                repository: &target.name,
                path: target.local_path.display().to_string(),
                remote: &target.remote_name,
                status,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render JSON")?
            );
            return Ok(());
        }

        print_line(&target, status);
        Ok(())
    }
}

fn print_line(target: &RepositoryTarget, status: SyncStatus) {
    let badge = match status {
        SyncStatus::Clean => "■".green().bold().to_string(),
        SyncStatus::Ahead | SyncStatus::Behind => "■".yellow().bold().to_string(),
        SyncStatus::Diverged => "■".red().bold().to_string(),
        SyncStatus::Unknown => "■".dimmed().to_string(),
    };
    println!(
        "{badge} {} ({}) is {} relative to {}",
        target.name,
        target.local_path.display(),
        status.as_str().bold(),
        target.remote_name
    );
}
