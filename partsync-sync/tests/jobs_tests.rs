//! Pull / push jobs against real repositories and scripted stand-ins for git.

mod support;

use std::path::PathBuf;
use std::time::Duration;

use partsync_core::{settings, JobKind, RepositorySettings, RepositoryTarget, Settings};
use partsync_sync::jobs::{
    GIT_NOT_FOUND_MESSAGE, PULL_UPDATED_MESSAGE, PULL_UP_TO_DATE_MESSAGE, PUSH_OK_MESSAGE,
};
use partsync_sync::{pull_once, push_once, GitClient, GitJobs, JobExecutor, JOB_GIT_TIMEOUT};
use support::{commit, git_available, Fixture};
use tempfile::TempDir;

macro_rules! skip_without_git {
    () => {
        if !git_available() {
            eprintln!("git not available; skipping");
            return;
        }
    };
}

// ---------------------------------------------------------------------------
// Pull
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pull_with_nothing_new_reports_up_to_date() {
    skip_without_git!();
    let fx = Fixture::new();
    let outcome = pull_once(&GitClient::new(), &fx.target(), JOB_GIT_TIMEOUT).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, PULL_UP_TO_DATE_MESSAGE);
}

#[tokio::test]
async fn pull_with_remote_changes_reports_update() {
    skip_without_git!();
    let fx = Fixture::new();
    fx.push_from_elsewhere("alice");
    let outcome = pull_once(&GitClient::new(), &fx.target(), JOB_GIT_TIMEOUT).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, PULL_UPDATED_MESSAGE);
    assert!(fx.work.join("alice.kicad_sym").exists());
}

#[tokio::test]
async fn pull_from_unknown_remote_fails_with_command_and_detail() {
    skip_without_git!();
    let fx = Fixture::new();
    let target = fx.target().with_remote("nowhere");
    let outcome = pull_once(&GitClient::new(), &target, JOB_GIT_TIMEOUT).await;
    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Failed to pull from remote."));
    assert!(outcome.message.contains("Command: git -C"));
    assert!(outcome.message.contains("pull --ff-only nowhere"));
    assert!(!outcome.message.to_lowercase().contains("timed out"));
}

// ---------------------------------------------------------------------------
// Push
// ---------------------------------------------------------------------------

#[tokio::test]
async fn push_of_local_commit_succeeds() {
    skip_without_git!();
    let fx = Fixture::new();
    commit(&fx.work, "local.kicad_sym", "(symbol)");
    let outcome = push_once(&GitClient::new(), &fx.target(), JOB_GIT_TIMEOUT).await;
    assert!(outcome.success, "{}", outcome.message);
    assert!(!outcome.message.is_empty());
}

#[tokio::test]
async fn push_to_unknown_remote_fails_with_git_output() {
    skip_without_git!();
    let fx = Fixture::new();
    let target = fx.target().with_remote("nowhere");
    let outcome = push_once(&GitClient::new(), &target, JOB_GIT_TIMEOUT).await;
    assert!(!outcome.success);
    assert!(!outcome.message.is_empty());
    assert_ne!(outcome.message, PUSH_OK_MESSAGE);
}

// ---------------------------------------------------------------------------
// Tool failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_git_executable_is_reported() {
    let tmp = TempDir::new().expect("tempdir");
    let git = GitClient::with_program(tmp.path().join("no-such-git"));
    let target = RepositoryTarget::new("parts", tmp.path());

    let pull = pull_once(&git, &target, JOB_GIT_TIMEOUT).await;
    let push = push_once(&git, &target, JOB_GIT_TIMEOUT).await;
    assert_eq!(pull.message, GIT_NOT_FOUND_MESSAGE);
    assert_eq!(push.message, GIT_NOT_FOUND_MESSAGE);
    assert!(!pull.success && !push.success);
}

#[cfg(unix)]
fn script(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    path
}

#[cfg(unix)]
#[tokio::test]
async fn hung_git_times_out_distinctly_from_failure() {
    let tmp = TempDir::new().expect("tempdir");
    let target = RepositoryTarget::new("parts", tmp.path());
    let slow = GitClient::with_program(script(tmp.path(), "slow-git", "sleep 10"));
    let failing = GitClient::with_program(script(
        tmp.path(),
        "failing-git",
        "echo 'fatal: could not read from remote' >&2\nexit 128",
    ));
    let deadline = Duration::from_millis(300);

    let pull_timeout = pull_once(&slow, &target, deadline).await;
    let push_timeout = push_once(&slow, &target, deadline).await;
    assert!(!pull_timeout.success);
    assert!(pull_timeout.message.to_lowercase().contains("timed out"));
    assert!(push_timeout.message.to_lowercase().contains("timed out"));

    let pull_failed = pull_once(&failing, &target, deadline).await;
    assert!(!pull_failed.success);
    assert!(pull_failed.message.contains("fatal: could not read from remote"));
    assert!(!pull_failed.message.to_lowercase().contains("timed out"));

    let push_failed = push_once(&failing, &target, deadline).await;
    assert_eq!(push_failed.message, "fatal: could not read from remote");
}

#[cfg(unix)]
#[tokio::test]
async fn silent_push_uses_canned_success_message() {
    let tmp = TempDir::new().expect("tempdir");
    let target = RepositoryTarget::new("parts", tmp.path());
    let quiet = GitClient::with_program(script(tmp.path(), "quiet-git", "exit 0"));
    let outcome = push_once(&quiet, &target, JOB_GIT_TIMEOUT).await;
    assert!(outcome.success);
    assert_eq!(outcome.message, PUSH_OK_MESSAGE);
}

// ---------------------------------------------------------------------------
// Settings-backed executor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn executor_without_settings_fails_with_config_text() {
    let home = TempDir::new().expect("home");
    let jobs = GitJobs::new(settings::settings_path_at(home.path()), GitClient::new());
    let outcome = jobs.run(JobKind::Pull).await;
    assert!(!outcome.success);
    assert!(outcome.message.contains("settings not found"));
}

#[tokio::test]
async fn executor_runs_against_configured_repository() {
    skip_without_git!();
    let fx = Fixture::new();
    let home = TempDir::new().expect("home");
    let path = settings::save_at(
        home.path(),
        &Settings {
            repository: Some(RepositorySettings {
                local_path: Some(fx.work.clone()),
                ..RepositorySettings::default()
            }),
            ..Settings::default()
        },
    )
    .expect("save settings");

    let jobs = GitJobs::new(path, GitClient::new());
    let outcome = jobs.run(JobKind::Pull).await;
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(outcome.message, PULL_UP_TO_DATE_MESSAGE);
}
