//! Thin async wrapper around the `git` executable.
//!
//! Every invocation runs as `git -C <repo> <args…>` with terminal prompts
//! disabled, stdin closed, and a hard deadline. When the deadline expires the
//! child is killed (`kill_on_drop`) and [`GitError::Timeout`] is returned, so a
//! remote waiting on credentials can never wedge a caller.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::GitError;

pub const GIT_PROGRAM: &str = "git";

/// Captured result of one finished git subprocess.
#[derive(Debug, Clone)]
pub struct GitOutput {
    pub status: ExitStatus,
    /// Trimmed, lossily decoded stdout.
    pub stdout: String,
    /// Trimmed, lossily decoded stderr.
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// `stderr` and `stdout` joined by a blank line, or whichever is present.
    pub fn detail(&self) -> Option<String> {
        match (self.stderr.is_empty(), self.stdout.is_empty()) {
            (false, false) => Some(format!("{}\n\n{}", self.stderr, self.stdout)),
            (false, true) => Some(self.stderr.clone()),
            (true, false) => Some(self.stdout.clone()),
            (true, true) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitClient {
    program: PathBuf,
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GitClient {
    /// Resolve `git` through `PATH`.
    pub fn new() -> Self {
        Self::with_program(GIT_PROGRAM)
    }

    /// Use an explicit executable in place of `git`.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Human-readable command line, as shown in error messages.
    pub fn command_line(&self, repo: &Path, args: &[&str]) -> String {
        let mut parts = vec![
            self.program.display().to_string(),
            "-C".to_string(),
            repo.display().to_string(),
        ];
        parts.extend(args.iter().map(|a| a.to_string()));
        parts.join(" ")
    }

    /// Run one git command, returning its output whatever the exit status.
    pub async fn run(
        &self,
        repo: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<GitOutput, GitError> {
        let command = self.command_line(repo, args);
        tracing::debug!(command = %command, "running git");

        let mut argv: Vec<OsString> = vec!["-C".into(), repo.as_os_str().to_owned()];
        argv.extend(args.iter().map(OsString::from));

        let child = Command::new(&self.program)
            .args(&argv)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => GitError::NotFound,
                _ => GitError::Io {
                    command: command.clone(),
                    source,
                },
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| GitError::Io {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                tracing::warn!(command = %command, timeout_secs = timeout.as_secs(), "git timed out");
                return Err(GitError::Timeout {
                    command,
                    after: timeout,
                });
            }
        };

        Ok(GitOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Like [`run`](Self::run), but a non-zero exit becomes
    /// [`GitError::Failed`]. Returns trimmed stdout.
    pub async fn run_checked(
        &self,
        repo: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, GitError> {
        let output = self.run(repo, args, timeout).await?;
        if output.success() {
            return Ok(output.stdout);
        }
        Err(GitError::Failed {
            command: self.command_line(repo, args),
            status: output.status.to_string(),
            detail: output
                .detail()
                .unwrap_or_else(|| "no output".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
