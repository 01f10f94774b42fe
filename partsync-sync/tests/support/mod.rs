//! Throwaway git repositories for integration tests.
//!
//! Layout inside one `TempDir`:
//!
//! ```text
//! remote.git/   bare, HEAD -> main
//! work/         clone tracking origin/main, one commit pushed
//! ```

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use partsync_core::RepositoryTarget;
use tempfile::TempDir;

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking on failure. Returns trimmed stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "commit.gpgsign=false", "-c", "init.defaultBranch=main"])
        .args(args)
        .env("GIT_AUTHOR_NAME", "Parts Bot")
        .env("GIT_AUTHOR_EMAIL", "parts@example.com")
        .env("GIT_COMMITTER_NAME", "Parts Bot")
        .env("GIT_COMMITTER_EMAIL", "parts@example.com")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub struct Fixture {
    pub tmp: TempDir,
    pub remote: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("tempdir");
        let remote = tmp.path().join("remote.git");
        let work = tmp.path().join("work");

        git(tmp.path(), &["init", "--bare", "remote.git"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        git(tmp.path(), &["init", "work"]);
        git(&work, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        commit(&work, "footprints.kicad_mod", "(footprint R_0603)");
        git(&work, &["remote", "add", "origin", &remote.display().to_string()]);
        git(&work, &["push", "-u", "origin", "main"]);

        Self { tmp, remote, work }
    }

    /// A second clone of the remote, for simulating another contributor.
    pub fn clone_as(&self, name: &str) -> PathBuf {
        git(
            self.tmp.path(),
            &["clone", &self.remote.display().to_string(), name],
        );
        self.tmp.path().join(name)
    }

    /// Another contributor pushes one commit.
    pub fn push_from_elsewhere(&self, name: &str) {
        let other = self.clone_as(name);
        commit(&other, &format!("{name}.kicad_sym"), "(symbol)");
        git(&other, &["push", "origin", "main"]);
    }

    pub fn target(&self) -> RepositoryTarget {
        RepositoryTarget::new("parts", &self.work)
    }
}

pub fn commit(dir: &Path, file: &str, contents: &str) {
    fs::write(dir.join(file), contents).expect("write file");
    git(dir, &["add", file]);
    git(dir, &["commit", "-m", &format!("add {file}")]);
}
