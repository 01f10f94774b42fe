use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;

fn partsync_bin() -> PathBuf {
    PathBuf::from(assert_cmd::cargo::cargo_bin!("partsync"))
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path) -> Self {
        let child = Command::new(partsync_bin())
            .env("HOME", home)
            .env("USERPROFILE", home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");
        Self {
            child,
            home: home.to_path_buf(),
        }
    }

    fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return true;
            }
            sleep(Duration::from_millis(50));
        }
        false
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        let _ = run(&self.home, &["daemon", "stop"]);
        if !self.wait_for_exit(Duration::from_secs(3)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn run(home: &Path, args: &[&str]) -> Output {
    Command::new(partsync_bin())
        .env("HOME", home)
        .env("USERPROFILE", home)
        .args(args)
        .output()
        .expect("run partsync")
}

fn status(home: &Path) -> Value {
    let output = run(home, &["daemon", "status"]);
    assert!(output.status.success(), "daemon status failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("status JSON")
}

fn wait_until_running(home: &Path) -> Value {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = status(home);
        if snapshot["running"] == Value::Bool(true) {
            return snapshot;
        }
        assert!(Instant::now() < deadline, "daemon never came up");
        sleep(Duration::from_millis(100));
    }
}

#[test]
fn daemon_tracks_connection_and_freeze_through_the_cli() {
    let home = TempDir::new().expect("home");
    let mut daemon = DaemonProcess::start(home.path());

    let snapshot = wait_until_running(home.path());
    assert_eq!(snapshot["mode"], "dormant");
    assert_eq!(snapshot["sync_status"], "unknown");

    assert!(run(home.path(), &["connect", "--project", "amp-board"])
        .status
        .success());
    let snapshot = status(home.path());
    assert_eq!(snapshot["mode"], "active_monitoring");
    assert_eq!(snapshot["project"], "amp-board");

    assert!(run(home.path(), &["freeze"]).status.success());
    assert!(run(home.path(), &["disconnect"]).status.success());
    let snapshot = status(home.path());
    assert_eq!(snapshot["frozen"], true);
    assert_eq!(snapshot["connected"], false);
    assert_eq!(snapshot["mode"], "dormant");

    let stop = run(home.path(), &["daemon", "stop"]);
    assert!(stop.status.success());
    assert!(daemon.wait_for_exit(Duration::from_secs(10)), "daemon did not exit");
}

#[test]
fn pull_without_configured_library_is_reported_as_a_failed_job() {
    let home = TempDir::new().expect("home");
    let _daemon = DaemonProcess::start(home.path());
    wait_until_running(home.path());

    // The request is accepted; the job itself fails and releases its slot.
    assert!(run(home.path(), &["pull"]).status.success());
    let deadline = Instant::now() + Duration::from_secs(10);
    while status(home.path())["jobs"]["pull"] == true {
        assert!(Instant::now() < deadline, "pull slot never released");
        sleep(Duration::from_millis(50));
    }
}
