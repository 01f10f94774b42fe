//! Host-application presence detection for `partsync-detector`.
//!
//! [`PresenceDetector`] samples the OS process table on a fixed cadence and
//! emits [`PresenceEvent::Appeared`] / [`PresenceEvent::Vanished`] only after
//! two consecutive identical samples that differ from the last emitted state.
//! A single spurious read never flaps the HUD.

use std::io::ErrorKind;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use partsync_core::{DispatchError, PresenceEvent};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Upper bound on how long [`PresenceDetector::stop`] waits for the loop.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Errors from one process-table sample.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Callback receiving confirmed presence edges.
pub type PresenceSink = Arc<dyn Fn(PresenceEvent) -> Result<(), DispatchError> + Send + Sync>;

/// One sample of "is the host application running?".
///
/// Called from the blocking pool, never from the async runtime threads.
pub trait ProcessProbe: Send + Sync + 'static {
    fn host_running(&self) -> Result<bool, DetectError>;
}

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Two-sample confirmation state machine.
///
/// A candidate that differs from the armed one re-arms the window with a
/// count of 1; an identical candidate increments it. Failed samples are simply
/// not observed, so they neither re-arm nor confirm.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    is_up: bool,
    armed: Option<bool>,
    confirmations: u32,
}

impl Debouncer {
    pub const REQUIRED_CONFIRMATIONS: u32 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, up_now: bool) -> Option<PresenceEvent> {
        if self.armed == Some(up_now) {
            self.confirmations = self.confirmations.saturating_add(1);
        } else {
            self.armed = Some(up_now);
            self.confirmations = 1;
        }

        if self.confirmations < Self::REQUIRED_CONFIRMATIONS || self.is_up == up_now {
            return None;
        }

        self.is_up = up_now;
        Some(if up_now {
            PresenceEvent::Appeared
        } else {
            PresenceEvent::Vanished
        })
    }
}

// ---------------------------------------------------------------------------
// System process table
// ---------------------------------------------------------------------------

/// Probe backed by `ps` (Unix) or `tasklist` (Windows).
#[derive(Debug, Clone)]
pub struct SystemProcessTable {
    names: Vec<String>,
}

impl SystemProcessTable {
    /// `names` is the allow-list of executable base names, compared
    /// case-insensitively.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_ascii_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, process_name: &str) -> bool {
        let lower = process_name.trim().to_ascii_lowercase();
        self.names.iter().any(|n| *n == lower)
    }

    fn list_process_names() -> Result<Vec<String>, DetectError> {
        if cfg!(windows) {
            let stdout = run_listing("tasklist", &["/FO", "CSV", "/NH"])?;
            Ok(parse_tasklist_output(&stdout))
        } else {
            let stdout = run_listing("ps", &["-A", "-o", "comm="])?;
            Ok(parse_ps_output(&stdout))
        }
    }
}

impl ProcessProbe for SystemProcessTable {
    fn host_running(&self) -> Result<bool, DetectError> {
        Ok(Self::list_process_names()?
            .iter()
            .any(|name| self.matches(name)))
    }
}

fn run_listing(program: &'static str, args: &[&str]) -> Result<String, DetectError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| DetectError::Spawn { program, source })?;

    if !output.status.success() {
        return Err(DetectError::Failed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Extract executable base names from `ps -A -o comm=` output.
///
/// macOS reports full paths, Linux bare (possibly truncated) names.
pub fn parse_ps_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.rsplit('/').next().unwrap_or(line).to_string())
        .collect()
}

/// Extract image names from `tasklist /FO CSV /NH` output.
pub fn parse_tasklist_output(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('"'))
        .filter_map(|line| line[1..].split('"').next())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

// ---------------------------------------------------------------------------
// Background detector
// ---------------------------------------------------------------------------

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the sampling loop. Start and stop are idempotent.
pub struct PresenceDetector {
    probe: Arc<dyn ProcessProbe>,
    interval: Duration,
    running: Option<RunningLoop>,
}

impl PresenceDetector {
    pub fn new(probe: impl ProcessProbe, interval: Duration) -> Self {
        Self {
            probe: Arc::new(probe),
            interval,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the sampling loop on the current tokio runtime.
    pub fn start(&mut self, sink: PresenceSink) {
        if self.is_running() {
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(detect_loop(
            self.probe.clone(),
            self.interval,
            sink,
            stop_rx,
        ));
        self.running = Some(RunningLoop { stop_tx, handle });
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "presence detector started");
    }

    /// Signal the loop and wait up to [`STOP_TIMEOUT`] for it to exit.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.stop_tx.send(true);
        let mut handle = running.handle;
        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(_) => tracing::info!("presence detector stopped"),
            Err(_) => {
                tracing::warn!("presence detector did not stop in time; aborting");
                handle.abort();
            }
        }
    }
}

async fn detect_loop(
    probe: Arc<dyn ProcessProbe>,
    interval: Duration,
    sink: PresenceSink,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut debouncer = Debouncer::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let sample_probe = probe.clone();
        let sample = tokio::task::spawn_blocking(move || sample_probe.host_running()).await;
        let up_now = match sample {
            Ok(Ok(up)) => up,
            Ok(Err(err)) if is_missing_tool(&err) => {
                tracing::error!(error = %err, "process listing tool unavailable");
                continue;
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "presence sample failed");
                continue;
            }
            Err(err) => {
                tracing::warn!(error = %err, "presence sample task failed");
                continue;
            }
        };

        if *stop_rx.borrow() {
            break;
        }

        let Some(event) = debouncer.observe(up_now) else {
            continue;
        };
        match event {
            PresenceEvent::Appeared => tracing::info!("host application appeared"),
            PresenceEvent::Vanished => tracing::info!("host application vanished"),
        }
        if let Err(err) = sink(event) {
            tracing::warn!(error = %err, "failed to deliver presence event");
        }
    }
}

/// `true` when the error means the listing tool itself is unavailable.
pub fn is_missing_tool(err: &DetectError) -> bool {
    matches!(err, DetectError::Spawn { source, .. } if source.kind() == ErrorKind::NotFound)
}
