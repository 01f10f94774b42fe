//! Periodic sync status polling.
//!
//! The loop reports `unknown` as soon as it starts, then alternates between a
//! status check and an interruptible wait. Stopping never joins: the loop is
//! signalled and detached, and any check still in flight is cancelled (its git
//! child is killed) so no stale result reaches the callback.

use std::sync::Arc;
use std::time::Duration;

use partsync_core::{DispatchError, SyncStatus};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::status::StatusSource;

/// Receives every classification the poller produces.
pub type StatusCallback = Arc<dyn Fn(SyncStatus) -> Result<(), DispatchError> + Send + Sync>;

struct PollLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct SyncStatusPoller {
    source: Arc<dyn StatusSource>,
    interval: Duration,
    refresh: Arc<Notify>,
    running: Option<PollLoop>,
}

impl SyncStatusPoller {
    pub fn new(source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        Self {
            source,
            interval,
            refresh: Arc::new(Notify::new()),
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .map(|r| !r.handle.is_finished())
            .unwrap_or(false)
    }

    /// Spawn the polling loop. No-op while a loop is already running.
    pub fn start(&mut self, on_status: StatusCallback) {
        if self.is_running() {
            tracing::debug!("status poller already running");
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(poll_loop(
            self.source.clone(),
            self.interval,
            on_status,
            stop_rx,
            self.refresh.clone(),
        ));
        self.running = Some(PollLoop { stop_tx, handle });
        tracing::info!(interval_secs = self.interval.as_secs(), "status poller started");
    }

    /// Signal the loop to exit and detach it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(true);
            tracing::info!("status poller stopped");
        }
    }

    /// Cut the current wait short and check again now.
    pub fn refresh(&self) {
        if self.is_running() {
            self.refresh.notify_one();
        }
    }
}

impl Drop for SyncStatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(
    source: Arc<dyn StatusSource>,
    interval: Duration,
    on_status: StatusCallback,
    mut stop_rx: watch::Receiver<bool>,
    refresh: Arc<Notify>,
) {
    report(&on_status, SyncStatus::Unknown);

    loop {
        let status = tokio::select! {
            biased;
            _ = stop_requested(&mut stop_rx) => break,
            result = source.check() => match result {
                Ok(status) => status,
                Err(err) => {
                    tracing::warn!(error = %err, "status check failed");
                    SyncStatus::Unknown
                }
            },
        };

        if *stop_rx.borrow() {
            tracing::debug!(status = %status, "discarding status computed after stop");
            break;
        }
        report(&on_status, status);

        tokio::select! {
            biased;
            _ = stop_requested(&mut stop_rx) => break,
            _ = refresh.notified() => tracing::debug!("status refresh requested"),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn report(on_status: &StatusCallback, status: SyncStatus) {
    if let Err(err) = on_status(status) {
        tracing::warn!(error = %err, status = %status, "failed to deliver sync status");
    }
}

/// Resolves once a stop is signalled or the poller handle is gone.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}
