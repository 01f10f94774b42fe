//! The control queue: a single task that owns the [`Orchestrator`] and
//! drains messages in FIFO order.
//!
//! Everything that happens off the control task (presence edges, status
//! reports, finished jobs, socket commands) reaches the orchestrator as a
//! [`ControlMessage`] through a [`ControlHandle`].

use std::sync::Arc;

use partsync_core::{DispatchError, PresenceEvent};
use partsync_detector::PresenceSink;
use partsync_sync::{CompletionSink, StatusCallback};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::DaemonError;
use crate::orchestrator::{HudEvent, Orchestrator, OrchestratorSnapshot};

pub enum ControlMessage {
    Event(HudEvent),
    Snapshot(oneshot::Sender<OrchestratorSnapshot>),
}

/// Cloneable sender side of the control queue.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControlHandle {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControlMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn post(&self, event: HudEvent) -> Result<(), DispatchError> {
        let label = event_label(&event);
        self.tx
            .send(ControlMessage::Event(event))
            .map_err(|_| DispatchError(label))
    }

    /// Ask the control task for a snapshot and wait for the reply.
    pub async fn snapshot(&self) -> Result<OrchestratorSnapshot, DaemonError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Snapshot(tx))
            .map_err(|_| DaemonError::ChannelClosed("control queue"))?;
        rx.await
            .map_err(|_| DaemonError::ChannelClosed("snapshot reply"))
    }

    pub fn presence_sink(&self) -> PresenceSink {
        let handle = self.clone();
        Arc::new(move |event| {
            handle.post(match event {
                PresenceEvent::Appeared => HudEvent::PresenceAppeared,
                PresenceEvent::Vanished => HudEvent::PresenceVanished,
            })
        })
    }

    pub fn status_callback(&self) -> StatusCallback {
        let handle = self.clone();
        Arc::new(move |status| handle.post(HudEvent::SyncStatus(status)))
    }

    pub fn completion_sink(&self) -> CompletionSink {
        let handle = self.clone();
        Arc::new(move |completion| handle.post(HudEvent::JobFinished(completion)))
    }
}

fn event_label(event: &HudEvent) -> &'static str {
    match event {
        HudEvent::PresenceAppeared => "presence appeared",
        HudEvent::PresenceVanished => "presence vanished",
        HudEvent::Connected { .. } => "connected",
        HudEvent::Disconnected => "disconnected",
        HudEvent::FreezeToggled { .. } => "freeze toggle",
        HudEvent::SyncStatus(_) => "sync status",
        HudEvent::PullRequested => "pull request",
        HudEvent::PushRequested => "push request",
        HudEvent::JobFinished(_) => "job completion",
    }
}

/// Drain the control queue until shutdown or until every sender is gone.
pub async fn control_loop(
    mut orchestrator: Orchestrator,
    mut rx: mpsc::UnboundedReceiver<ControlMessage>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            message = rx.recv() => {
                let Some(message) = message else { break };
                match message {
                    ControlMessage::Event(event) => orchestrator.handle(event),
                    ControlMessage::Snapshot(reply) => {
                        let _ = reply.send(orchestrator.snapshot());
                    }
                }
            }
        }
    }

    orchestrator.shutdown();
    tracing::info!("control task stopped");
    Ok(())
}
