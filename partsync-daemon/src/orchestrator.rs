//! The sync orchestrator state machine.
//!
//! Owned by the control task and mutated only there. Background tasks
//! (presence detector, status poller, job workers) never touch it directly;
//! they post [`HudEvent`]s through the control queue.
//!
//! ```text
//!            PresenceAppeared (not frozen)
//!   Dormant ───────────────────────────────▶ ActiveMonitoring
//!      ▲                                          │
//!      └──────── PresenceVanished / Disconnected ─┘
//! ```
//!
//! `frozen` is orthogonal: while set, presence-appeared, connected, and sync
//! status events leave the HUD alone. Unfreezing re-derives the mode from
//! `connected`.

use std::sync::Arc;

use partsync_core::{JobCompletion, JobKind, SyncStatus};
use partsync_sync::{JobExecutor, JobRunner, StatusCallback, SyncStatusPoller};
use serde::Serialize;

use crate::hud::{Hud, HudError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Dormant,
    ActiveMonitoring,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionState {
    pub connected: bool,
    pub frozen: bool,
}

/// Everything the control task reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HudEvent {
    PresenceAppeared,
    PresenceVanished,
    Connected { project: Option<String> },
    Disconnected,
    FreezeToggled { frozen: bool },
    SyncStatus(SyncStatus),
    PullRequested,
    PushRequested,
    JobFinished(JobCompletion),
}

/// Start / stop / refresh of the periodic status check.
pub trait StatusMonitor: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn refresh(&mut self);
}

/// [`StatusMonitor`] backed by a [`SyncStatusPoller`] that reports through
/// `on_status`.
pub struct PollerMonitor {
    poller: SyncStatusPoller,
    on_status: StatusCallback,
}

impl PollerMonitor {
    pub fn new(poller: SyncStatusPoller, on_status: StatusCallback) -> Self {
        Self { poller, on_status }
    }
}

impl StatusMonitor for PollerMonitor {
    fn start(&mut self) {
        self.poller.start(self.on_status.clone());
    }

    fn stop(&mut self) {
        self.poller.stop();
    }

    fn refresh(&mut self) {
        self.poller.refresh();
    }
}

/// Collaborators handed to the orchestrator at construction.
pub struct Services {
    pub hud: Box<dyn Hud>,
    pub monitor: Box<dyn StatusMonitor>,
    pub jobs: Arc<dyn JobExecutor>,
    pub runner: JobRunner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobsSnapshot {
    pub pull: bool,
    pub push: bool,
}

/// Point-in-time view of the orchestrator, for `partsync daemon status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorSnapshot {
    pub mode: Mode,
    pub frozen: bool,
    pub connected: bool,
    pub project: Option<String>,
    pub sync_status: SyncStatus,
    pub jobs: JobsSnapshot,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct Orchestrator {
    services: Services,
    mode: Mode,
    state: ConnectionState,
    project: Option<String>,
    last_status: SyncStatus,
}

impl Orchestrator {
    /// Starts `Dormant` regardless of the world.
    pub fn new(services: Services) -> Self {
        let mut orchestrator = Self {
            services,
            mode: Mode::Dormant,
            state: ConnectionState::default(),
            project: None,
            last_status: SyncStatus::Unknown,
        };
        orchestrator.enter_dormant();
        orchestrator
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            mode: self.mode,
            frozen: self.state.frozen,
            connected: self.state.connected,
            project: self.project.clone(),
            sync_status: self.last_status,
            jobs: JobsSnapshot {
                pull: self.services.runner.in_progress(JobKind::Pull),
                push: self.services.runner.in_progress(JobKind::Push),
            },
        }
    }

    pub fn handle(&mut self, event: HudEvent) {
        match event {
            HudEvent::PresenceAppeared => {
                if self.state.frozen {
                    tracing::info!("host appeared; ignored while frozen");
                    return;
                }
                tracing::info!("host appeared");
                self.enter_active_monitoring();
                self.services.monitor.start();
            }
            HudEvent::PresenceVanished => {
                tracing::info!("host vanished");
                self.services.monitor.stop();
                self.enter_dormant();
            }
            HudEvent::Connected { project } => {
                self.state.connected = true;
                self.project = project;
                if self.state.frozen {
                    tracing::info!(project = ?self.project, "connected; ignored while frozen");
                    return;
                }
                tracing::info!(project = ?self.project, "connected");
                self.enter_active_monitoring();
            }
            HudEvent::Disconnected => {
                tracing::info!("disconnected");
                self.state.connected = false;
                self.project = None;
                self.enter_dormant();
            }
            HudEvent::FreezeToggled { frozen } => {
                tracing::info!(frozen, "freeze toggled");
                self.state.frozen = frozen;
                self.hud("show_frozen", |hud| hud.show_frozen(frozen));
                if frozen {
                    return;
                }
                if self.state.connected {
                    self.enter_active_monitoring();
                } else {
                    self.enter_dormant();
                }
            }
            HudEvent::SyncStatus(status) => {
                self.last_status = status;
                tracing::info!(status = %status, "sync status update");
                if self.state.frozen {
                    return;
                }
                self.hud("set_status", |hud| hud.set_status(status));
            }
            HudEvent::PullRequested => self.request_job(JobKind::Pull),
            HudEvent::PushRequested => self.request_job(JobKind::Push),
            HudEvent::JobFinished(JobCompletion { kind, outcome }) => {
                if outcome.success {
                    tracing::info!(kind = %kind, "job succeeded");
                } else {
                    tracing::error!(kind = %kind, message = %outcome.message, "job failed");
                }
                self.hud("notify", |hud| {
                    hud.notify(kind, outcome.success, &outcome.message)
                });
                self.services.runner.complete(kind);
                if outcome.success {
                    self.services.monitor.refresh();
                }
            }
        }
    }

    /// Stop background polling. Called once when the control task exits.
    pub fn shutdown(&mut self) {
        self.services.monitor.stop();
    }

    fn request_job(&mut self, kind: JobKind) {
        tracing::info!(kind = %kind, "job requested");
        let jobs = self.services.jobs.clone();
        self.services.runner.submit_to(kind, jobs);
    }

    fn enter_active_monitoring(&mut self) {
        self.mode = Mode::ActiveMonitoring;
        let project = self.project.clone();
        self.hud("show_active", |hud| hud.show_active(project.as_deref()));
    }

    fn enter_dormant(&mut self) {
        self.mode = Mode::Dormant;
        self.hud("enter_dormant", |hud| hud.enter_dormant());
    }

    fn hud(&mut self, call: &'static str, f: impl FnOnce(&mut dyn Hud) -> Result<(), HudError>) {
        if let Err(err) = f(self.services.hud.as_mut()) {
            tracing::warn!(call, error = %err, "HUD call failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
