//! The heads-up display the orchestrator drives.
//!
//! Rendering is out of scope for the daemon; [`TracingHud`] records every
//! call as a structured log event so a front end (or a human) can follow
//! along with `RUST_LOG=partsync::hud=info`.

use partsync_core::{JobKind, SyncStatus};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("HUD unavailable: {0}")]
pub struct HudError(pub String);

pub trait Hud: Send {
    fn set_status(&mut self, status: SyncStatus) -> Result<(), HudError>;

    /// Become visible, optionally labelled with the open project.
    fn show_active(&mut self, project: Option<&str>) -> Result<(), HudError>;

    fn enter_dormant(&mut self) -> Result<(), HudError>;

    fn show_frozen(&mut self, frozen: bool) -> Result<(), HudError>;

    /// Surface the result of a finished job.
    fn notify(&mut self, kind: JobKind, success: bool, message: &str) -> Result<(), HudError>;
}

#[derive(Debug, Default)]
pub struct TracingHud;

impl Hud for TracingHud {
    fn set_status(&mut self, status: SyncStatus) -> Result<(), HudError> {
        tracing::info!(target: "partsync::hud", status = %status, "status");
        Ok(())
    }

    fn show_active(&mut self, project: Option<&str>) -> Result<(), HudError> {
        tracing::info!(target: "partsync::hud", project = project.unwrap_or("-"), "active");
        Ok(())
    }

    fn enter_dormant(&mut self) -> Result<(), HudError> {
        tracing::info!(target: "partsync::hud", "dormant");
        Ok(())
    }

    fn show_frozen(&mut self, frozen: bool) -> Result<(), HudError> {
        tracing::info!(target: "partsync::hud", frozen, "frozen");
        Ok(())
    }

    fn notify(&mut self, kind: JobKind, success: bool, message: &str) -> Result<(), HudError> {
        if success {
            tracing::info!(target: "partsync::hud", kind = %kind, message, "job succeeded");
        } else {
            tracing::error!(target: "partsync::hud", kind = %kind, message, "job failed");
        }
        Ok(())
    }
}
