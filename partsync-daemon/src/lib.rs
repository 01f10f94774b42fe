//! The partsync daemon: presence detection, status polling, and pull/push
//! jobs wired into one orchestrator behind a Unix socket.

pub mod control;
mod error;
pub mod hud;
pub mod orchestrator;
pub mod paths;
pub mod protocol;
mod runtime;

pub use control::{control_loop, ControlHandle, ControlMessage};
pub use error::DaemonError;
pub use hud::{Hud, HudError, TracingHud};
pub use orchestrator::{
    ConnectionState, HudEvent, JobsSnapshot, Mode, Orchestrator, OrchestratorSnapshot,
    PollerMonitor, Services, StatusMonitor,
};
pub use protocol::{
    request_command, request_status, request_stop, send_request, Command, DaemonRequest,
    DaemonResponse,
};
pub use runtime::{run, start_blocking, LOG_FORMAT_ENV};
