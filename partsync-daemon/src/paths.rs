use std::path::{Path, PathBuf};

pub use partsync_core::settings::{partsync_root, settings_path_at};

pub const DAEMON_SOCKET: &str = "daemon.sock";

/// `<home>/.partsync/daemon.sock`
pub fn socket_path(home: &Path) -> PathBuf {
    partsync_root(home).join(DAEMON_SOCKET)
}
