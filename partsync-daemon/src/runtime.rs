use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;

use partsync_core::{settings, Settings};
use partsync_detector::{PresenceDetector, SystemProcessTable};
use partsync_sync::{GitClient, GitJobs, JobRunner, SettingsStatusSource, SyncStatusPoller};

use crate::control::{control_loop, ControlHandle};
use crate::error::{io_err, DaemonError};
use crate::hud::TracingHud;
use crate::orchestrator::{HudEvent, Orchestrator, PollerMonitor, Services};
use crate::paths::{partsync_root, socket_path};
use crate::protocol::{Command, DaemonRequest, DaemonResponse};

/// `json` selects one JSON object per log line; anything else is human text.
pub const LOG_FORMAT_ENV: &str = "PARTSYNC_LOG_FORMAT";

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let settings_path = settings::settings_path_at(&home);
    let settings = load_settings_or_default(&settings_path);
    let started_at_unix = unix_seconds_now();

    let (control, control_rx) = ControlHandle::channel();
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let git = GitClient::new();
    let poller = SyncStatusPoller::new(
        Arc::new(SettingsStatusSource::new(&settings_path, git.clone())),
        settings.poll_interval(),
    );
    let services = Services {
        hud: Box::new(TracingHud),
        monitor: Box::new(PollerMonitor::new(poller, control.status_callback())),
        jobs: Arc::new(GitJobs::new(&settings_path, git)),
        runner: JobRunner::new(control.completion_sink()),
    };

    let mut detector = PresenceDetector::new(
        SystemProcessTable::new(&settings.host_processes),
        settings.presence_interval(),
    );
    detector.start(control.presence_sink());

    let control_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            let orchestrator = Orchestrator::new(services);
            let result = control_loop(orchestrator, control_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let home = home.clone();
        let control = control.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(home, control, shutdown.clone(), shutdown_rx, started_at_unix)
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    tracing::info!(
        settings = %settings_path.display(),
        poll_interval_secs = settings.poll_interval().as_secs(),
        "partsync daemon started"
    );

    let (control_result, socket_result, signal_result) =
        tokio::join!(control_handle, socket_handle, signal_handle);

    detector.stop().await;

    handle_join("control", control_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    tracing::info!("partsync daemon stopped");
    Ok(())
}

/// Missing or broken settings never stop the daemon; the status simply stays
/// `unknown` until the file is fixed (it is re-read on every check).
fn load_settings_or_default(path: &Path) -> Settings {
    match settings::load_file(path) {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!(error = %err, "using default settings");
            Settings::default()
        }
    }
}

async fn socket_server_task(
    home: PathBuf,
    control: ControlHandle,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let control = control.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(
                        stream,
                        home,
                        control,
                        shutdown_tx,
                        started_at_unix,
                    ).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    control: ControlHandle,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd;
        let response = dispatch(request, &home, &control, &shutdown_tx, started_at_unix).await;
        write_response(&mut writer, &response).await?;
        if cmd == Command::Stop {
            break;
        }
    }

    Ok(())
}

/// Translate one socket command into a control message (or a snapshot read).
async fn dispatch(
    request: DaemonRequest,
    home: &Path,
    control: &ControlHandle,
    shutdown_tx: &broadcast::Sender<()>,
    started_at_unix: u64,
) -> DaemonResponse {
    let event = match request.cmd {
        Command::Status => {
            return match build_status_payload(home, control, started_at_unix).await {
                Ok(payload) => DaemonResponse::ok(payload),
                Err(err) => DaemonResponse::error(err.to_string()),
            };
        }
        Command::Stop => {
            let _ = shutdown_tx.send(());
            return DaemonResponse::ok(json!({ "stopping": true }));
        }
        Command::Pull => HudEvent::PullRequested,
        Command::Push => HudEvent::PushRequested,
        Command::Freeze => HudEvent::FreezeToggled { frozen: true },
        Command::Unfreeze => HudEvent::FreezeToggled { frozen: false },
        Command::Connect => HudEvent::Connected {
            project: request.project,
        },
        Command::Disconnect => HudEvent::Disconnected,
    };

    match control.post(event) {
        Ok(()) => DaemonResponse::ok(json!({ "accepted": request.cmd })),
        Err(err) => DaemonResponse::error(err.to_string()),
    }
}

async fn build_status_payload(
    home: &Path,
    control: &ControlHandle,
    started_at_unix: u64,
) -> Result<Value, DaemonError> {
    let snapshot = control.snapshot().await?;
    Ok(json!({
        "running": true,
        "mode": snapshot.mode,
        "frozen": snapshot.frozen,
        "connected": snapshot.connected,
        "project": snapshot.project,
        "sync_status": snapshot.sync_status,
        "jobs": snapshot.jobs,
        "started_at_unix": started_at_unix,
        "socket": socket_path(home).display().to_string(),
    }))
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let root = partsync_root(home);
    if !root.exists() {
        fs::create_dir_all(&root).map_err(|e| io_err(&root, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        let _ = fmt().json().with_env_filter(filter).try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(false).try_init();
    }
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
