//! Commands forwarded to the running daemon over its socket.

use anyhow::{Context, Result};
use clap::Args;

use partsync_daemon::{request_command, Command, DaemonError, DaemonRequest};

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Name of the project open in the host application.
    #[arg(long, short = 'p')]
    pub project: Option<String>,
}

pub fn send(cmd: Command, project: Option<String>) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    let request = DaemonRequest { cmd, project };
    let verb = serde_json::to_string(&cmd).context("failed to encode command")?;
    let verb = verb.trim_matches('"');

    match request_command(&home, request) {
        Ok(_) => {
            println!("{verb} sent to daemon");
            Ok(())
        }
        Err(err @ DaemonError::DaemonNotRunning { .. }) => {
            Err(err).context("start it with `partsync daemon start`")
        }
        Err(err) => Err(err).with_context(|| format!("daemon rejected {verb}")),
    }
}
