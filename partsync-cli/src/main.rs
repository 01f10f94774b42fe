//! partsync — keep a KiCad parts library in step with its git remote.
//!
//! # Usage
//!
//! ```text
//! partsync init <path> [--remote <name>] [--name <name>] [--poll-interval <secs>]
//! partsync check [--json]
//! partsync pull | push
//! partsync freeze | unfreeze
//! partsync connect [--project <name>] | disconnect
//! partsync daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    check::CheckArgs, control::ConnectArgs, daemon::DaemonCommand, init::InitArgs,
};
use partsync_daemon::Command as DaemonVerb;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "partsync",
    version,
    about = "Keep a KiCad parts library in sync with its git remote",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Point partsync at a parts-library checkout.
    Init(InitArgs),

    /// Run one status check against the remote, without the daemon.
    Check(CheckArgs),

    /// Ask the daemon to fast-forward the library.
    Pull,

    /// Ask the daemon to push local commits.
    Push,

    /// Hold the HUD in place; status updates are recorded but not shown.
    Freeze,

    /// Release a freeze.
    Unfreeze,

    /// Tell the daemon the host application connected.
    Connect(ConnectArgs),

    /// Tell the daemon the host application disconnected.
    Disconnect,

    /// Manage the background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Pull => commands::control::send(DaemonVerb::Pull, None),
        Commands::Push => commands::control::send(DaemonVerb::Push, None),
        Commands::Freeze => commands::control::send(DaemonVerb::Freeze, None),
        Commands::Unfreeze => commands::control::send(DaemonVerb::Unfreeze, None),
        Commands::Connect(args) => commands::control::send(DaemonVerb::Connect, args.project),
        Commands::Disconnect => commands::control::send(DaemonVerb::Disconnect, None),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
