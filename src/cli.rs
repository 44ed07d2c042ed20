//! Command-line interface
//!
//! `edge-dock run` starts the daemon; every other subcommand is a one-shot IPC
//! client that sends a single request and prints the reply.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use std::path::PathBuf;

use crate::config::Paths;
use crate::daemon::{run_daemon, RunOptions};
use crate::ipc::{DockClient, DockRequest, DockResponse};

/// Edge-snap and auto-hide controller for a compact todo window
#[derive(Parser, Debug)]
#[command(name = "edge-dock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Preference store (default: $XDG_CONFIG_HOME/edge-dock/config.json)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Daemon socket (default: $XDG_RUNTIME_DIR/edge-dock/dock.sock)
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Toggle::On
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AutoHideArg {
    On,
    Off,
    Status,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the dock daemon.
    ///
    /// Creates the window, or drives an existing one when --window is given.
    Run {
        /// X11 window id to attach to (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_xid)]
        window: Option<u32>,
    },

    /// Enter or leave compact mode.
    Compact {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Enable, disable or query auto-hide.
    #[command(name = "auto-hide")]
    AutoHide {
        #[arg(value_enum)]
        state: AutoHideArg,
    },

    /// Report user activity (resets the idle timer, reveals a hidden window).
    Activity,

    /// Keep the window above others.
    #[command(name = "always-on-top")]
    AlwaysOnTop {
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Print the current window bounds as JSON.
    Bounds,

    /// Print dock state as JSON.
    Status,

    /// Preference store access.
    #[command(subcommand)]
    Store(StoreCommands),

    /// Close the window and stop the daemon.
    Close,

    /// Check that the daemon is alive.
    Ping,

    /// Stop the daemon without closing the window.
    Shutdown,
}

#[derive(Subcommand, Debug)]
pub enum StoreCommands {
    /// Print the value stored under KEY.
    Get { key: String },

    /// Store a JSON VALUE under KEY.
    Set {
        key: String,
        #[arg(value_parser = parse_json)]
        value: Value,
    },

    /// Remove KEY.
    Delete { key: String },
}

fn parse_xid(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse::<u32>(),
    };
    parsed.map_err(|e| format!("Invalid window id '{}': {}", s, e))
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("Invalid JSON value '{}': {}", s, e))
}

impl Commands {
    /// The IPC request for a client subcommand, `None` for `run`
    pub fn to_request(&self) -> Option<DockRequest> {
        Some(match self {
            Commands::Run { .. } => return None,
            Commands::Compact { state } => DockRequest::SetCompactMode(state.enabled()),
            Commands::AutoHide { state: AutoHideArg::On } => DockRequest::SetAutoHideEnabled(true),
            Commands::AutoHide { state: AutoHideArg::Off } => DockRequest::SetAutoHideEnabled(false),
            Commands::AutoHide { state: AutoHideArg::Status } => DockRequest::GetAutoHideEnabled,
            Commands::Activity => DockRequest::ReportUserActivity,
            Commands::AlwaysOnTop { state } => DockRequest::SetAlwaysOnTop(state.enabled()),
            Commands::Bounds => DockRequest::GetBounds,
            Commands::Status => DockRequest::GetStatus,
            Commands::Store(StoreCommands::Get { key }) => DockRequest::StoreGet { key: key.clone() },
            Commands::Store(StoreCommands::Set { key, value }) => DockRequest::StoreSet {
                key: key.clone(),
                value: value.clone(),
            },
            Commands::Store(StoreCommands::Delete { key }) => DockRequest::StoreDelete { key: key.clone() },
            Commands::Close => DockRequest::Close,
            Commands::Ping => DockRequest::Ping,
            Commands::Shutdown => DockRequest::Shutdown,
        })
    }
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        let paths = Paths::resolve(self.store, self.socket)?;

        let request = match (&self.command, self.command.to_request()) {
            (Commands::Run { window }, _) => {
                return run_daemon(RunOptions { window: *window, paths });
            }
            (_, Some(request)) => request,
            (_, None) => bail!("Nothing to send"),
        };

        let mut client = DockClient::connect_to(&paths.socket)
            .context("Is the dock daemon running? Start it with `edge-dock run`")?;
        let response = client.request(request)?;
        if let Some(line) = render_response(response)? {
            println!("{}", line);
        }
        Ok(())
    }
}

/// Text printed for a response; errors from the daemon become CLI errors
fn render_response(response: DockResponse) -> Result<Option<String>> {
    Ok(match response {
        DockResponse::Ready => None,
        DockResponse::Pong => Some("pong".to_string()),
        DockResponse::AutoHideEnabled(enabled) => Some((if enabled { "on" } else { "off" }).to_string()),
        DockResponse::Bounds(bounds) => Some(serde_json::to_string(&bounds)?),
        DockResponse::Status(status) => Some(serde_json::to_string_pretty(&status)?),
        DockResponse::Value(value) => Some(serde_json::to_string(&value)?),
        DockResponse::Error(message) => bail!("Daemon error: {}", message),
    })
}
