//! IPC message types for UI ↔ dock daemon communication

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{DockState, SnappedEdge, WindowBounds};

/// Requests sent from the UI (or the CLI) to the dock daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DockRequest {
    /// Enter or leave compact mode; persisted, and toggles always-on-top with it
    SetCompactMode(bool),

    GetAutoHideEnabled,

    SetAutoHideEnabled(bool),

    /// Pointer or key input inside the window (throttled by the daemon)
    ReportUserActivity,

    SetAlwaysOnTop(bool),

    GetBounds,

    /// Dock state, edge and preferences in one reply
    GetStatus,

    StoreGet { key: String },

    StoreSet { key: String, value: Value },

    StoreDelete { key: String },

    /// Close the window; the daemon exits afterwards
    Close,

    /// Health check
    Ping,

    /// Request graceful shutdown
    Shutdown,
}

/// Snapshot returned for [`DockRequest::GetStatus`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DockStatus {
    pub state: DockState,
    pub edge: SnappedEdge,
    pub compact: bool,
    pub auto_hide_enabled: bool,
    pub bounds: Option<WindowBounds>,
}

/// Responses sent from the dock daemon
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum DockResponse {
    /// Acknowledgment that the request was processed
    Ready,

    /// Health check response
    Pong,

    AutoHideEnabled(bool),

    Bounds(Option<WindowBounds>),

    Status(DockStatus),

    /// Stored value (`None` when the key is absent)
    Value(Option<Value>),

    /// Error occurred
    Error(String),
}
