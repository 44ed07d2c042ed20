//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Edge snapping and peek geometry
pub mod snap {
    /// Maximum distance (px) between a window edge and a work-area edge to count as docked
    pub const SNAP_THRESHOLD_PX: i32 = 16;

    /// Strip of the window left on screen while hidden
    pub const HIDE_PEEK_PX: i32 = 4;

    /// Reveal band extension perpendicular to the edge.
    /// Keep small: a wide band makes corner movements re-trigger a reveal right after hiding.
    pub const REVEAL_HOVER_PX: i32 = 6;

    /// Reveal band extension along the edge, relative to the pre-hide span
    pub const REVEAL_ALONG_EDGE_SLOP_PX: i32 = 8;
}

/// Timer intervals and durations (milliseconds)
pub mod timing {
    /// Quiet period after the last geometry event before a drag counts as settled
    pub const SETTLE_DEBOUNCE_MS: u64 = 150;

    /// Default idle time before a docked window hides
    pub const DEFAULT_AUTO_HIDE_IDLE_MS: u64 = 5000;

    /// Total hide/reveal animation duration
    pub const ANIMATION_DURATION_MS: u64 = 180;

    /// Interval between animation steps
    pub const ANIMATION_STEP_MS: u64 = 16;

    /// Cursor sampling interval while hidden
    pub const HOVER_POLL_MS: u64 = 50;

    /// Hover reveal is blocked for this long after every hide completes.
    /// Tunable anti-flicker policy, not load-bearing.
    pub const HOVER_BLOCK_AFTER_HIDE_MS: u64 = 2000;

    /// Minimum spacing between accepted user-activity reports
    pub const ACTIVITY_THROTTLE_MS: u64 = 250;

    /// Longest the event loop sleeps before re-checking the shutdown flag
    pub const SHUTDOWN_POLL_MS: u64 = 200;
}

/// Default window geometry
pub mod window {
    /// Normal-mode window size when nothing valid is persisted
    pub const DEFAULT_WIDTH: u32 = 800;
    pub const DEFAULT_HEIGHT: u32 = 600;

    /// Compact-mode window size when nothing valid is persisted
    pub const COMPACT_WIDTH: u32 = 500;
    pub const COMPACT_HEIGHT: u32 = 400;

    /// Minimum size while in compact mode
    pub const COMPACT_MIN_WIDTH: u32 = 400;
    pub const COMPACT_MIN_HEIGHT: u32 = 300;

    /// Minimum size in normal mode
    pub const NORMAL_MIN_WIDTH: u32 = 600;
    pub const NORMAL_MIN_HEIGHT: u32 = 400;

    /// Title of the window created when no existing window is attached
    pub const TITLE: &str = "Todo";
}

/// Persisted key names in the key-value store
pub mod keys {
    pub const WINDOW_BOUNDS: &str = "windowBounds";
    pub const COMPACT_WINDOW_BOUNDS: &str = "compactWindowBounds";
    pub const COMPACT_MODE: &str = "compactMode";
    pub const ALWAYS_ON_TOP: &str = "alwaysOnTop";
    pub const AUTO_HIDE_ENABLED: &str = "autoHideEnabled";
    pub const AUTO_HIDE_IDLE_MS: &str = "autoHideIdleMs";
}

/// Configuration and runtime file locations
pub mod config {
    /// Application directory name under the XDG config/runtime directories
    pub const APP_DIR: &str = "edge-dock";

    /// Key-value store filename
    pub const FILENAME: &str = "config.json";

    /// IPC socket filename
    pub const SOCKET_FILENAME: &str = "dock.sock";
}

/// X11 protocol constants
pub mod x11 {
    /// `_NET_WM_STATE` client message actions
    pub const NET_WM_STATE_REMOVE: u32 = 0;
    pub const NET_WM_STATE_ADD: u32 = 1;

    /// Source indication for EWMH client messages (1 = normal application)
    pub const SOURCE_APPLICATION: u32 = 1;

    /// `_MOTIF_WM_HINTS` flags: which of the functions/decorations fields are valid
    pub const MWM_HINTS_FUNCTIONS: u32 = 1 << 0;
    pub const MWM_HINTS_DECORATIONS: u32 = 1 << 1;

    /// `_MOTIF_WM_HINTS` function bits
    pub const MWM_FUNC_RESIZE: u32 = 1 << 1;
    pub const MWM_FUNC_MOVE: u32 = 1 << 2;
    pub const MWM_FUNC_MINIMIZE: u32 = 1 << 3;
    pub const MWM_FUNC_MAXIMIZE: u32 = 1 << 4;
    pub const MWM_FUNC_CLOSE: u32 = 1 << 5;

    /// Number of 32-bit fields in `_MOTIF_WM_HINTS`
    pub const MWM_HINTS_LEN: usize = 5;

    /// `_NET_FRAME_EXTENTS` is left, right, top, bottom
    pub const FRAME_EXTENTS_FIELDS: usize = 4;

    /// Number of 32-bit values describing one desktop in `_NET_WORKAREA`
    pub const WORKAREA_FIELDS: usize = 4;

    /// WM_CLASS for windows we create (instance\0class\0)
    pub const WM_CLASS: &[u8] = b"edge-dock\0edge-dock\0";
}
