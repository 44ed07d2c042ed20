//! Geometry and state types shared by the controller, the platform layer and IPC

use serde::{Deserialize, Serialize};
use std::fmt;

/// Window placement in root-window pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WindowBounds {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add_unsigned(self.width)
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add_unsigned(self.height)
    }

    /// False when the far edges do not fit in `i32`, which only corrupt input produces
    pub fn is_representable(&self) -> bool {
        let span = |origin: i32, extent: u32| {
            i32::try_from(extent).ok().and_then(|extent| origin.checked_add(extent)).is_some()
        };
        span(self.x, self.width) && span(self.y, self.height)
    }

    /// Same size, different origin
    pub fn with_position(self, x: i32, y: i32) -> Self {
        Self { x, y, ..self }
    }

    /// True when any part of the bounds overlaps the work area
    pub fn intersects(&self, area: &WorkArea) -> bool {
        self.left() < area.right()
            && self.right() > area.left()
            && self.top() < area.bottom()
            && self.bottom() > area.top()
    }
}

impl fmt::Display for WindowBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Usable rectangle of the display under the window (panels and docks excluded)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkArea {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl WorkArea {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add_unsigned(self.width)
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add_unsigned(self.height)
    }
}

/// Global cursor position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Work-area edge a window can dock against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    /// Left/right docks slide horizontally, top/bottom vertically
    pub fn is_horizontal(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }
}

/// `None` means the window floats freely
pub type SnappedEdge = Option<Edge>;

/// Externally visible phase of the dock state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DockState {
    Floating,
    SnappedVisible,
    Hiding,
    Hidden,
    Revealing,
}
