//! Platform seam for the dock controller
//!
//! The controller only ever talks to the window through [`DockWindow`]. Every call
//! may fail (the window can vanish under us, the window manager can refuse a
//! request); callers log and carry on.

use anyhow::Result;

use crate::types::{Point, WindowBounds, WorkArea};

pub trait DockWindow {
    /// Current outer bounds in root coordinates
    fn bounds(&self) -> Result<WindowBounds>;

    /// Move and resize in one request
    fn set_bounds(&mut self, bounds: WindowBounds) -> Result<()>;

    /// Work area of the display that `bounds` falls in
    fn work_area(&self, bounds: WindowBounds) -> Result<WorkArea>;

    /// Global cursor position
    fn cursor_position(&self) -> Result<Point>;

    fn set_resizable(&mut self, resizable: bool) -> Result<()>;

    fn set_movable(&mut self, movable: bool) -> Result<()>;

    fn set_always_on_top(&mut self, on_top: bool) -> Result<()>;

    fn set_minimum_size(&mut self, width: u32, height: u32) -> Result<()>;

    /// Ask the window to close; the controller is disposed right after
    fn close(&mut self) -> Result<()>;
}
