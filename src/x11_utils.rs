//! X11 implementation of [`DockWindow`]
//!
//! Either creates an undecorated top-level window for the compact UI or attaches
//! to an existing one by XID. Bounds are always the client area in root
//! coordinates: reads translate through any WM frame, and writes subtract
//! `_NET_FRAME_EXTENTS` because a NorthWest-gravity move positions the frame.
//! Resize/move locks go through WM_NORMAL_HINTS and `_MOTIF_WM_HINTS`,
//! always-on-top is an EWMH `_NET_WM_STATE` client message, and the work area
//! comes from `_NET_WORKAREA`.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::properties::WmSizeHints;
use x11rb::protocol::Event;
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::constants::{window as geometry, x11};
use crate::types::{Point, WindowBounds, WorkArea};
use crate::window::DockWindow;

/// Pre-cached X11 atoms to avoid repeated roundtrips
#[derive(Debug, Clone, Copy)]
pub struct CachedAtoms {
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub net_wm_name: Atom,
    pub utf8_string: Atom,
    pub net_wm_state: Atom,
    pub net_wm_state_above: Atom,
    pub net_workarea: Atom,
    pub net_frame_extents: Atom,
    pub motif_wm_hints: Atom,
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .context(format!("Failed to intern {} atom", name))?
        .reply()
        .context(format!("Failed to get reply for {} atom", name))?
        .atom)
}

impl CachedAtoms {
    pub fn new(conn: &RustConnection) -> Result<Self> {
        // Do all intern_atom roundtrips once at startup
        Ok(Self {
            wm_protocols: intern(conn, "WM_PROTOCOLS")?,
            wm_delete_window: intern(conn, "WM_DELETE_WINDOW")?,
            net_wm_name: intern(conn, "_NET_WM_NAME")?,
            utf8_string: intern(conn, "UTF8_STRING")?,
            net_wm_state: intern(conn, "_NET_WM_STATE")?,
            net_wm_state_above: intern(conn, "_NET_WM_STATE_ABOVE")?,
            net_workarea: intern(conn, "_NET_WORKAREA")?,
            net_frame_extents: intern(conn, "_NET_FRAME_EXTENTS")?,
            motif_wm_hints: intern(conn, "_MOTIF_WM_HINTS")?,
        })
    }
}

/// What an X event means for the dock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSignal {
    /// Moved or resized; re-read bounds before feeding the controller
    Configured,
    /// Pointer or keyboard input inside the window
    Activity,
    Closed,
}

/// Classifies raw events for one window. `Copy` so the reader thread can own one.
#[derive(Debug, Clone, Copy)]
pub struct EventFilter {
    window: Window,
    wm_protocols: Atom,
    wm_delete_window: Atom,
}

impl EventFilter {
    pub fn classify(&self, event: &Event) -> Option<WindowSignal> {
        match event {
            Event::ConfigureNotify(ev) if ev.window == self.window => Some(WindowSignal::Configured),
            Event::MotionNotify(ev) if ev.event == self.window => Some(WindowSignal::Activity),
            Event::ButtonPress(ev) if ev.event == self.window => Some(WindowSignal::Activity),
            Event::KeyPress(ev) if ev.event == self.window => Some(WindowSignal::Activity),
            Event::DestroyNotify(ev) if ev.window == self.window => Some(WindowSignal::Closed),
            Event::ClientMessage(ev)
                if ev.window == self.window
                    && ev.type_ == self.wm_protocols
                    && ev.data.as_data32()[0] == self.wm_delete_window =>
            {
                Some(WindowSignal::Closed)
            }
            _ => None,
        }
    }
}

/// Decoration sizes the window manager added around the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameExtents {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl FrameExtents {
    /// Parse `_NET_FRAME_EXTENTS`; absent or short means no frame
    pub fn from_property(values: &[u32]) -> Self {
        match values {
            [left, right, top, bottom, ..] => Self { left: *left, right: *right, top: *top, bottom: *bottom },
            _ => Self::default(),
        }
    }

    /// Frame origin that puts the client's top-left corner at `bounds`
    pub fn frame_origin(&self, bounds: WindowBounds) -> (i32, i32) {
        (
            bounds.x.saturating_sub_unsigned(self.left),
            bounds.y.saturating_sub_unsigned(self.top),
        )
    }
}

/// `_MOTIF_WM_HINTS` payload; `undecorated` also asks the WM for no frame
fn motif_hints(resizable: bool, movable: bool, undecorated: bool) -> [u32; x11::MWM_HINTS_LEN] {
    let mut functions = x11::MWM_FUNC_MINIMIZE | x11::MWM_FUNC_MAXIMIZE | x11::MWM_FUNC_CLOSE;
    if resizable {
        functions |= x11::MWM_FUNC_RESIZE;
    }
    if movable {
        functions |= x11::MWM_FUNC_MOVE;
    }
    let mut hints = [0u32; x11::MWM_HINTS_LEN];
    hints[0] = x11::MWM_HINTS_FUNCTIONS;
    hints[1] = functions;
    if undecorated {
        hints[0] |= x11::MWM_HINTS_DECORATIONS;
        // decorations field (hints[2]) stays 0
    }
    hints
}

/// Initial geometry in the protocol's 16-bit fields
fn creation_geometry(bounds: WindowBounds) -> Result<(i16, i16, u16, u16)> {
    Ok((
        i16::try_from(bounds.x).context(format!("Window x {} out of X11 range", bounds.x))?,
        i16::try_from(bounds.y).context(format!("Window y {} out of X11 range", bounds.y))?,
        u16::try_from(bounds.width).context(format!("Window width {} out of X11 range", bounds.width))?,
        u16::try_from(bounds.height).context(format!("Window height {} out of X11 range", bounds.height))?,
    ))
}

pub struct X11Window {
    conn: Arc<RustConnection>,
    screen: Screen,
    window: Window,
    atoms: CachedAtoms,
    /// Created by us (undecorated, destroyed on close) rather than attached by XID
    owned: bool,
    resizable: bool,
    movable: bool,
    min_size: (u32, u32),
}

impl X11Window {
    /// Create and map a new top-level window
    pub fn create(conn: Arc<RustConnection>, screen_num: usize, bounds: WindowBounds) -> Result<Self> {
        let screen = conn.setup().roots[screen_num].clone();
        let atoms = CachedAtoms::new(&conn)?;

        let (x, y, width, height) = creation_geometry(bounds)?;

        let window = conn.generate_id()
            .context("Failed to generate X11 window ID")?;
        conn.create_window(
            screen.root_depth,
            window,
            screen.root,
            x,
            y,
            width,
            height,
            0,
            WindowClass::INPUT_OUTPUT,
            screen.root_visual,
            &CreateWindowAux::new()
                .background_pixel(screen.white_pixel)
                .event_mask(
                    EventMask::STRUCTURE_NOTIFY
                    | EventMask::POINTER_MOTION
                    | EventMask::BUTTON_PRESS
                    | EventMask::KEY_PRESS,
                ),
        )
        .context("Failed to create dock window")?;

        conn.change_property8(
            PropMode::REPLACE,
            window,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            geometry::TITLE.as_bytes(),
        )
        .context("Failed to set WM_NAME")?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms.net_wm_name,
            atoms.utf8_string,
            geometry::TITLE.as_bytes(),
        )
        .context("Failed to set _NET_WM_NAME")?;
        conn.change_property8(PropMode::REPLACE, window, AtomEnum::WM_CLASS, AtomEnum::STRING, x11::WM_CLASS)
            .context("Failed to set WM_CLASS")?;
        conn.change_property32(
            PropMode::REPLACE,
            window,
            atoms.wm_protocols,
            AtomEnum::ATOM,
            &[atoms.wm_delete_window],
        )
        .context("Failed to set WM_PROTOCOLS")?;

        let dock = Self::from_parts(conn, screen, window, atoms, true);
        // Frameless before mapping, so the WM never reparents it with a titlebar
        dock.push_motif_hints()?;

        dock.conn.map_window(window)
            .context(format!("Failed to map dock window {}", window))?;
        dock.flush("creating window")?;
        info!(window = window, bounds = %bounds, "Created dock window");

        Ok(dock)
    }

    /// Drive an existing client window
    pub fn attach(conn: Arc<RustConnection>, screen_num: usize, window: Window) -> Result<Self> {
        let screen = conn.setup().roots[screen_num].clone();
        let atoms = CachedAtoms::new(&conn)?;

        // ButtonPress is exclusive to the owning client, so only motion and keys here
        conn.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().event_mask(
                EventMask::STRUCTURE_NOTIFY | EventMask::POINTER_MOTION | EventMask::KEY_PRESS,
            ),
        )
        .context(format!("Failed to select events on window {}", window))?;
        conn.flush()
            .context("Failed to flush X11 connection after attaching")?;
        info!(window = window, "Attached to existing window");

        Ok(Self::from_parts(conn, screen, window, atoms, false))
    }

    fn from_parts(conn: Arc<RustConnection>, screen: Screen, window: Window, atoms: CachedAtoms, owned: bool) -> Self {
        Self {
            conn,
            screen,
            window,
            atoms,
            owned,
            resizable: true,
            movable: true,
            min_size: (0, 0),
        }
    }

    pub fn event_filter(&self) -> EventFilter {
        EventFilter {
            window: self.window,
            wm_protocols: self.atoms.wm_protocols,
            wm_delete_window: self.atoms.wm_delete_window,
        }
    }

    fn frame_extents(&self) -> Result<FrameExtents> {
        let reply = self.conn
            .get_property(
                false,
                self.window,
                self.atoms.net_frame_extents,
                AtomEnum::CARDINAL,
                0,
                x11::FRAME_EXTENTS_FIELDS as u32,
            )
            .context(format!("Failed to query _NET_FRAME_EXTENTS for window {}", self.window))?
            .reply()
            .context(format!("Failed to get _NET_FRAME_EXTENTS reply for window {}", self.window))?;
        let values: Vec<u32> = reply.value32().map(|v| v.collect()).unwrap_or_default();
        Ok(FrameExtents::from_property(&values))
    }

    fn screen_area(&self) -> WorkArea {
        WorkArea::new(0, 0, self.screen.width_in_pixels as u32, self.screen.height_in_pixels as u32)
    }

    /// WM_NORMAL_HINTS: min=max pins the size while resizing is off
    fn push_size_hints(&self) -> Result<()> {
        let mut hints = WmSizeHints::new();
        // moves address the frame's top-left corner; set_bounds compensates
        hints.win_gravity = Some(Gravity::NORTH_WEST);
        if self.resizable {
            hints.min_size = Some((self.min_size.0 as i32, self.min_size.1 as i32));
        } else {
            let bounds = self.bounds()?;
            let size = (bounds.width as i32, bounds.height as i32);
            hints.min_size = Some(size);
            hints.max_size = Some(size);
        }
        hints.set_normal_hints(self.conn.as_ref(), self.window)
            .context(format!("Failed to set WM_NORMAL_HINTS on window {}", self.window))?;
        Ok(())
    }

    /// `_MOTIF_WM_HINTS` functions for window managers that honour them
    fn push_motif_hints(&self) -> Result<()> {
        let hints = motif_hints(self.resizable, self.movable, self.owned);
        self.conn.change_property32(
            PropMode::REPLACE,
            self.window,
            self.atoms.motif_wm_hints,
            self.atoms.motif_wm_hints,
            &hints,
        )
        .context(format!("Failed to set _MOTIF_WM_HINTS on window {}", self.window))?;
        Ok(())
    }

    fn flush(&self, op: &str) -> Result<()> {
        self.conn.flush()
            .context(format!("Failed to flush X11 connection after {}", op))?;
        Ok(())
    }
}

impl DockWindow for X11Window {
    fn bounds(&self) -> Result<WindowBounds> {
        let geometry = self.conn.get_geometry(self.window)
            .context(format!("Failed to query geometry for window {}", self.window))?
            .reply()
            .context(format!("Failed to get geometry reply for window {}", self.window))?;
        // Parent may be a WM frame, so translate to root coordinates
        let origin = self.conn.translate_coordinates(self.window, self.screen.root, 0, 0)
            .context(format!("Failed to translate coordinates for window {}", self.window))?
            .reply()
            .context(format!("Failed to get translate reply for window {}", self.window))?;
        Ok(WindowBounds::new(
            origin.dst_x as i32,
            origin.dst_y as i32,
            geometry.width as u32,
            geometry.height as u32,
        ))
    }

    fn set_bounds(&mut self, bounds: WindowBounds) -> Result<()> {
        let (x, y) = self.frame_extents()?.frame_origin(bounds);
        self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new()
                .x(x)
                .y(y)
                .width(bounds.width)
                .height(bounds.height),
        )
        .context(format!("Failed to move window {} to {}", self.window, bounds))?;
        self.flush("set_bounds")
    }

    fn work_area(&self, _bounds: WindowBounds) -> Result<WorkArea> {
        let reply = self.conn
            .get_property(false, self.screen.root, self.atoms.net_workarea, AtomEnum::CARDINAL, 0, x11::WORKAREA_FIELDS as u32)
            .context("Failed to query _NET_WORKAREA property")?
            .reply()
            .context("Failed to get reply for _NET_WORKAREA query")?;

        let values: Vec<u32> = reply.value32().map(|v| v.collect()).unwrap_or_default();
        if values.len() < x11::WORKAREA_FIELDS {
            debug!("No _NET_WORKAREA from window manager, using full screen");
            return Ok(self.screen_area());
        }
        Ok(WorkArea::new(values[0] as i32, values[1] as i32, values[2], values[3]))
    }

    fn cursor_position(&self) -> Result<Point> {
        let pointer = self.conn.query_pointer(self.screen.root)
            .context("Failed to query pointer")?
            .reply()
            .context("Failed to get reply for pointer query")?;
        Ok(Point::new(pointer.root_x as i32, pointer.root_y as i32))
    }

    fn set_resizable(&mut self, resizable: bool) -> Result<()> {
        self.resizable = resizable;
        self.push_size_hints()?;
        self.push_motif_hints()?;
        self.flush("set_resizable")
    }

    fn set_movable(&mut self, movable: bool) -> Result<()> {
        self.movable = movable;
        self.push_motif_hints()?;
        self.flush("set_movable")
    }

    fn set_always_on_top(&mut self, on_top: bool) -> Result<()> {
        let action = if on_top { x11::NET_WM_STATE_ADD } else { x11::NET_WM_STATE_REMOVE };
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window: self.window,
            type_: self.atoms.net_wm_state,
            data: ClientMessageData::from([
                action,
                self.atoms.net_wm_state_above,
                0,
                x11::SOURCE_APPLICATION,
                0,
            ]),
        };
        self.conn.send_event(
            false,
            self.screen.root,
            EventMask::SUBSTRUCTURE_NOTIFY | EventMask::SUBSTRUCTURE_REDIRECT,
            event,
        )
        .context(format!("Failed to send _NET_WM_STATE_ABOVE event for window {}", self.window))?;
        self.flush("set_always_on_top")
    }

    fn set_minimum_size(&mut self, width: u32, height: u32) -> Result<()> {
        self.min_size = (width, height);
        self.push_size_hints()?;
        self.flush("set_minimum_size")
    }

    fn close(&mut self) -> Result<()> {
        if self.owned {
            self.conn.destroy_window(self.window)
                .context(format!("Failed to destroy window {}", self.window))?;
        } else {
            let event = ClientMessageEvent {
                response_type: CLIENT_MESSAGE_EVENT,
                format: 32,
                sequence: 0,
                window: self.window,
                type_: self.atoms.wm_protocols,
                data: ClientMessageData::from([self.atoms.wm_delete_window, x11rb::CURRENT_TIME, 0, 0, 0]),
            };
            self.conn.send_event(false, self.window, EventMask::NO_EVENT, event)
                .context(format!("Failed to send WM_DELETE_WINDOW to window {}", self.window))?;
        }
        self.flush("close")
            .inspect_err(|e| warn!(error = ?e, "Close request may not have reached the server"))
    }
}
