//! Edge-snap / auto-hide controller
//!
//! Owns the compact-window state machine:
//!
//! ```text
//! Floating --settle near edge--> SnappedVisible --idle--> Hiding --done--> Hidden
//!    ^                               |   ^                                  |
//!    +------settle away from edge----+   +------ done <-- Revealing <-------+
//!                                                  (hover / activity / drag / auto-hide off)
//! ```
//!
//! All input arrives through [`EdgeSnapController::transition`] (events from the
//! window and the UI) and [`EdgeSnapController::tick`] (timer expiry). The caller
//! supplies the clock, so nothing here blocks or sleeps. Window requests are best
//! effort: failures are logged and the machine keeps going.

use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::animation::BoundsAnimation;
use crate::config::{is_usable, Settings};
use crate::constants::{keys, snap, timing, window as geometry};
use crate::persistence::KeyValueStore;
use crate::snapping;
use crate::timers::{TimerKind, Timers};
use crate::types::{DockState, Edge, SnappedEdge, WindowBounds, WorkArea};
use crate::window::DockWindow;

/// Inputs to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockEvent {
    /// The window moved or resized (user drag, or an echo of our own request)
    GeometryChanged(WindowBounds),
    EnterCompact,
    ExitCompact,
    SetAutoHide(bool),
    /// Any input inside the window while compact
    UserActivity,
    WindowClosed,
}

/// Rising-edge detector for hover reveal, with a block window after each hide
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HoverGate {
    was_hit: bool,
    blocked_until: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Floating,
    SnappedVisible { edge: Edge },
    Hiding { edge: Edge, animation: BoundsAnimation },
    Hidden { edge: Edge, gate: HoverGate },
    Revealing { edge: Edge, animation: BoundsAnimation },
}

impl Phase {
    fn edge(&self) -> SnappedEdge {
        match self {
            Phase::Floating => None,
            Phase::SnappedVisible { edge }
            | Phase::Hiding { edge, .. }
            | Phase::Hidden { edge, .. }
            | Phase::Revealing { edge, .. } => Some(*edge),
        }
    }

    fn state(&self) -> DockState {
        match self {
            Phase::Floating => DockState::Floating,
            Phase::SnappedVisible { .. } => DockState::SnappedVisible,
            Phase::Hiding { .. } => DockState::Hiding,
            Phase::Hidden { .. } => DockState::Hidden,
            Phase::Revealing { .. } => DockState::Revealing,
        }
    }

    fn is_animating(&self) -> bool {
        matches!(self, Phase::Hiding { .. } | Phase::Revealing { .. })
    }
}

#[derive(Debug)]
struct CompactSession {
    phase: Phase,
    /// Placement before the last hide; reveal slides back here
    last_shown: Option<WindowBounds>,
    /// Normal-mode placement, restored on exit
    original_bounds: Option<WindowBounds>,
}

#[derive(Debug)]
enum Mode {
    Normal,
    Compact(CompactSession),
}

pub struct EdgeSnapController<W, S> {
    window: Option<W>,
    settings: Settings<S>,
    mode: Mode,
    timers: Timers,
    /// Last bounds we wrote ourselves, used to drop the platform's echo of them
    last_applied: Option<WindowBounds>,
}

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn log_failure(op: &'static str, result: Result<()>) {
    if let Err(e) = result {
        warn!(op = op, error = ?e, "Window request failed");
    }
}

impl<W: DockWindow, S: KeyValueStore> EdgeSnapController<W, S> {
    pub fn new(window: W, store: S) -> Self {
        Self {
            window: Some(window),
            settings: Settings::new(store),
            mode: Mode::Normal,
            timers: Timers::new(),
            last_applied: None,
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn window(&self) -> Option<&W> {
        self.window.as_ref()
    }

    pub fn window_mut(&mut self) -> Option<&mut W> {
        self.window.as_mut()
    }

    pub fn settings(&self) -> &Settings<S> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings<S> {
        &mut self.settings
    }

    pub fn is_compact(&self) -> bool {
        matches!(self.mode, Mode::Compact(_))
    }

    pub fn state(&self) -> DockState {
        match &self.mode {
            Mode::Normal => DockState::Floating,
            Mode::Compact(session) => session.phase.state(),
        }
    }

    pub fn snapped_edge(&self) -> SnappedEdge {
        match &self.mode {
            Mode::Normal => None,
            Mode::Compact(session) => session.phase.edge(),
        }
    }

    /// Parked off-canvas with only the peek strip visible
    pub fn is_hidden(&self) -> bool {
        self.state() == DockState::Hidden
    }

    pub fn last_shown_bounds(&self) -> Option<WindowBounds> {
        match &self.mode {
            Mode::Normal => None,
            Mode::Compact(session) => session.last_shown,
        }
    }

    pub fn auto_hide_enabled(&self) -> bool {
        self.settings.auto_hide_enabled()
    }

    /// Current window bounds, `None` once the window is gone
    pub fn bounds(&self) -> Option<WindowBounds> {
        let window = self.window.as_ref()?;
        match window.bounds() {
            Ok(bounds) => Some(bounds),
            Err(e) => {
                warn!(error = ?e, "Failed to query window bounds");
                None
            }
        }
    }

    /// Earliest pending timer; the event loop sleeps until then
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    pub fn transition(&mut self, event: DockEvent, now: Instant) {
        if self.window.is_none() {
            trace!(event = ?event, "No window, ignoring event");
            return;
        }

        match event {
            DockEvent::GeometryChanged(bounds) => self.on_geometry_changed(bounds, now),
            DockEvent::EnterCompact => self.enter_compact(now),
            DockEvent::ExitCompact => self.exit_compact(),
            DockEvent::SetAutoHide(enabled) => self.set_auto_hide(enabled, now),
            DockEvent::UserActivity => self.on_user_activity(now),
            DockEvent::WindowClosed => self.dispose(),
        }
    }

    /// Fire every timer whose deadline has passed
    pub fn tick(&mut self, now: Instant) {
        if self.window.is_none() {
            self.timers.cancel_all();
            return;
        }

        if self.timers.take_due(TimerKind::Settle, now).is_some() {
            self.on_drag_settled(now);
        }
        if self.timers.take_due(TimerKind::Idle, now).is_some() {
            self.hide_to_edge(now);
        }
        self.run_animation_steps(now);
        if self.timers.take_due(TimerKind::HoverPoll, now).is_some() {
            self.poll_hover(now);
        }
    }

    /// Cancel every timer and let go of the window
    pub fn dispose(&mut self) {
        self.timers.cancel_all();
        self.mode = Mode::Normal;
        self.last_applied = None;
        if self.window.take().is_some() {
            info!("Window closed, dock controller disposed");
        }
    }

    /// Apply persisted normal-mode placement and preferences at startup
    pub fn restore_session(&mut self, now: Instant) {
        let Some(current) = self.bounds() else { return };
        let Some(area) = self.work_area_for(current) else { return };

        let placement = self
            .settings
            .usable_bounds(keys::WINDOW_BOUNDS, area)
            .unwrap_or_else(|| snapping::centered(geometry::DEFAULT_WIDTH, geometry::DEFAULT_HEIGHT, area));
        info!(bounds = %placement, "Restoring window placement");
        self.apply_bounds(placement);
        self.with_window("set_minimum_size", |w| {
            w.set_minimum_size(geometry::NORMAL_MIN_WIDTH, geometry::NORMAL_MIN_HEIGHT)
        });

        let on_top = self.settings.always_on_top();
        self.with_window("set_always_on_top", |w| w.set_always_on_top(on_top));

        if self.settings.compact_mode() {
            info!("Compact mode was active at shutdown, re-entering");
            self.enter_compact(now);
        }
    }

    /// Toggle always-on-top and remember the choice
    pub fn set_always_on_top(&mut self, on_top: bool) {
        if self.window.is_none() {
            return;
        }
        self.with_window("set_always_on_top", |w| w.set_always_on_top(on_top));
        self.settings.set_always_on_top(on_top);
    }

    /// Close the window and dispose
    pub fn close(&mut self) {
        self.with_window("close", |w| w.close());
        self.dispose();
    }

    // ------------------------------------------------------------------
    // Window access (all best effort)
    // ------------------------------------------------------------------

    fn with_window(&mut self, op: &'static str, f: impl FnOnce(&mut W) -> Result<()>) {
        if let Some(window) = self.window.as_mut() {
            log_failure(op, f(window));
        }
    }

    fn apply_bounds(&mut self, bounds: WindowBounds) {
        if self.window.is_none() {
            return;
        }
        self.last_applied = Some(bounds);
        self.with_window("set_bounds", |w| w.set_bounds(bounds));
    }

    fn set_interactive(&mut self, resizable: bool) {
        self.with_window("set_resizable", |w| w.set_resizable(resizable));
        self.with_window("set_movable", |w| w.set_movable(true));
    }

    fn work_area_for(&self, bounds: WindowBounds) -> Option<WorkArea> {
        let window = self.window.as_ref()?;
        match window.work_area(bounds) {
            Ok(area) => Some(area),
            Err(e) => {
                warn!(error = ?e, "Failed to query work area");
                None
            }
        }
    }

    /// Current bounds together with the work area they fall in
    fn placement(&self) -> Option<(WindowBounds, WorkArea)> {
        let bounds = self.bounds()?;
        let area = self.work_area_for(bounds)?;
        Some((bounds, area))
    }

    fn session(&self) -> Option<&CompactSession> {
        match &self.mode {
            Mode::Compact(session) => Some(session),
            Mode::Normal => None,
        }
    }

    fn session_mut(&mut self) -> Option<&mut CompactSession> {
        match &mut self.mode {
            Mode::Compact(session) => Some(session),
            Mode::Normal => None,
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if let Some(session) = self.session_mut() {
            debug!(from = ?session.phase.state(), to = ?phase.state(), "Dock phase change");
            session.phase = phase;
        }
    }

    fn persist_compact_bounds(&mut self, bounds: WindowBounds) {
        self.settings.set_bounds(keys::COMPACT_WINDOW_BOUNDS, bounds);
    }

    // ------------------------------------------------------------------
    // Idle timer
    // ------------------------------------------------------------------

    /// Restart the auto-hide countdown, or clear it when hiding is not possible
    fn reset_idle_timer(&mut self, now: Instant) {
        self.timers.cancel(TimerKind::Idle);

        let snapped = matches!(
            self.session().map(|s| &s.phase),
            Some(Phase::SnappedVisible { .. })
        );
        if !snapped || !self.settings.auto_hide_enabled() {
            return;
        }

        let idle = self.settings.auto_hide_idle();
        trace!(idle_ms = idle.as_millis() as u64, "Auto-hide countdown armed");
        self.timers.arm(TimerKind::Idle, now, idle);
    }

    // ------------------------------------------------------------------
    // Geometry events and snapping
    // ------------------------------------------------------------------

    fn on_geometry_changed(&mut self, bounds: WindowBounds, now: Instant) {
        if self.last_applied == Some(bounds) {
            trace!(bounds = %bounds, "Ignoring echo of our own bounds change");
            return;
        }

        let phase = self.session().map(|s| s.phase.state());
        match phase {
            None => {
                self.timers.arm(TimerKind::Settle, now, ms(timing::SETTLE_DEBOUNCE_MS));
            }
            Some(DockState::Hiding | DockState::Revealing) => {
                trace!(bounds = %bounds, "Ignoring geometry change during animation");
            }
            Some(DockState::Hidden) => {
                // Dragging a parked window: bring it back first
                info!(bounds = %bounds, "Hidden window moved, revealing");
                self.reveal_from_edge(now);
            }
            Some(DockState::Floating | DockState::SnappedVisible) => {
                self.reset_idle_timer(now);
                self.timers.arm(TimerKind::Settle, now, ms(timing::SETTLE_DEBOUNCE_MS));
            }
        }
    }

    fn on_drag_settled(&mut self, now: Instant) {
        let Some(bounds) = self.bounds() else { return };

        let phase = match self.session() {
            None => {
                debug!(bounds = %bounds, "Window settled, saving placement");
                self.settings.set_bounds(keys::WINDOW_BOUNDS, bounds);
                return;
            }
            Some(session) => session.phase.state(),
        };
        if !matches!(phase, DockState::Floating | DockState::SnappedVisible) {
            return;
        }

        let Some(area) = self.work_area_for(bounds) else { return };
        match snapping::compute_snapped_edge(bounds, area, snap::SNAP_THRESHOLD_PX) {
            Some(edge) => self.snap_to_edge(edge, now),
            None => {
                if phase == DockState::SnappedVisible {
                    info!(bounds = %bounds, "Window left the edge, floating");
                }
                self.set_phase(Phase::Floating);
                // a floating window never auto-hides
                self.timers.cancel(TimerKind::Idle);
                self.persist_compact_bounds(bounds);
            }
        }
    }

    fn snap_to_edge(&mut self, edge: Edge, now: Instant) {
        let Some(bounds) = self.bounds() else { return };
        let Some(area) = self.work_area_for(bounds) else { return };

        let docked = snapping::dock_bounds(bounds, edge, area);
        self.apply_bounds(docked);
        info!(edge = ?edge, bounds = %docked, "Snapped to edge");

        if let Some(session) = self.session_mut() {
            session.last_shown = Some(docked);
        }
        self.set_phase(Phase::SnappedVisible { edge });
        self.persist_compact_bounds(docked);
        self.reset_idle_timer(now);
    }

    // ------------------------------------------------------------------
    // Hide / reveal
    // ------------------------------------------------------------------

    fn hide_to_edge(&mut self, now: Instant) {
        let edge = match self.session().map(|s| &s.phase) {
            Some(Phase::SnappedVisible { edge }) => *edge,
            _ => return,
        };
        if !self.settings.auto_hide_enabled() {
            return;
        }
        let Some((bounds, area)) = self.placement() else {
            debug!("Window query failed, hide postponed by one idle period");
            self.reset_idle_timer(now);
            return;
        };

        let target = snapping::hidden_bounds(bounds, edge, area);
        info!(edge = ?edge, from = %bounds, to = %target, "Idle, hiding to edge");

        self.timers.cancel(TimerKind::Idle);
        self.timers.cancel(TimerKind::HoverPoll);
        self.timers.cancel(TimerKind::Animation);

        let animation = BoundsAnimation::new(bounds, target, timing::ANIMATION_DURATION_MS, timing::ANIMATION_STEP_MS);
        if let Some(session) = self.session_mut() {
            session.last_shown = Some(bounds);
        }
        self.set_phase(Phase::Hiding { edge, animation });
        self.timers.arm(TimerKind::Animation, now, ms(timing::ANIMATION_STEP_MS));
    }

    fn reveal_from_edge(&mut self, now: Instant) {
        let edge = match self.session().map(|s| &s.phase) {
            Some(Phase::Hidden { edge, .. } | Phase::Hiding { edge, .. }) => *edge,
            _ => return,
        };

        let Some((current, area)) = self.placement() else {
            // stay parked but keep sampling; a running hide keeps its own timer
            if matches!(self.state(), DockState::Hidden) {
                debug!("Window query failed, reveal deferred to the next hover sample");
                self.timers.arm(TimerKind::HoverPoll, now, ms(timing::HOVER_POLL_MS));
            }
            return;
        };

        self.timers.cancel(TimerKind::HoverPoll);
        self.timers.cancel(TimerKind::Animation);
        self.timers.cancel(TimerKind::Idle);

        // Interaction must never be blocked mid-slide
        self.set_interactive(true);

        let shown = self.last_shown_bounds().unwrap_or(current);
        let target = snapping::dock_bounds(shown, edge, area);
        info!(edge = ?edge, from = %current, to = %target, "Revealing from edge");

        let animation = BoundsAnimation::new(current, target, timing::ANIMATION_DURATION_MS, timing::ANIMATION_STEP_MS);
        self.set_phase(Phase::Revealing { edge, animation });
        self.timers.arm(TimerKind::Animation, now, ms(timing::ANIMATION_STEP_MS));
    }

    fn run_animation_steps(&mut self, now: Instant) {
        while let Some(scheduled) = self.timers.take_due(TimerKind::Animation, now) {
            let step = match self.session_mut().map(|s| &mut s.phase) {
                Some(Phase::Hiding { animation, .. } | Phase::Revealing { animation, .. }) => {
                    let frame = animation.advance();
                    Some((frame, animation.is_finished()))
                }
                _ => None,
            };
            let Some((frame, finished)) = step else { return };

            self.apply_bounds(frame);
            if self.window.is_none() {
                return;
            }

            if finished {
                self.finish_animation(now);
                return;
            }
            self.timers.arm(TimerKind::Animation, scheduled, ms(timing::ANIMATION_STEP_MS));
        }
    }

    fn finish_animation(&mut self, now: Instant) {
        let Some(session) = self.session() else { return };
        match session.phase.clone() {
            Phase::Hiding { edge, .. } => {
                // Force "already hit" and block reveals for a while, so a cursor
                // resting in the band at this moment cannot bounce the window back
                let gate = HoverGate {
                    was_hit: true,
                    blocked_until: now + ms(timing::HOVER_BLOCK_AFTER_HIDE_MS),
                };
                self.set_phase(Phase::Hidden { edge, gate });
                // An OS resize cursor over the peek strip would swallow hover detection
                self.with_window("set_resizable", |w| w.set_resizable(false));
                if let Some(shown) = self.last_shown_bounds() {
                    self.persist_compact_bounds(shown);
                }
                self.timers.cancel(TimerKind::Idle);
                self.timers.arm(TimerKind::HoverPoll, now, ms(timing::HOVER_POLL_MS));
                info!(edge = ?edge, "Hidden at edge");
            }
            Phase::Revealing { edge, animation } => {
                self.set_phase(Phase::SnappedVisible { edge });
                self.set_interactive(true);
                if let Some(session) = self.session_mut() {
                    session.last_shown = Some(animation.target());
                }
                self.persist_compact_bounds(animation.target());
                self.reset_idle_timer(now);
                info!(edge = ?edge, "Revealed");
            }
            _ => {}
        }
    }

    fn poll_hover(&mut self, now: Instant) {
        let (edge, gate) = match self.session().map(|s| &s.phase) {
            Some(Phase::Hidden { edge, gate }) => (*edge, *gate),
            _ => return,
        };

        let in_band = match self.sample_reveal_band(edge) {
            Ok(in_band) => in_band,
            Err(e) => {
                debug!(error = ?e, "Cursor sample failed, treating as miss");
                false
            }
        };
        // Track the raw sample even while blocked: a cursor resting in the band
        // has to leave it before a reveal can fire
        let rising = in_band && !gate.was_hit && now >= gate.blocked_until;

        if let Some(Phase::Hidden { gate, .. }) = self.session_mut().map(|s| &mut s.phase) {
            gate.was_hit = in_band;
        }

        if rising {
            info!(edge = ?edge, "Cursor entered reveal band");
            self.reveal_from_edge(now);
        } else {
            self.timers.arm(TimerKind::HoverPoll, now, ms(timing::HOVER_POLL_MS));
        }
    }

    fn sample_reveal_band(&self, edge: Edge) -> Result<bool> {
        let Some(window) = self.window.as_ref() else { return Ok(false) };
        let current = window.bounds()?;
        let area = window.work_area(current)?;
        let cursor = window.cursor_position()?;
        // Along-edge span comes from the pre-hide placement, not the whole screen edge
        let base = self.last_shown_bounds().unwrap_or(current);
        Ok(snapping::is_cursor_in_reveal_band(cursor, area, edge, base))
    }

    // ------------------------------------------------------------------
    // Mode and preference changes
    // ------------------------------------------------------------------

    fn on_user_activity(&mut self, now: Instant) {
        match self.state() {
            DockState::Hidden | DockState::Hiding if self.is_compact() => self.reveal_from_edge(now),
            _ => self.reset_idle_timer(now),
        }
    }

    fn set_auto_hide(&mut self, enabled: bool, now: Instant) {
        info!(enabled = enabled, "Auto-hide preference changed");
        self.settings.set_auto_hide_enabled(enabled);

        if enabled {
            self.reset_idle_timer(now);
            return;
        }

        self.timers.cancel(TimerKind::Idle);
        if matches!(self.state(), DockState::Hidden | DockState::Hiding) {
            self.reveal_from_edge(now);
        }
    }

    fn enter_compact(&mut self, now: Instant) {
        if self.is_compact() {
            debug!("Already in compact mode");
            self.reset_idle_timer(now);
            return;
        }
        let Some(current) = self.bounds() else { return };
        let Some(area) = self.work_area_for(current) else { return };

        self.timers.cancel_all();
        self.mode = Mode::Compact(CompactSession {
            phase: Phase::Floating,
            last_shown: None,
            original_bounds: Some(current),
        });

        self.with_window("set_minimum_size", |w| {
            w.set_minimum_size(geometry::COMPACT_MIN_WIDTH, geometry::COMPACT_MIN_HEIGHT)
        });
        let placement = self
            .settings
            .usable_bounds(keys::COMPACT_WINDOW_BOUNDS, area)
            .unwrap_or_else(|| snapping::centered(geometry::COMPACT_WIDTH, geometry::COMPACT_HEIGHT, area));
        info!(original = %current, compact = %placement, "Entering compact mode");
        self.apply_bounds(placement);
        self.set_always_on_top(true);

        if let Some(area) = self.work_area_for(placement)
            && let Some(edge) = snapping::compute_snapped_edge(placement, area, snap::SNAP_THRESHOLD_PX)
        {
            self.snap_to_edge(edge, now);
        }
        self.reset_idle_timer(now);
    }

    fn exit_compact(&mut self) {
        let Mode::Compact(session) = &self.mode else {
            debug!("Not in compact mode");
            return;
        };
        let phase = session.phase.clone();
        let original = session.original_bounds;
        let last_shown = session.last_shown;

        self.timers.cancel_all();

        // Never leave compact mode with the window parked off-canvas
        let mut shown = self.bounds();
        let parked = phase.is_animating() || matches!(phase, Phase::Hidden { .. });
        if parked
            && let Some(edge) = phase.edge()
            && let Some(current) = shown
            && let Some(area) = self.work_area_for(current)
        {
            let target = snapping::dock_bounds(last_shown.unwrap_or(current), edge, area);
            info!(edge = ?edge, bounds = %target, "Forcing reveal before leaving compact mode");
            self.apply_bounds(target);
            shown = Some(target);
        }
        self.set_interactive(true);
        self.mode = Mode::Normal;

        if let Some(shown) = shown {
            self.persist_compact_bounds(shown);
        }

        self.with_window("set_minimum_size", |w| {
            w.set_minimum_size(geometry::NORMAL_MIN_WIDTH, geometry::NORMAL_MIN_HEIGHT)
        });
        let restore = shown.and_then(|b| self.work_area_for(b)).map(|area| {
            original
                .filter(|b| is_usable(*b, area))
                .unwrap_or_else(|| snapping::centered(geometry::DEFAULT_WIDTH, geometry::DEFAULT_HEIGHT, area))
        });
        if let Some(restore) = restore {
            info!(bounds = %restore, "Leaving compact mode");
            self.apply_bounds(restore);
        }
        self.set_always_on_top(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::types::{Point, WorkArea};
    use crate::window::fake::FakeWindow;
    use serde_json::json;

    const AREA: WorkArea = WorkArea { x: 0, y: 0, width: 1920, height: 1080 };

    type Controller = EdgeSnapController<FakeWindow, MemoryStore>;

    fn controller_with(bounds: WindowBounds, store: MemoryStore) -> Controller {
        EdgeSnapController::new(FakeWindow::new(bounds, AREA), store)
    }

    fn controller() -> Controller {
        controller_with(WindowBounds::new(300, 200, 800, 600), MemoryStore::new())
    }

    /// Fire timers in deadline order up to and including `until`
    fn advance(ctrl: &mut Controller, until: Instant) {
        while let Some(deadline) = ctrl.next_deadline() {
            if deadline > until {
                break;
            }
            ctrl.tick(deadline);
        }
    }

    /// Simulate the user dropping the window at `bounds`
    fn drag_to(ctrl: &mut Controller, bounds: WindowBounds, now: Instant) {
        ctrl.window_mut().unwrap().bounds = bounds;
        ctrl.transition(DockEvent::GeometryChanged(bounds), now);
    }

    /// Compact window docked left at y=500, settled at the returned instant
    fn docked_left() -> (Controller, Instant) {
        let t0 = Instant::now();
        let mut ctrl = controller();
        ctrl.transition(DockEvent::EnterCompact, t0);
        drag_to(&mut ctrl, WindowBounds::new(0, 500, 500, 400), t0 + ms(10));
        let settled = t0 + ms(10 + timing::SETTLE_DEBOUNCE_MS);
        advance(&mut ctrl, settled);
        (ctrl, settled)
    }

    /// Docked left and fully hidden; returns the hide completion instant
    fn hidden_left() -> (Controller, Instant) {
        let (mut ctrl, settled) = docked_left();
        let hide_start = settled + ms(timing::DEFAULT_AUTO_HIDE_IDLE_MS);
        let hidden_at = hide_start + ms(11 * timing::ANIMATION_STEP_MS);
        advance(&mut ctrl, hidden_at);
        assert!(ctrl.is_hidden());
        (ctrl, hidden_at)
    }

    #[test]
    fn test_enter_compact_centers_without_saved_bounds() {
        let t0 = Instant::now();
        let mut ctrl = controller();
        ctrl.transition(DockEvent::EnterCompact, t0);

        assert!(ctrl.is_compact());
        assert_eq!(ctrl.state(), DockState::Floating);
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(710, 340, 500, 400)));
        let window = ctrl.window().unwrap();
        assert!(window.always_on_top);
        assert_eq!(window.min_size, (400, 300));
        // floating windows never start the idle countdown
        assert!(!ctrl.is_timer_armed(TimerKind::Idle));
    }

    #[test]
    fn test_enter_compact_snaps_saved_placement_immediately() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store.set(keys::COMPACT_WINDOW_BOUNDS, json!({"x": 1410, "y": 100, "width": 500, "height": 400})).unwrap();
        let mut ctrl = controller_with(WindowBounds::new(300, 200, 800, 600), store);

        ctrl.transition(DockEvent::EnterCompact, t0);

        assert_eq!(ctrl.snapped_edge(), Some(Edge::Right));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(1420, 100, 500, 400)));
        assert!(ctrl.is_timer_armed(TimerKind::Idle));
    }

    #[test]
    fn test_enter_compact_ignores_offscreen_saved_placement() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store.set(keys::COMPACT_WINDOW_BOUNDS, json!({"x": 5000, "y": 100, "width": 500, "height": 400})).unwrap();
        let mut ctrl = controller_with(WindowBounds::new(300, 200, 800, 600), store);

        ctrl.transition(DockEvent::EnterCompact, t0);
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(710, 340, 500, 400)));
    }

    #[test]
    fn test_enter_compact_ignores_out_of_range_saved_placement() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store
            .set(keys::COMPACT_WINDOW_BOUNDS, json!({"x": 1000, "y": 100, "width": 2147483000u32, "height": 400}))
            .unwrap();
        let mut ctrl = controller_with(WindowBounds::new(300, 200, 800, 600), store);

        ctrl.transition(DockEvent::EnterCompact, t0);
        assert!(ctrl.is_compact());
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(710, 340, 500, 400)));
    }

    #[test]
    fn test_drag_to_left_edge_snaps_after_settle() {
        let t0 = Instant::now();
        let mut ctrl = controller();
        ctrl.transition(DockEvent::EnterCompact, t0);
        drag_to(&mut ctrl, WindowBounds::new(9, 500, 500, 400), t0 + ms(10));

        // still inside the debounce window
        advance(&mut ctrl, t0 + ms(159));
        assert_eq!(ctrl.snapped_edge(), None);

        advance(&mut ctrl, t0 + ms(160));
        assert_eq!(ctrl.snapped_edge(), Some(Edge::Left));
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(0, 500, 500, 400)));
        assert_eq!(ctrl.last_shown_bounds(), Some(WindowBounds::new(0, 500, 500, 400)));
        assert_eq!(
            ctrl.settings().bounds(keys::COMPACT_WINDOW_BOUNDS),
            Some(WindowBounds::new(0, 500, 500, 400))
        );
        assert_eq!(ctrl.next_deadline(), Some(t0 + ms(160 + 5000)));
    }

    #[test]
    fn test_continuous_drag_defers_settle() {
        let t0 = Instant::now();
        let mut ctrl = controller();
        ctrl.transition(DockEvent::EnterCompact, t0);

        for i in 0..10 {
            drag_to(&mut ctrl, WindowBounds::new(100 - i * 10, 500, 500, 400), t0 + ms(i as u64 * 100));
            advance(&mut ctrl, t0 + ms(i as u64 * 100 + 99));
            assert_eq!(ctrl.snapped_edge(), None);
        }
        advance(&mut ctrl, t0 + ms(900 + 150));
        assert_eq!(ctrl.snapped_edge(), Some(Edge::Left));
    }

    #[test]
    fn test_idle_hides_with_peek() {
        let (mut ctrl, settled) = docked_left();
        let hide_start = settled + ms(5000);

        advance(&mut ctrl, hide_start);
        assert_eq!(ctrl.state(), DockState::Hiding);

        advance(&mut ctrl, hide_start + ms(10 * 16));
        assert_eq!(ctrl.state(), DockState::Hiding);

        advance(&mut ctrl, hide_start + ms(11 * 16));
        assert_eq!(ctrl.state(), DockState::Hidden);
        assert_eq!(ctrl.snapped_edge(), Some(Edge::Left));

        let window = ctrl.window().unwrap();
        assert_eq!(window.bounds, WindowBounds::new(-496, 500, 500, 400));
        assert!(!window.resizable);
        // 11 animation frames after the snap write
        assert_eq!(window.applied.iter().filter(|b| b.x < 0).count(), 11);
        assert!(ctrl.is_timer_armed(TimerKind::HoverPoll));
        assert!(!ctrl.is_timer_armed(TimerKind::Idle));
    }

    #[test]
    fn test_hover_reveal_after_block_window() {
        let (mut ctrl, hidden_at) = hidden_left();

        // cursor elsewhere until 2100ms after hide, then onto the peek strip
        ctrl.window_mut().unwrap().cursor = Point::new(900, 700);
        advance(&mut ctrl, hidden_at + ms(2099));
        assert!(ctrl.is_hidden());

        ctrl.window_mut().unwrap().cursor = Point::new(2, 700);
        let reveal_at = hidden_at + ms(2100);
        assert_eq!(ctrl.next_deadline(), Some(reveal_at));
        ctrl.tick(reveal_at);

        assert_eq!(ctrl.state(), DockState::Revealing);
        let window = ctrl.window().unwrap();
        assert!(window.resizable);
        assert!(window.movable);

        advance(&mut ctrl, reveal_at + ms(11 * 16));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(0, 500, 500, 400)));
        assert_eq!(ctrl.next_deadline(), Some(reveal_at + ms(11 * 16 + 5000)));
    }

    #[test]
    fn test_cursor_resting_in_band_stays_hidden() {
        let (mut ctrl, hidden_at) = hidden_left();

        // cursor parked on the peek strip from the moment the hide completes
        ctrl.window_mut().unwrap().cursor = Point::new(2, 700);
        advance(&mut ctrl, hidden_at + ms(2100));
        assert!(ctrl.is_hidden());

        advance(&mut ctrl, hidden_at + ms(10_000));
        assert!(ctrl.is_hidden());
        assert!(ctrl.is_timer_armed(TimerKind::HoverPoll));
    }

    #[test]
    fn test_leave_and_return_reveals_once() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.window_mut().unwrap().cursor = Point::new(2, 700);
        advance(&mut ctrl, hidden_at + ms(2100));
        assert!(ctrl.is_hidden());

        ctrl.window_mut().unwrap().cursor = Point::new(900, 700);
        advance(&mut ctrl, hidden_at + ms(2200));
        assert!(ctrl.is_hidden());

        ctrl.window_mut().unwrap().cursor = Point::new(2, 700);
        advance(&mut ctrl, hidden_at + ms(2250));
        assert_eq!(ctrl.state(), DockState::Revealing);

        // the reveal cancelled the poll; lingering cannot trigger again
        assert!(!ctrl.is_timer_armed(TimerKind::HoverPoll));
        advance(&mut ctrl, hidden_at + ms(2250 + 176));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        let parked = WindowBounds::new(-496, 500, 500, 400);
        let reveal_starts = ctrl
            .window()
            .unwrap()
            .applied
            .windows(2)
            .filter(|pair| pair[0] == parked && pair[1].x > parked.x)
            .count();
        assert_eq!(reveal_starts, 1);
    }

    #[test]
    fn test_hover_during_block_window_ignored() {
        let (mut ctrl, hidden_at) = hidden_left();
        // leave, then enter while still blocked
        ctrl.window_mut().unwrap().cursor = Point::new(900, 700);
        advance(&mut ctrl, hidden_at + ms(500));
        ctrl.window_mut().unwrap().cursor = Point::new(2, 700);
        advance(&mut ctrl, hidden_at + ms(1500));
        assert!(ctrl.is_hidden());

        // still in the band when the block expires: no fresh rising edge
        advance(&mut ctrl, hidden_at + ms(3000));
        assert!(ctrl.is_hidden());
    }

    #[test]
    fn test_hover_outside_window_span_ignored() {
        let (mut ctrl, hidden_at) = hidden_left();
        // same screen edge, far above the window
        ctrl.window_mut().unwrap().cursor = Point::new(2, 100);
        advance(&mut ctrl, hidden_at + ms(4000));
        assert!(ctrl.is_hidden());
    }

    #[test]
    fn test_hide_then_reveal_restores_geometry() {
        let (mut ctrl, hidden_at) = hidden_left();
        let before_hide = ctrl.last_shown_bounds().unwrap();

        ctrl.transition(DockEvent::UserActivity, hidden_at + ms(10));
        advance(&mut ctrl, hidden_at + ms(10 + 176));

        assert_eq!(ctrl.bounds(), Some(before_hide));
        assert_eq!(
            ctrl.settings().bounds(keys::COMPACT_WINDOW_BOUNDS),
            Some(before_hide)
        );
    }

    #[test]
    fn test_user_activity_resets_idle() {
        let (mut ctrl, settled) = docked_left();
        let later = settled + ms(4000);
        ctrl.transition(DockEvent::UserActivity, later);
        assert_eq!(ctrl.next_deadline(), Some(later + ms(5000)));

        advance(&mut ctrl, settled + ms(5000));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
    }

    #[test]
    fn test_user_activity_during_hide_reverses() {
        let (mut ctrl, settled) = docked_left();
        let hide_start = settled + ms(5000);
        advance(&mut ctrl, hide_start + ms(48));
        assert_eq!(ctrl.state(), DockState::Hiding);

        ctrl.transition(DockEvent::UserActivity, hide_start + ms(50));
        assert_eq!(ctrl.state(), DockState::Revealing);
        advance(&mut ctrl, hide_start + ms(50 + 176));
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(0, 500, 500, 400)));
    }

    #[test]
    fn test_disable_auto_hide_while_hidden_reveals_and_stays() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.transition(DockEvent::SetAutoHide(false), hidden_at + ms(100));

        assert_eq!(ctrl.state(), DockState::Revealing);
        assert!(ctrl.window().unwrap().resizable);
        assert!(!ctrl.auto_hide_enabled());

        advance(&mut ctrl, hidden_at + ms(60_000));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        assert_eq!(ctrl.next_deadline(), None);

        ctrl.transition(DockEvent::SetAutoHide(true), hidden_at + ms(60_000));
        assert_eq!(ctrl.next_deadline(), Some(hidden_at + ms(65_000)));
    }

    #[test]
    fn test_disabled_auto_hide_never_hides() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store.set(keys::AUTO_HIDE_ENABLED, json!(false)).unwrap();
        let mut ctrl = controller_with(WindowBounds::new(300, 200, 800, 600), store);
        ctrl.transition(DockEvent::EnterCompact, t0);
        drag_to(&mut ctrl, WindowBounds::new(0, 500, 500, 400), t0);
        advance(&mut ctrl, t0 + ms(20_000));

        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        assert_eq!(ctrl.next_deadline(), None);
    }

    #[test]
    fn test_custom_idle_time() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store.set(keys::AUTO_HIDE_IDLE_MS, json!(1000)).unwrap();
        let mut ctrl = controller_with(WindowBounds::new(300, 200, 800, 600), store);
        ctrl.transition(DockEvent::EnterCompact, t0);
        drag_to(&mut ctrl, WindowBounds::new(0, 500, 500, 400), t0);
        advance(&mut ctrl, t0 + ms(150 + 999));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        advance(&mut ctrl, t0 + ms(150 + 1000));
        assert_eq!(ctrl.state(), DockState::Hiding);
    }

    #[test]
    fn test_drag_off_edge_floats_and_clears_idle() {
        let (mut ctrl, settled) = docked_left();
        drag_to(&mut ctrl, WindowBounds::new(600, 300, 500, 400), settled + ms(100));
        advance(&mut ctrl, settled + ms(250));

        assert_eq!(ctrl.state(), DockState::Floating);
        assert_eq!(ctrl.snapped_edge(), None);
        assert_eq!(ctrl.next_deadline(), None);
        assert_eq!(
            ctrl.settings().bounds(keys::COMPACT_WINDOW_BOUNDS),
            Some(WindowBounds::new(600, 300, 500, 400))
        );
    }

    #[test]
    fn test_drag_while_hidden_reveals() {
        let (mut ctrl, hidden_at) = hidden_left();
        drag_to(&mut ctrl, WindowBounds::new(-480, 520, 500, 400), hidden_at + ms(300));
        assert_eq!(ctrl.state(), DockState::Revealing);
        assert!(ctrl.window().unwrap().resizable);
    }

    #[test]
    fn test_echo_of_own_bounds_is_ignored() {
        let (mut ctrl, settled) = docked_left();
        let docked = ctrl.bounds().unwrap();
        ctrl.transition(DockEvent::GeometryChanged(docked), settled + ms(1));
        assert!(!ctrl.is_timer_armed(TimerKind::Settle));
        // the idle countdown was not restarted either
        assert_eq!(ctrl.next_deadline(), Some(settled + ms(5000)));
    }

    #[test]
    fn test_geometry_during_animation_is_ignored() {
        let (mut ctrl, settled) = docked_left();
        let hide_start = settled + ms(5000);
        advance(&mut ctrl, hide_start + ms(32));
        ctrl.transition(DockEvent::GeometryChanged(WindowBounds::new(-91, 500, 500, 400)), hide_start + ms(33));
        assert_eq!(ctrl.state(), DockState::Hiding);
        assert!(!ctrl.is_timer_armed(TimerKind::Settle));
    }

    #[test]
    fn test_exit_compact_while_hidden_forces_reveal() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.transition(DockEvent::ExitCompact, hidden_at + ms(10));

        assert!(!ctrl.is_compact());
        assert!(!ctrl.is_hidden());
        assert_eq!(ctrl.state(), DockState::Floating);
        assert_eq!(ctrl.next_deadline(), None);

        // compact placement saved on-screen, not parked
        assert_eq!(
            ctrl.settings().bounds(keys::COMPACT_WINDOW_BOUNDS),
            Some(WindowBounds::new(0, 500, 500, 400))
        );
        let window = ctrl.window().unwrap();
        assert!(window.applied.contains(&WindowBounds::new(0, 500, 500, 400)));
        assert_eq!(window.bounds, WindowBounds::new(300, 200, 800, 600));
        assert!(window.resizable);
        assert!(!window.always_on_top);
        assert_eq!(window.min_size, (600, 400));
    }

    #[test]
    fn test_exit_compact_mid_reveal_cancels_animation() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.transition(DockEvent::UserActivity, hidden_at + ms(10));
        advance(&mut ctrl, hidden_at + ms(60));
        ctrl.transition(DockEvent::ExitCompact, hidden_at + ms(61));

        let writes = ctrl.window().unwrap().applied.len();
        advance(&mut ctrl, hidden_at + ms(10_000));
        assert_eq!(ctrl.window().unwrap().applied.len(), writes);
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(300, 200, 800, 600)));
    }

    #[test]
    fn test_window_closed_disposes() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.transition(DockEvent::WindowClosed, hidden_at + ms(10));

        assert!(ctrl.window().is_none());
        assert_eq!(ctrl.next_deadline(), None);
        assert_eq!(ctrl.bounds(), None);

        // everything after close is a silent no-op
        ctrl.transition(DockEvent::UserActivity, hidden_at + ms(20));
        ctrl.transition(DockEvent::EnterCompact, hidden_at + ms(30));
        ctrl.tick(hidden_at + ms(10_000));
        assert_eq!(ctrl.next_deadline(), None);
    }

    #[test]
    fn test_failed_window_writes_do_not_stop_machine() {
        let (mut ctrl, settled) = docked_left();
        ctrl.window_mut().unwrap().fail_writes = true;
        advance(&mut ctrl, settled + ms(5000 + 176));
        // bounds never moved, but the state machine still completed the hide
        assert_eq!(ctrl.state(), DockState::Hidden);
        assert_eq!(ctrl.window().unwrap().bounds, WindowBounds::new(0, 500, 500, 400));
    }

    #[test]
    fn test_failed_query_postpones_hide() {
        let (mut ctrl, settled) = docked_left();
        ctrl.window_mut().unwrap().fail_reads = true;
        advance(&mut ctrl, settled + ms(5000));
        assert_eq!(ctrl.state(), DockState::SnappedVisible);
        assert_eq!(ctrl.next_deadline(), Some(settled + ms(10_000)));

        ctrl.window_mut().unwrap().fail_reads = false;
        advance(&mut ctrl, settled + ms(10_000));
        assert_eq!(ctrl.state(), DockState::Hiding);
    }

    #[test]
    fn test_failed_query_keeps_hover_polling() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.window_mut().unwrap().fail_reads = true;
        ctrl.transition(DockEvent::UserActivity, hidden_at + ms(2010));
        assert!(ctrl.is_hidden());
        assert!(ctrl.is_timer_armed(TimerKind::HoverPoll));

        ctrl.window_mut().unwrap().fail_reads = false;
        ctrl.window_mut().unwrap().cursor = Point::new(900, 700);
        advance(&mut ctrl, hidden_at + ms(2060));
        assert!(ctrl.is_hidden());

        ctrl.window_mut().unwrap().cursor = Point::new(2, 700);
        advance(&mut ctrl, hidden_at + ms(2110));
        assert_eq!(ctrl.state(), DockState::Revealing);
    }

    #[test]
    fn test_failed_query_on_disable_keeps_sampling() {
        let (mut ctrl, hidden_at) = hidden_left();
        ctrl.window_mut().unwrap().fail_reads = true;
        ctrl.transition(DockEvent::SetAutoHide(false), hidden_at + ms(10));
        assert!(ctrl.is_hidden());
        assert!(ctrl.is_timer_armed(TimerKind::HoverPoll));
        assert!(!ctrl.is_timer_armed(TimerKind::Idle));
    }

    #[test]
    fn test_normal_mode_settle_saves_window_bounds() {
        let t0 = Instant::now();
        let mut ctrl = controller();
        drag_to(&mut ctrl, WindowBounds::new(40, 60, 900, 700), t0);
        advance(&mut ctrl, t0 + ms(150));
        assert_eq!(
            ctrl.settings().bounds(keys::WINDOW_BOUNDS),
            Some(WindowBounds::new(40, 60, 900, 700))
        );
        // normal mode never snaps
        assert_eq!(ctrl.snapped_edge(), None);
    }

    #[test]
    fn test_restore_session_defaults_on_malformed_bounds() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store.set(keys::WINDOW_BOUNDS, json!({"x": "left", "width": 10})).unwrap();
        store.set(keys::ALWAYS_ON_TOP, json!(true)).unwrap();
        let mut ctrl = controller_with(WindowBounds::new(0, 0, 200, 200), store);

        ctrl.restore_session(t0);
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(560, 240, 800, 600)));
        assert!(ctrl.window().unwrap().always_on_top);
        assert!(!ctrl.is_compact());
    }

    #[test]
    fn test_restore_session_reenters_compact() {
        let t0 = Instant::now();
        let mut store = MemoryStore::new();
        store.set(keys::WINDOW_BOUNDS, json!({"x": 100, "y": 100, "width": 1000, "height": 700})).unwrap();
        store.set(keys::COMPACT_MODE, json!(true)).unwrap();
        store.set(keys::COMPACT_WINDOW_BOUNDS, json!({"x": 700, "y": 0, "width": 500, "height": 400})).unwrap();
        let mut ctrl = controller_with(WindowBounds::new(0, 0, 200, 200), store);

        ctrl.restore_session(t0);
        assert!(ctrl.is_compact());
        assert_eq!(ctrl.snapped_edge(), Some(Edge::Top));

        ctrl.transition(DockEvent::ExitCompact, t0 + ms(1));
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(100, 100, 1000, 700)));
    }

    #[test]
    fn test_set_always_on_top_persists() {
        let mut ctrl = controller();
        ctrl.set_always_on_top(true);
        assert!(ctrl.window().unwrap().always_on_top);
        assert!(ctrl.settings().always_on_top());
    }

    #[test]
    fn test_top_edge_hide_and_reveal() {
        let t0 = Instant::now();
        let mut ctrl = controller();
        ctrl.transition(DockEvent::EnterCompact, t0);
        drag_to(&mut ctrl, WindowBounds::new(700, 12, 500, 400), t0);
        advance(&mut ctrl, t0 + ms(150 + 5000 + 176));

        assert!(ctrl.is_hidden());
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(700, -396, 500, 400)));

        // away from the strip through the block window, then onto it
        ctrl.window_mut().unwrap().cursor = Point::new(950, 600);
        advance(&mut ctrl, t0 + ms(150 + 5000 + 176 + 1950));
        ctrl.window_mut().unwrap().cursor = Point::new(950, 3);
        advance(&mut ctrl, t0 + ms(150 + 5000 + 176 + 2000));
        assert_eq!(ctrl.state(), DockState::Revealing);
        advance(&mut ctrl, t0 + ms(150 + 5000 + 176 + 2000 + 176));
        assert_eq!(ctrl.bounds(), Some(WindowBounds::new(700, 0, 500, 400)));
    }
}
