//! UI command surface
//!
//! Maps [`DockRequest`]s onto the controller and the preference store, and
//! throttles activity reports so a busy pointer cannot flood the state machine.

use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

use crate::constants::{keys, timing};
use crate::controller::{DockEvent, EdgeSnapController};
use crate::ipc::{DockRequest, DockResponse, DockStatus};
use crate::persistence::KeyValueStore;
use crate::window::DockWindow;

/// Result of handling one request
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response: DockResponse,
    /// The daemon should exit after sending the response
    pub stop: bool,
}

impl Reply {
    fn ok(response: DockResponse) -> Self {
        Self { response, stop: false }
    }

    fn stop(response: DockResponse) -> Self {
        Self { response, stop: true }
    }
}

#[derive(Debug)]
pub struct CommandHandler {
    activity_throttle: Duration,
    last_activity: Option<Instant>,
}

impl Default for CommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler {
    pub fn new() -> Self {
        Self {
            activity_throttle: Duration::from_millis(timing::ACTIVITY_THROTTLE_MS),
            last_activity: None,
        }
    }

    pub fn handle<W: DockWindow, S: KeyValueStore>(
        &mut self,
        ctrl: &mut EdgeSnapController<W, S>,
        request: DockRequest,
        now: Instant,
    ) -> Reply {
        match request {
            DockRequest::SetCompactMode(compact) => {
                if ctrl.window().is_none() {
                    return Reply::ok(window_closed());
                }
                info!(compact = compact, "Compact mode requested");
                ctrl.settings_mut().set_compact_mode(compact);
                let event = if compact { DockEvent::EnterCompact } else { DockEvent::ExitCompact };
                ctrl.transition(event, now);
                Reply::ok(DockResponse::Ready)
            }

            DockRequest::GetAutoHideEnabled => {
                Reply::ok(DockResponse::AutoHideEnabled(ctrl.auto_hide_enabled()))
            }

            DockRequest::SetAutoHideEnabled(enabled) => {
                if ctrl.window().is_none() {
                    // still remember the preference for the next session
                    ctrl.settings_mut().set_auto_hide_enabled(enabled);
                    return Reply::ok(DockResponse::Ready);
                }
                ctrl.transition(DockEvent::SetAutoHide(enabled), now);
                Reply::ok(DockResponse::Ready)
            }

            DockRequest::ReportUserActivity => {
                if self.accept_activity(now) {
                    ctrl.transition(DockEvent::UserActivity, now);
                } else {
                    trace!("Activity report throttled");
                }
                Reply::ok(DockResponse::Ready)
            }

            DockRequest::SetAlwaysOnTop(on_top) => {
                if ctrl.window().is_none() {
                    return Reply::ok(window_closed());
                }
                ctrl.set_always_on_top(on_top);
                Reply::ok(DockResponse::Ready)
            }

            DockRequest::GetBounds => Reply::ok(DockResponse::Bounds(ctrl.bounds())),

            DockRequest::GetStatus => Reply::ok(DockResponse::Status(DockStatus {
                state: ctrl.state(),
                edge: ctrl.snapped_edge(),
                compact: ctrl.is_compact(),
                auto_hide_enabled: ctrl.auto_hide_enabled(),
                bounds: ctrl.bounds(),
            })),

            DockRequest::StoreGet { key } => {
                Reply::ok(DockResponse::Value(ctrl.settings().store().get(&key)))
            }

            DockRequest::StoreSet { key, value } => {
                if let Some(request) = preference_request(&key, &value) {
                    debug!(key = %key, "Store write routed to preference handler");
                    return self.handle(ctrl, request, now);
                }
                debug!(key = %key, "Store write via IPC");
                match ctrl.settings_mut().store_mut().set(&key, value) {
                    Ok(()) => Reply::ok(DockResponse::Ready),
                    Err(e) => Reply::ok(DockResponse::Error(format!("{:#}", e))),
                }
            }

            DockRequest::StoreDelete { key } => {
                debug!(key = %key, "Store delete via IPC");
                match ctrl.settings_mut().store_mut().delete(&key) {
                    Ok(()) => Reply::ok(DockResponse::Ready),
                    Err(e) => Reply::ok(DockResponse::Error(format!("{:#}", e))),
                }
            }

            DockRequest::Close => {
                info!("Close requested via IPC");
                ctrl.close();
                Reply::stop(DockResponse::Ready)
            }

            DockRequest::Ping => Reply::ok(DockResponse::Pong),

            DockRequest::Shutdown => {
                info!("Received shutdown request via IPC");
                Reply::stop(DockResponse::Ready)
            }
        }
    }

    /// At most one activity report per throttle window
    fn accept_activity(&mut self, now: Instant) -> bool {
        match self.last_activity {
            Some(last) if now.saturating_duration_since(last) < self.activity_throttle => false,
            _ => {
                self.last_activity = Some(now);
                true
            }
        }
    }
}

/// Boolean preferences the controller reacts to must not bypass it
fn preference_request(key: &str, value: &Value) -> Option<DockRequest> {
    let enabled = value.as_bool()?;
    match key {
        keys::AUTO_HIDE_ENABLED => Some(DockRequest::SetAutoHideEnabled(enabled)),
        keys::COMPACT_MODE => Some(DockRequest::SetCompactMode(enabled)),
        keys::ALWAYS_ON_TOP => Some(DockRequest::SetAlwaysOnTop(enabled)),
        _ => None,
    }
}

fn window_closed() -> DockResponse {
    DockResponse::Error("Window is closed".to_string())
}
