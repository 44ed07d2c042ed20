//! Typed preferences over the key-value store
//!
//! Every getter falls back to a default when the key is absent or has the wrong
//! shape. Every setter logs a failed write and moves on; the dock keeps working
//! with whatever is in memory.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::{keys, timing};
use crate::persistence::KeyValueStore;
use crate::types::{WindowBounds, WorkArea};

#[derive(Debug)]
pub struct Settings<S> {
    store: S,
}

impl<S: KeyValueStore> Settings<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.store.get(key) {
            Some(Value::Bool(b)) => b,
            Some(other) => {
                warn!(key = %key, value = %other, default = default, "Expected boolean preference, using default");
                default
            }
            None => default,
        }
    }

    fn set_value(&mut self, key: &str, value: Value) {
        // JsonFileStore already logs the failure with its path
        if self.store.set(key, value).is_err() {
            debug!(key = %key, "Preference write failed, keeping in-memory value");
        }
    }

    pub fn auto_hide_enabled(&self) -> bool {
        self.get_bool(keys::AUTO_HIDE_ENABLED, true)
    }

    pub fn set_auto_hide_enabled(&mut self, enabled: bool) {
        self.set_value(keys::AUTO_HIDE_ENABLED, json!(enabled));
    }

    /// Idle time before auto-hide; non-positive or non-numeric values use the default
    pub fn auto_hide_idle(&self) -> Duration {
        let ms = self
            .store
            .get(keys::AUTO_HIDE_IDLE_MS)
            .and_then(|v| v.as_f64())
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| ms as u64)
            .filter(|ms| *ms > 0)
            .unwrap_or(timing::DEFAULT_AUTO_HIDE_IDLE_MS);
        Duration::from_millis(ms)
    }

    pub fn always_on_top(&self) -> bool {
        self.get_bool(keys::ALWAYS_ON_TOP, false)
    }

    pub fn set_always_on_top(&mut self, on_top: bool) {
        self.set_value(keys::ALWAYS_ON_TOP, json!(on_top));
    }

    pub fn compact_mode(&self) -> bool {
        self.get_bool(keys::COMPACT_MODE, false)
    }

    pub fn set_compact_mode(&mut self, compact: bool) {
        self.set_value(keys::COMPACT_MODE, json!(compact));
    }

    /// Persisted bounds under `key`, if present and well-formed
    pub fn bounds(&self, key: &str) -> Option<WindowBounds> {
        let value = self.store.get(key)?;
        match serde_json::from_value::<WindowBounds>(value) {
            Ok(bounds) => Some(bounds),
            Err(e) => {
                warn!(key = %key, error = %e, "Malformed persisted bounds, ignoring");
                None
            }
        }
    }

    /// Persisted bounds that are also usable on the given work area
    pub fn usable_bounds(&self, key: &str, area: WorkArea) -> Option<WindowBounds> {
        let bounds = self.bounds(key)?;
        if is_usable(bounds, area) {
            Some(bounds)
        } else {
            warn!(key = %key, bounds = %bounds, "Persisted bounds are off-screen, empty or out of range, ignoring");
            None
        }
    }

    pub fn set_bounds(&mut self, key: &str, bounds: WindowBounds) {
        self.set_value(key, json!(bounds));
    }
}

/// Non-empty, in coordinate range, and at least partly on the work area
pub fn is_usable(bounds: WindowBounds, area: WorkArea) -> bool {
    bounds.width > 0 && bounds.height > 0 && bounds.is_representable() && bounds.intersects(&area)
}
