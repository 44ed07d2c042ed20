//! Fixed-step linear interpolation of window bounds
//!
//! Hide and reveal slide the window over a fixed number of equally spaced steps.
//! The caller owns the clock: each step is produced by [`BoundsAnimation::advance`]
//! when the animation timer fires.

use crate::types::WindowBounds;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsAnimation {
    from: WindowBounds,
    to: WindowBounds,
    steps: u32,
    step: u32,
}

impl BoundsAnimation {
    /// `steps = max(1, round(duration / step_interval))`, so 180 ms at 16 ms gives 11 steps
    pub fn new(from: WindowBounds, to: WindowBounds, duration_ms: u64, step_ms: u64) -> Self {
        let steps = if step_ms == 0 {
            1
        } else {
            ((duration_ms as f64 / step_ms as f64).round() as u32).max(1)
        };
        Self { from, to, steps, step: 0 }
    }

    pub fn target(&self) -> WindowBounds {
        self.to
    }

    #[cfg(test)]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.steps
    }

    /// Produce the next frame. The last frame is exactly `to`, with no rounding drift.
    pub fn advance(&mut self) -> WindowBounds {
        if self.is_finished() {
            return self.to;
        }

        self.step += 1;
        if self.is_finished() {
            return self.to;
        }

        let t = f64::from(self.step) / f64::from(self.steps);
        WindowBounds {
            x: lerp(self.from.x, self.to.x, t),
            y: lerp(self.from.y, self.to.y, t),
            width: lerp(self.from.width as i32, self.to.width as i32, t).max(0) as u32,
            height: lerp(self.from.height as i32, self.to.height as i32, t).max(0) as u32,
        }
    }
}

/// Linear interpolation rounded half-up
fn lerp(start: i32, end: i32, t: f64) -> i32 {
    let value = f64::from(start) + f64::from(end - start) * t;
    (value + 0.5).floor() as i32
}
