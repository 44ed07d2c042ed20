//! Deadline bookkeeping for the controller's timers
//!
//! Nothing here sleeps or spawns. Each timer is an optional deadline; the event
//! loop asks for the earliest one and the controller fires whatever is due.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Drag-end debounce
    Settle,
    /// Auto-hide countdown
    Idle,
    /// Next hide/reveal animation step
    Animation,
    /// Next cursor sample while hidden
    HoverPoll,
}

#[derive(Debug, Default, Clone)]
pub struct Timers {
    settle: Option<Instant>,
    idle: Option<Instant>,
    animation: Option<Instant>,
    hover_poll: Option<Instant>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::Settle => &mut self.settle,
            TimerKind::Idle => &mut self.idle,
            TimerKind::Animation => &mut self.animation,
            TimerKind::HoverPoll => &mut self.hover_poll,
        }
    }

    /// Arm (or re-arm) a timer `delay` after `now`, replacing any pending deadline
    pub fn arm(&mut self, kind: TimerKind, now: Instant, delay: Duration) {
        *self.slot(kind) = Some(now + delay);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        *self.slot(kind) = None;
    }

    pub fn cancel_all(&mut self) {
        *self = Self::default();
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::Settle => self.settle,
            TimerKind::Idle => self.idle,
            TimerKind::Animation => self.animation,
            TimerKind::HoverPoll => self.hover_poll,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    /// True when the timer is armed and its deadline has passed
    #[cfg(test)]
    pub fn is_due(&self, kind: TimerKind, now: Instant) -> bool {
        self.deadline(kind).is_some_and(|deadline| deadline <= now)
    }

    /// Disarm a due timer and return its deadline, so periodic timers can
    /// re-arm relative to when they were scheduled rather than when they ran
    pub fn take_due(&mut self, kind: TimerKind, now: Instant) -> Option<Instant> {
        let slot = self.slot(kind);
        match *slot {
            Some(deadline) if deadline <= now => slot.take(),
            _ => None,
        }
    }

    /// Earliest pending deadline across all timers
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.settle, self.idle, self.animation, self.hover_poll]
            .into_iter()
            .flatten()
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_next_deadline_is_earliest() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        assert_eq!(timers.next_deadline(), None);

        timers.arm(TimerKind::Idle, t0, ms(5000));
        timers.arm(TimerKind::Settle, t0, ms(150));
        assert_eq!(timers.next_deadline(), Some(t0 + ms(150)));

        timers.cancel(TimerKind::Settle);
        assert_eq!(timers.next_deadline(), Some(t0 + ms(5000)));
    }

    #[test]
    fn test_rearm_replaces_deadline() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.arm(TimerKind::Settle, t0, ms(150));
        timers.arm(TimerKind::Settle, t0 + ms(100), ms(150));
        assert!(!timers.is_due(TimerKind::Settle, t0 + ms(200)));
        assert!(timers.is_due(TimerKind::Settle, t0 + ms(250)));
    }

    #[test]
    fn test_take_due_disarms() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.arm(TimerKind::HoverPoll, t0, ms(50));

        assert_eq!(timers.take_due(TimerKind::HoverPoll, t0 + ms(49)), None);
        assert!(timers.is_armed(TimerKind::HoverPoll));

        assert_eq!(timers.take_due(TimerKind::HoverPoll, t0 + ms(60)), Some(t0 + ms(50)));
        assert!(!timers.is_armed(TimerKind::HoverPoll));
    }

    #[test]
    fn test_cancel_all() {
        let t0 = Instant::now();
        let mut timers = Timers::new();
        timers.arm(TimerKind::Idle, t0, ms(1));
        timers.arm(TimerKind::Animation, t0, ms(1));
        timers.arm(TimerKind::HoverPoll, t0, ms(1));
        timers.cancel_all();
        assert_eq!(timers.next_deadline(), None);
    }
}
