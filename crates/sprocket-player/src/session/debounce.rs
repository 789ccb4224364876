//! Single-slot delayed actions, polled from the session pump.

use std::time::{Duration, Instant};

/// Holds at most one pending value. Scheduling again replaces the value
/// and restarts the delay, so a burst collapses into the last entry.
#[derive(Debug)]
pub struct DebounceSlot<T> {
    pending: Option<(T, Instant)>,
}

impl<T> DebounceSlot<T> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    pub fn schedule(&mut self, value: T, delay: Duration) {
        self.pending = Some((value, Instant::now() + delay));
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the value if its delay has elapsed at `now`.
    pub fn fire_due(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }
}

impl<T> Default for DebounceSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_never_fires() {
        let mut slot: DebounceSlot<i64> = DebounceSlot::new();
        assert!(!slot.is_pending());
        assert_eq!(slot.fire_due(Instant::now()), None);
    }

    #[test]
    fn holds_until_delay_elapses() {
        let before = Instant::now();
        let mut slot = DebounceSlot::new();
        slot.schedule(7, Duration::from_secs(10));
        assert_eq!(slot.fire_due(before), None);
        assert!(slot.is_pending());
    }

    #[test]
    fn fires_exactly_once() {
        let before = Instant::now();
        let mut slot = DebounceSlot::new();
        slot.schedule(7, Duration::from_millis(100));
        let late = before + Duration::from_secs(10);
        assert_eq!(slot.fire_due(late), Some(7));
        assert_eq!(slot.fire_due(late), None);
        assert!(!slot.is_pending());
    }

    #[test]
    fn reschedule_replaces_pending_value() {
        let before = Instant::now();
        let mut slot = DebounceSlot::new();
        slot.schedule(1, Duration::from_millis(100));
        slot.schedule(2, Duration::from_millis(100));
        assert_eq!(slot.fire_due(before + Duration::from_secs(10)), Some(2));
        assert_eq!(slot.fire_due(before + Duration::from_secs(10)), None);
    }

    #[test]
    fn cancel_discards_pending_value() {
        let before = Instant::now();
        let mut slot = DebounceSlot::new();
        slot.schedule(9, Duration::from_millis(100));
        slot.cancel();
        assert_eq!(slot.fire_due(before + Duration::from_secs(10)), None);
    }
}
