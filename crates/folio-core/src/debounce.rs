#![forbid(unsafe_code)]

//! Trailing-edge debouncer for layout recomputation.
//!
//! Subtree mutations and container resizes arrive in bursts while section
//! content animates in. Each trigger pushes the deadline out to
//! `now + delay`; only the last trigger of a burst fires.
//!
//! # Invariants
//!
//! - **Latest-wins**: a fire always corresponds to the most recent trigger.
//! - **At most once per burst**: after firing, the debouncer is idle until
//!   the next trigger.
//! - **Deterministic**: time comes from the caller.

use core::time::Duration;

/// Trailing-edge debouncer driven by host timestamps.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Duration>,
    burst_len: u32,
    fired: u64,
}

impl Debouncer {
    /// Create an idle debouncer with the given quiet window.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            burst_len: 0,
            fired: 0,
        }
    }

    /// Quiet window length.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a trigger at `now`, pushing the deadline out.
    ///
    /// Returns the delay the caller should (re-)arm its host timer with.
    pub fn trigger(&mut self, now: Duration) -> Duration {
        self.deadline = Some(now.saturating_add(self.delay));
        self.burst_len = self.burst_len.saturating_add(1);
        self.delay
    }

    /// Fire if the deadline has passed.
    ///
    /// Returns the number of triggers collapsed into this fire, or `None` if
    /// nothing is due. Stale timer callbacks (an earlier timer outliving a
    /// re-arm) land here with `now` before the deadline and are ignored.
    pub fn poll(&mut self, now: Duration) -> Option<u32> {
        let deadline = self.deadline?;
        if now < deadline {
            return None;
        }
        self.deadline = None;
        self.fired += 1;
        Some(core::mem::take(&mut self.burst_len))
    }

    /// Time left until the pending deadline.
    #[must_use]
    pub fn time_until_fire(&self, now: Duration) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_sub(now))
    }

    /// Whether a trigger is waiting to fire.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Drop any pending trigger.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.burst_len = 0;
    }

    /// Total number of fires so far.
    #[must_use]
    pub const fn fire_count(&self) -> u64 {
        self.fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn idle_debouncer_never_fires() {
        let mut d = Debouncer::new(ms(150));
        assert_eq!(d.poll(ms(10_000)), None);
        assert!(!d.is_pending());
    }

    #[test]
    fn single_trigger_fires_after_delay() {
        let mut d = Debouncer::new(ms(150));
        assert_eq!(d.trigger(ms(0)), ms(150));
        assert_eq!(d.poll(ms(149)), None);
        assert_eq!(d.poll(ms(150)), Some(1));
        assert_eq!(d.poll(ms(400)), None);
        assert_eq!(d.fire_count(), 1);
    }

    #[test]
    fn burst_collapses_into_one_fire() {
        let mut d = Debouncer::new(ms(150));
        for t in [0, 40, 80, 120, 160] {
            d.trigger(ms(t));
        }
        // The first timer (armed at 0) would land at 150: stale.
        assert_eq!(d.poll(ms(150)), None);
        assert_eq!(d.time_until_fire(ms(150)), Some(ms(160)));
        assert_eq!(d.poll(ms(310)), Some(5));
        assert_eq!(d.fire_count(), 1);
    }

    #[test]
    fn cancel_discards_pending_trigger() {
        let mut d = Debouncer::new(ms(150));
        d.trigger(ms(0));
        d.cancel();
        assert_eq!(d.poll(ms(1_000)), None);
        assert_eq!(d.fire_count(), 0);
    }
}
