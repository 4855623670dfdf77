//! The store's notion of "now": the highest timestamp observed by any
//! `put`/`delete` so far, used to decide which segments are still live
//! against the configured history retention window.
//!
//! Modeled the same way the teacher crate models its sequence-number
//! counter: a thread-safe monotonic counter with explicit orderings, built
//! around `fetch_max` rather than a plain increment, since stream time
//! advances to whatever timestamp a caller observes, not by one each call.

use std::sync::atomic::{AtomicI64, Ordering};

/// Thread-safe, monotonically non-decreasing clock tracking the highest
/// timestamp any `put`/`delete` call has observed.
#[derive(Debug, Default)]
pub struct StreamTime(AtomicI64);

impl StreamTime {
    /// Creates a new clock starting at `i64::MIN`, i.e. "nothing observed
    /// yet".
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicI64::new(i64::MIN))
    }

    /// Returns the highest timestamp observed so far.
    #[must_use]
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advances the clock to `max(current, timestamp)`.
    pub fn observe(&self, timestamp: i64) {
        self.0.fetch_max(timestamp, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn starts_at_i64_min() {
        let clock = StreamTime::new();
        assert_eq!(clock.get(), i64::MIN);
    }

    #[test]
    fn observe_only_moves_forward() {
        let clock = StreamTime::new();
        clock.observe(100);
        assert_eq!(clock.get(), 100);

        clock.observe(50);
        assert_eq!(clock.get(), 100);

        clock.observe(200);
        assert_eq!(clock.get(), 200);
    }
}
