//! Counters for store-level events an operator would want to chart
//! alongside the backing engine's own I/O metrics.
//!
//! Only one counter is called out by the put/get algorithms themselves
//! (expired-record events, see [`crate::put`]); `segments_created` and
//! `segments_expired` are the natural companions a real deployment ends up
//! wanting next to it, the same way the teacher's own `Metrics` tracks block
//! cache hits alongside raw I/O counts rather than just the latter.

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Store-level counters, cheap enough to bump on every `put`/`get_as_of`.
#[derive(Debug, Default)]
pub struct Metrics {
    expired_puts: AtomicU64,
    segments_created: AtomicU64,
    segments_expired: AtomicU64,
}

impl Metrics {
    /// Creates a fresh set of zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put`/`delete` calls dropped because the version they
    /// carried had already fallen out of the history retention window.
    #[must_use]
    pub fn expired_puts(&self) -> u64 {
        self.expired_puts.load(Relaxed)
    }

    pub(crate) fn record_expired_put(&self) {
        self.expired_puts.fetch_add(1, Relaxed);
    }

    /// Number of segments created over the lifetime of this store.
    #[must_use]
    pub fn segments_created(&self) -> u64 {
        self.segments_created.load(Relaxed)
    }

    pub(crate) fn record_segment_created(&self) {
        self.segments_created.fetch_add(1, Relaxed);
    }

    /// Number of segments dropped for having fallen entirely out of the
    /// history retention window.
    #[must_use]
    pub fn segments_expired(&self) -> u64 {
        self.segments_expired.load(Relaxed)
    }

    pub(crate) fn record_segments_expired(&self, count: u64) {
        self.segments_expired.fetch_add(count, Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn counters_start_at_zero() {
        let m = Metrics::new();
        assert_eq!(m.expired_puts(), 0);
        assert_eq!(m.segments_created(), 0);
        assert_eq!(m.segments_expired(), 0);
    }

    #[test]
    fn counters_accumulate() {
        let m = Metrics::new();
        m.record_expired_put();
        m.record_expired_put();
        m.record_segment_created();
        m.record_segments_expired(3);

        assert_eq!(m.expired_puts(), 2);
        assert_eq!(m.segments_created(), 1);
        assert_eq!(m.segments_expired(), 3);
    }
}
