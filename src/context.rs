//! The surrounding stream-processor lifecycle the store is embedded in.
//!
//! A store does not run on its own clock: the timestamps it places and
//! queries by come from whatever is driving it (a stream processor
//! replaying a topic, a batch job walking a change feed). [`StreamContext`]
//! is the narrow seam between the two: where state lives on disk, and where
//! dropped/expired-record counts should be reported so the surrounding
//! system can surface them.
//!
//! [`SimpleContext`] is a standalone implementation sufficient for tests and
//! for embedding this crate outside of any larger stream-processing
//! framework.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// The lifecycle hooks a store needs from its surrounding system.
pub trait StreamContext: Send + Sync {
    /// Directory under which this store's column families/state may be
    /// persisted. Purely advisory for an in-memory [`crate::backend::BackingKv`];
    /// meaningful once a disk-backed engine is plugged in.
    fn state_dir(&self) -> &Path;

    /// Called whenever a write or query falls outside the configured
    /// history retention window and is therefore dropped/empty rather than
    /// served. Implementations may use this to drive alerting or metrics
    /// pipelines external to this crate's own [`crate::metrics`].
    fn record_expired(&self);
}

/// A minimal [`StreamContext`] good enough for tests and standalone use:
/// a fixed state directory and an atomic expired-record counter.
pub struct SimpleContext {
    state_dir: PathBuf,
    expired: AtomicU64,
}

impl SimpleContext {
    /// Creates a context rooted at `state_dir` with a zeroed expired-record
    /// counter.
    #[must_use]
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            expired: AtomicU64::new(0),
        }
    }

    /// Number of times [`StreamContext::record_expired`] has been called.
    #[must_use]
    pub fn expired_count(&self) -> u64 {
        self.expired.load(Ordering::Acquire)
    }
}

impl StreamContext for SimpleContext {
    fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn tracks_expired_count() {
        let ctx = SimpleContext::new("/tmp/versioned-kv-test");
        assert_eq!(ctx.expired_count(), 0);

        ctx.record_expired();
        ctx.record_expired();
        assert_eq!(ctx.expired_count(), 2);
    }

    #[test]
    fn exposes_state_dir() {
        let ctx = SimpleContext::new("/var/lib/versioned-kv");
        assert_eq!(ctx.state_dir(), Path::new("/var/lib/versioned-kv"));
    }
}
