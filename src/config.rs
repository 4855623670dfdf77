//! Store configuration builder.

use crate::backend::BackingKv;
use crate::context::StreamContext;
use crate::store::Store;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_STATE_DIR: &str = ".versioned-kv.data";

/// One hour, in the caller's timestamp unit (typically milliseconds).
const DEFAULT_SEGMENT_INTERVAL: i64 = 60 * 60 * 1_000;

/// Seven days, in the caller's timestamp unit.
const DEFAULT_HISTORY_RETENTION: i64 = 7 * 24 * 60 * 60 * 1_000;

/// Builder for a [`Store`].
///
/// Mirrors the teacher crate's own tree-configuration builder: consuming
/// `#[must_use]` setters, a `Default`-friendly shape, `assert!`-backed
/// validation on setters rather than deferred `Result`s, and a terminal
/// `open(self) -> Result<Store>`.
#[derive(Clone)]
pub struct StoreConfig {
    pub(crate) name: String,
    pub(crate) state_dir: PathBuf,
    pub(crate) history_retention: i64,
    pub(crate) segment_interval: i64,
    pub(crate) backing: Arc<dyn BackingKv>,
    pub(crate) context: Arc<dyn StreamContext>,
}

impl StoreConfig {
    /// Initializes a new config for a store named `name`, backed by
    /// `backing` and embedded in `context`.
    #[must_use]
    pub fn new(name: impl Into<String>, backing: Arc<dyn BackingKv>, context: Arc<dyn StreamContext>) -> Self {
        Self {
            name: name.into(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            history_retention: DEFAULT_HISTORY_RETENTION,
            segment_interval: DEFAULT_SEGMENT_INTERVAL,
            backing,
            context,
        }
    }

    /// Sets how far back queryable history extends, in the same unit as
    /// the timestamps passed to `put`/`get_as_of`.
    ///
    /// # Panics
    ///
    /// Panics if `retention` is not positive.
    #[must_use]
    pub fn history_retention(mut self, retention: i64) -> Self {
        assert!(retention > 0, "history_retention must be positive");
        self.history_retention = retention;
        self
    }

    /// Sets the width of each time bucket records are segmented into.
    ///
    /// Smaller intervals mean finer-grained expiry (less over-retention)
    /// at the cost of more segments; larger intervals mean fewer segments
    /// but coarser expiry.
    ///
    /// # Panics
    ///
    /// Panics if `interval` is not positive.
    #[must_use]
    pub fn segment_interval(mut self, interval: i64) -> Self {
        assert!(interval > 0, "segment_interval must be positive");
        self.segment_interval = interval;
        self
    }

    /// Sets the directory the backing engine should persist state under.
    /// Meaningful once a disk-backed [`BackingKv`] is plugged in; ignored
    /// by [`crate::backend::MemoryBackingKv`].
    #[must_use]
    pub fn state_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.state_dir = dir.as_ref().to_path_buf();
        self
    }

    /// The store's name, used to derive its column family names.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured state directory.
    #[must_use]
    pub fn state_dir_path(&self) -> &Path {
        &self.state_dir
    }

    /// Opens a store using this config.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing engine fails to open the store's
    /// column families.
    pub fn open(self) -> crate::error::Result<Store> {
        Store::open(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackingKv;
    use crate::context::SimpleContext;
    use test_log::test;

    fn config(name: &str) -> StoreConfig {
        StoreConfig::new(
            name,
            Arc::new(MemoryBackingKv::new()),
            Arc::new(SimpleContext::new("/tmp")),
        )
    }

    #[test]
    fn defaults_are_positive() {
        let cfg = config("t");
        assert_eq!(cfg.name(), "t");
        assert!(cfg.history_retention > 0);
        assert!(cfg.segment_interval > 0);
    }

    #[test]
    #[should_panic(expected = "history_retention must be positive")]
    fn rejects_non_positive_retention() {
        let _ = config("t").history_retention(0);
    }

    #[test]
    #[should_panic(expected = "segment_interval must be positive")]
    fn rejects_non_positive_interval() {
        let _ = config("t").segment_interval(-1);
    }
}
