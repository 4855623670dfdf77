//! The store facade: the `put`/`delete`/`get`/`get_as_of` API surface, the
//! observed-stream-time clock, and the open/close/flush lifecycle.
//!
//! Grounded on the teacher crate's `Tree`/`Config::open` relationship:
//! [`crate::config::StoreConfig`] is a consuming builder whose `open`
//! produces this type, which in turn owns the backing engine handle, the
//! segment registry (via [`LiveClient`]), and the small set of atomics that
//! need cross-thread visibility (see §5 of the spec this crate implements).

use crate::client::LiveClient;
use crate::config::StoreConfig;
use crate::context::StreamContext;
use crate::error::{Error, Result};
use crate::get::VersionedRecord;
use crate::metrics::Metrics;
use crate::segment_value::RecordValue;
use crate::stream_time::StreamTime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A persistent, time-versioned key-value store.
///
/// Data-path operations (`put`, `delete`, `get`, `get_as_of`) are expected to
/// run serially on the single stream-processing thread that owns this
/// instance; `open`/`flush`/`close` are lifecycle operations meant to run
/// outside that loop. The only field requiring cross-thread visibility is
/// the open flag, read by every data-path call and written only by
/// [`Store::close`].
pub struct Store {
    name: String,
    history_retention: i64,
    client: LiveClient,
    context: Arc<dyn StreamContext>,
    metrics: Metrics,
    stream_time: StreamTime,
    open: AtomicBool,
}

impl Store {
    /// Opens a store from `config`, creating its latest-tier column family
    /// if it does not already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing engine fails to open the latest-tier
    /// column family.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let client = LiveClient::new(&config.name, config.segment_interval, Arc::clone(&config.backing));
        config.backing.open_column_family(client.latest_values_column_family())?;

        log::debug!(
            "opened versioned store {:?} (segment_interval={}, history_retention={})",
            config.name,
            config.segment_interval,
            config.history_retention
        );

        Ok(Self {
            name: config.name,
            history_retention: config.history_retention,
            client,
            context: config.context,
            metrics: Metrics::new(),
            stream_time: StreamTime::new(),
            open: AtomicBool::new(true),
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::StoreClosed)
        }
    }

    /// Inserts `value` for `key` at `timestamp`, advancing the store's
    /// observed stream time to `max(observed_stream_time, timestamp)` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, or on backing engine
    /// failure.
    pub fn put(&self, key: &[u8], value: &[u8], timestamp: i64) -> Result<()> {
        self.apply(key, RecordValue::Value(value.to_vec()), timestamp)
    }

    /// Deletes `key` as of `timestamp` (writes a tombstone), returning the
    /// value that was valid at `timestamp` immediately beforehand, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, or on backing engine
    /// failure.
    pub fn delete(&self, key: &[u8], timestamp: i64) -> Result<Option<VersionedRecord>> {
        self.check_open()?;
        self.stream_time.observe(timestamp);

        let before_segments = self.client.registry().known_segment_count();

        let previous = crate::put::delete(
            &self.client,
            self.context.as_ref(),
            &self.metrics,
            self.history_retention,
            self.stream_time.get(),
            key,
            timestamp,
        )?
        .map(|(value, valid_from)| VersionedRecord { value, valid_from });

        self.record_segments_created(before_segments);
        self.expire_segments();

        Ok(previous)
    }

    fn apply(&self, key: &[u8], value: RecordValue, timestamp: i64) -> Result<()> {
        self.check_open()?;
        self.stream_time.observe(timestamp);

        let before_segments = self.client.registry().known_segment_count();

        crate::put::put(
            &self.client,
            self.context.as_ref(),
            &self.metrics,
            self.history_retention,
            self.stream_time.get(),
            key,
            value,
            timestamp,
        )?;

        self.record_segments_created(before_segments);
        self.expire_segments();

        Ok(())
    }

    fn record_segments_created(&self, before: usize) {
        let after = self.client.registry().known_segment_count();
        for _ in before..after {
            self.metrics.record_segment_created();
        }
    }

    fn expire_segments(&self) {
        match self.client.expire_segments(self.stream_time.get(), self.history_retention) {
            Ok(expired) => {
                if !expired.is_empty() {
                    log::debug!("expired {} segment(s) for store {:?}", expired.len(), self.name);
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                self.metrics.record_segments_expired(expired.len() as u64);
            }
            Err(e) => log::warn!("failed to expire segments for store {:?}: {e}", self.name),
        }
    }

    /// The current (non-tombstone) value of `key`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, or on backing engine
    /// failure.
    pub fn get(&self, key: &[u8]) -> Result<Option<VersionedRecord>> {
        self.check_open()?;
        crate::get::get(&self.client, key)
    }

    /// The value of `key` valid at `as_of`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, or on backing engine
    /// failure.
    pub fn get_as_of(&self, key: &[u8], as_of: i64) -> Result<Option<VersionedRecord>> {
        self.check_open()?;
        Ok(crate::get::get_as_of(
            &self.client,
            self.history_retention,
            self.stream_time.get(),
            key,
            as_of,
        )?
        .map(|(value, valid_from)| VersionedRecord { value, valid_from }))
    }

    /// This store's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the store is open for data-path operations.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Always `true`: this store durably persists via its backing engine.
    #[must_use]
    pub fn persistent(&self) -> bool {
        true
    }

    /// The highest timestamp observed via `put`/`delete` so far.
    #[must_use]
    pub fn observed_stream_time(&self) -> i64 {
        self.stream_time.get()
    }

    /// Read-only access to this store's counters.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Flushes the segment tier, then the latest tier. This order means a
    /// crash mid-flush can at worst leave segment data persisted without the
    /// corresponding latest-tier write, which is recoverable duplication,
    /// never loss (see the put algorithm's own write-ordering rationale).
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed, or on backing engine
    /// failure.
    pub fn flush(&self) -> Result<()> {
        self.check_open()?;
        self.client.registry().flush(self.client.backing().as_ref())?;
        self.client.backing().flush()
    }

    /// Closes the latest tier first, so in-flight `get` calls against it
    /// fail fast as [`Error::StoreClosed`], then the segment tier.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    pub fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        self.client.backing().close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackingKv;
    use crate::context::SimpleContext;
    use test_log::test;

    fn store(name: &str, segment_interval: i64, history_retention: i64) -> Store {
        StoreConfig::new(name, Arc::new(MemoryBackingKv::new()), Arc::new(SimpleContext::new("/tmp")))
            .segment_interval(segment_interval)
            .history_retention(history_retention)
            .open()
            .unwrap()
    }

    #[test]
    fn fresh_put_current_and_as_of_read() {
        let s = store("a", 10, 100);
        s.put(b"a", &[1], 5).unwrap();

        assert_eq!(s.get(b"a").unwrap(), Some(VersionedRecord { value: vec![1], valid_from: 5 }));
        assert_eq!(s.get_as_of(b"a", 5).unwrap(), Some(VersionedRecord { value: vec![1], valid_from: 5 }));
        assert_eq!(s.get_as_of(b"a", 4).unwrap(), None);
    }

    #[test]
    fn delete_returns_prior_value_and_clears_current() {
        let s = store("a", 10, 100);
        s.put(b"a", &[1], 5).unwrap();

        let prior = s.delete(b"a", 25).unwrap();
        assert_eq!(prior, Some(VersionedRecord { value: vec![1], valid_from: 5 }));
        assert_eq!(s.get(b"a").unwrap(), None);
        assert_eq!(s.get_as_of(b"a", 24).unwrap(), Some(VersionedRecord { value: vec![1], valid_from: 5 }));
        assert_eq!(s.get_as_of(b"a", 25).unwrap(), None);
    }

    #[test]
    fn observed_stream_time_is_non_decreasing() {
        let s = store("a", 10, 100);
        s.put(b"a", &[1], 50).unwrap();
        assert_eq!(s.observed_stream_time(), 50);

        s.put(b"a", &[2], 10).unwrap();
        assert_eq!(s.observed_stream_time(), 50);
    }

    #[test]
    fn name_is_open_persistent() {
        let s = store("my-store", 10, 100);
        assert_eq!(s.name(), "my-store");
        assert!(s.is_open());
        assert!(s.persistent());
    }

    #[test]
    fn close_then_data_path_fails_fast() {
        let s = store("a", 10, 100);
        s.put(b"a", &[1], 5).unwrap();
        s.close().unwrap();

        assert!(!s.is_open());
        assert!(matches!(s.get(b"a"), Err(Error::StoreClosed)));
        assert!(matches!(s.put(b"a", &[2], 6), Err(Error::StoreClosed)));
    }

    #[test]
    fn flush_is_idempotent_while_open() {
        let s = store("a", 10, 100);
        s.put(b"a", &[1], 5).unwrap();
        s.flush().unwrap();
        s.flush().unwrap();
    }

    #[test]
    fn segments_expire_past_retention() {
        let s = store("a", 10, 100);
        s.put(b"a", &[1], 5).unwrap();
        s.put(b"a", &[2], 15).unwrap();
        assert!(s.metrics().segments_created() >= 1);

        // advance stream time far enough that segment 1 ([10, 20)) expires
        s.put(b"b", &[9], 10_000).unwrap();
        assert!(s.metrics().segments_expired() >= 1);
    }
}
