//! The narrow interface the put and get-as-of algorithms are written
//! against, so they can run unchanged against different backing
//! collaborators (a live store today; a restore/replay sandbox
//! tomorrow, per the design note in [`crate::config`]'s module docs).
//!
//! Grounded on the same shape as the teacher's `AbstractTree`: a trait that
//! narrows a whole storage engine down to exactly the operations the
//! call site needs (`get`/`insert`/`remove`), so algorithm code depends on
//! an interface rather than a concrete tree implementation.

use crate::backend::BackingKv;
use crate::error::Result;
use crate::segment_registry::{SegmentId, SegmentRegistry};
use std::sync::Arc;

/// The operations [`crate::put`] and [`crate::get`] need from whatever is
/// holding the data: the latest tier (keyed only by user key) and the
/// segment tier (keyed by user key within a given segment id).
pub trait VersionedStoreClient: Send + Sync {
    /// Reads the current (non-tombstone) value for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    fn get_latest_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Writes the current value for `key`, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    fn put_latest_value(&self, key: &[u8], raw: &[u8]) -> Result<()>;

    /// Removes `key` from the latest tier (used when the key's current
    /// value is demoted to the segment tier, or tombstoned).
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    fn delete_latest_value(&self, key: &[u8]) -> Result<()>;

    /// Maps a timestamp to the id of the segment covering it.
    fn segment_id_for_timestamp(&self, timestamp: i64) -> SegmentId;

    /// Ensures the segment covering `timestamp` exists, returning its id,
    /// or `None` if that segment already lies outside the configured
    /// history retention window.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    fn get_or_create_segment_if_live(
        &self,
        timestamp: i64,
        observed_stream_time: i64,
        history_retention: i64,
    ) -> Result<Option<SegmentId>>;

    /// Segment ids covering `from_timestamp` and walking backward in time,
    /// for as long as they remain live. Segments that exist only
    /// arithmetically (never actually written) are still yielded; callers
    /// distinguish via [`VersionedStoreClient::get_segment_value`]
    /// returning `None`.
    fn reverse_segments_from<'a>(
        &'a self,
        from_timestamp: i64,
        observed_stream_time: i64,
        history_retention: i64,
    ) -> Box<dyn Iterator<Item = SegmentId> + 'a>;

    /// Reads the packed segment-tier value for `key` in segment `id`.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    fn get_segment_value(&self, id: SegmentId, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Writes the packed segment-tier value for `key` in segment `id`.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    fn put_segment_value(&self, id: SegmentId, key: &[u8], raw: &[u8]) -> Result<()>;
}

/// The live [`VersionedStoreClient`] backing a real [`crate::store::Store`]:
/// a [`BackingKv`] handle plus the [`SegmentRegistry`] tracking which
/// segments exist.
pub struct LiveClient {
    backing: Arc<dyn BackingKv>,
    registry: SegmentRegistry,
    latest_values_cf: String,
}

impl LiveClient {
    /// Builds a client for a store named `store_name`, bucketing segments
    /// into `segment_interval`-wide buckets and reading/writing through
    /// `backing`.
    #[must_use]
    pub fn new(store_name: &str, segment_interval: i64, backing: Arc<dyn BackingKv>) -> Self {
        Self {
            backing,
            registry: SegmentRegistry::new(store_name, segment_interval),
            latest_values_cf: format!("{store_name}.latest_values"),
        }
    }

    /// The segment registry backing this client.
    #[must_use]
    pub fn registry(&self) -> &SegmentRegistry {
        &self.registry
    }

    /// The underlying backing engine handle.
    #[must_use]
    pub fn backing(&self) -> &Arc<dyn BackingKv> {
        &self.backing
    }

    /// Drops every tracked segment that has fallen out of the retention
    /// window as of `observed_stream_time`, returning the ids dropped.
    ///
    /// # Errors
    ///
    /// Returns an error on backing engine failure.
    pub fn expire_segments(&self, observed_stream_time: i64, history_retention: i64) -> Result<Vec<SegmentId>> {
        self.registry
            .expire(self.backing.as_ref(), observed_stream_time, history_retention)
    }

    /// The column family name the latest tier is stored under.
    #[must_use]
    pub fn latest_values_column_family(&self) -> &str {
        &self.latest_values_cf
    }
}

impl VersionedStoreClient for LiveClient {
    fn get_latest_value(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.backing.get(&self.latest_values_cf, key)
    }

    fn put_latest_value(&self, key: &[u8], raw: &[u8]) -> Result<()> {
        self.backing.put(&self.latest_values_cf, key, raw)
    }

    fn delete_latest_value(&self, key: &[u8]) -> Result<()> {
        self.backing.delete(&self.latest_values_cf, key)
    }

    fn segment_id_for_timestamp(&self, timestamp: i64) -> SegmentId {
        self.registry.segment_id_for(timestamp)
    }

    fn get_or_create_segment_if_live(
        &self,
        timestamp: i64,
        observed_stream_time: i64,
        history_retention: i64,
    ) -> Result<Option<SegmentId>> {
        let cf = self.registry.get_or_create_if_live(
            self.backing.as_ref(),
            timestamp,
            observed_stream_time,
            history_retention,
        )?;
        Ok(cf.map(|_| self.registry.segment_id_for(timestamp)))
    }

    fn reverse_segments_from<'a>(
        &'a self,
        from_timestamp: i64,
        observed_stream_time: i64,
        history_retention: i64,
    ) -> Box<dyn Iterator<Item = SegmentId> + 'a> {
        Box::new(
            self.registry
                .segments_covering_from(from_timestamp, observed_stream_time, history_retention),
        )
    }

    fn get_segment_value(&self, id: SegmentId, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.backing.get(&self.registry.column_family(id), key)
    }

    fn put_segment_value(&self, id: SegmentId, key: &[u8], raw: &[u8]) -> Result<()> {
        self.backing.open_column_family(&self.registry.column_family(id))?;
        self.backing.put(&self.registry.column_family(id), key, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackingKv;
    use test_log::test;

    fn client() -> LiveClient {
        LiveClient::new("kv", 100, Arc::new(MemoryBackingKv::new()))
    }

    #[test]
    fn latest_tier_round_trip() {
        let c = client();
        assert_eq!(c.get_latest_value(b"k").unwrap(), None);
        c.put_latest_value(b"k", b"v").unwrap();
        assert_eq!(c.get_latest_value(b"k").unwrap(), Some(b"v".to_vec()));
        c.delete_latest_value(b"k").unwrap();
        assert_eq!(c.get_latest_value(b"k").unwrap(), None);
    }

    #[test]
    fn segment_tier_round_trip() {
        let c = client();
        let id = c
            .get_or_create_segment_if_live(950, 1_000, 2_000)
            .unwrap()
            .expect("should be live");

        assert_eq!(c.get_segment_value(id, b"k").unwrap(), None);
        c.put_segment_value(id, b"k", b"v").unwrap();
        assert_eq!(c.get_segment_value(id, b"k").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn expired_segment_is_refused() {
        let c = client();
        let result = c.get_or_create_segment_if_live(0, 1_000_000, 10).unwrap();
        assert_eq!(result, None);
    }
}
