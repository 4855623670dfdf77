//! Maps timestamps to segment ids and tracks which segments are still
//! live against the configured retention window.
//!
//! A segment with id `i` covers the half-open time range
//! `[i * segment_interval, (i + 1) * segment_interval)`. A segment is
//! "live" while its upper bound still falls within
//! `history_retention` of the currently observed stream time; once stream
//! time advances past that, the segment is eligible for expiry.
//!
//! Segment identity comes from `validTo`, not `validFrom`, matching the
//! store's placement rule (see [`crate::put`]): a record is binned by the
//! timestamp at which it stops being valid, which is what makes "drop
//! everything past the retention window" a whole-segment operation rather
//! than requiring per-record inspection.
//!
//! Storage-wise this mirrors how the teacher's `LevelManifest` keeps its
//! own in-memory set of live segment ids (`HiddenSet`) rather than
//! re-deriving it from disk on every query — except here the registry is
//! generic over any [`crate::backend::BackingKv`] rather than a fixed
//! on-disk format, so it tracks liveness purely arithmetically and only
//! touches the backing engine to create or drop column families.

use crate::backend::BackingKv;
use crate::error::Result;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Identifies a segment: `floor(t / segment_interval)` for any `t` the
/// segment covers.
pub type SegmentId = i64;

/// Maps a timestamp to the id of the segment covering it.
#[must_use]
pub fn segment_id(timestamp: i64, segment_interval: i64) -> SegmentId {
    timestamp.div_euclid(segment_interval)
}

/// The exclusive upper bound (`validTo`) of the time range a segment id
/// covers.
#[must_use]
pub fn segment_upper_bound(id: SegmentId, segment_interval: i64) -> i64 {
    (id + 1) * segment_interval
}

/// Whether a segment is still within the retention window, given the
/// highest timestamp observed so far.
#[must_use]
pub fn is_live(id: SegmentId, observed_stream_time: i64, history_retention: i64, segment_interval: i64) -> bool {
    segment_upper_bound(id, segment_interval) > observed_stream_time.saturating_sub(history_retention)
}

/// Tracks which segments of one store have been created, and drives their
/// creation/expiry against a [`BackingKv`].
pub struct SegmentRegistry {
    store_name: String,
    segment_interval: i64,
    known_ids: Mutex<BTreeSet<SegmentId>>,
}

impl SegmentRegistry {
    /// Creates an empty registry for a store named `store_name`.
    #[must_use]
    pub fn new(store_name: impl Into<String>, segment_interval: i64) -> Self {
        Self {
            store_name: store_name.into(),
            segment_interval,
            known_ids: Mutex::new(BTreeSet::new()),
        }
    }

    /// Maps a timestamp to the id of the segment covering it.
    #[must_use]
    pub fn segment_id_for(&self, timestamp: i64) -> SegmentId {
        segment_id(timestamp, self.segment_interval)
    }

    /// Number of segments currently tracked as having been created, live or
    /// not yet expired. Used by [`crate::store::Store`] to derive a
    /// segments-created delta around a `put` without threading a metrics
    /// handle through every [`crate::client::VersionedStoreClient`] call.
    #[must_use]
    pub fn known_segment_count(&self) -> usize {
        self.known_ids.lock().expect("lock poisoned").len()
    }

    /// The backing-engine column family name for segment `id`.
    #[must_use]
    pub fn column_family(&self, id: SegmentId) -> String {
        format!("{}.segments/{id}", self.store_name)
    }

    /// Returns the column family name for the segment covering `timestamp`,
    /// creating it in `backing` (and remembering it) if it is live. Returns
    /// `None` without touching `backing` if the segment would already be
    /// outside the retention window.
    ///
    /// # Errors
    ///
    /// Returns an error if `backing` fails to open the column family.
    pub fn get_or_create_if_live(
        &self,
        backing: &dyn BackingKv,
        timestamp: i64,
        observed_stream_time: i64,
        history_retention: i64,
    ) -> Result<Option<String>> {
        let id = self.segment_id_for(timestamp);
        if !is_live(id, observed_stream_time, history_retention, self.segment_interval) {
            return Ok(None);
        }

        let cf = self.column_family(id);
        backing.open_column_family(&cf)?;
        self.known_ids.lock().expect("lock poisoned").insert(id);
        Ok(Some(cf))
    }

    /// Yields segment ids in descending order, starting from the newest live
    /// segment (bounded by `observed_stream_time`, since no record's
    /// `validTo` can exceed it) down to the segment covering `from_timestamp`
    /// inclusive, for as long as each is still live.
    ///
    /// A record valid at some timestamp `t >= from_timestamp` is stored by
    /// its `validTo`, which is strictly greater than `t` and therefore lies
    /// in a segment with id >= `segment_id_for(from_timestamp)` — i.e. at or
    /// above the floor, never below it. Segments that were never created are
    /// still yielded (the caller reads them from `backing` and gets `None`
    /// back); liveness, not existence, is what bounds the scan.
    pub fn segments_covering_from(
        &self,
        from_timestamp: i64,
        observed_stream_time: i64,
        history_retention: i64,
    ) -> impl Iterator<Item = SegmentId> + '_ {
        let floor = self.segment_id_for(from_timestamp);
        let start = self.segment_id_for(observed_stream_time).max(floor);
        let interval = self.segment_interval;

        (floor..=start)
            .rev()
            .take_while(move |&id| is_live(id, observed_stream_time, history_retention, interval))
    }

    /// Drops every known segment that has fallen out of the retention
    /// window as of `observed_stream_time`. Called after stream time
    /// advances.
    ///
    /// # Errors
    ///
    /// Returns an error if `backing` fails to drop a column family.
    pub fn expire(&self, backing: &dyn BackingKv, observed_stream_time: i64, history_retention: i64) -> Result<Vec<SegmentId>> {
        let mut known = self.known_ids.lock().expect("lock poisoned");
        let expired: Vec<SegmentId> = known
            .iter()
            .copied()
            .filter(|&id| !is_live(id, observed_stream_time, history_retention, self.segment_interval))
            .collect();

        for id in &expired {
            backing.drop_column_family(&self.column_family(*id))?;
            known.remove(id);
        }

        Ok(expired)
    }

    /// Persists all tracked segments via the backing engine.
    ///
    /// # Errors
    ///
    /// Returns an error if `backing` fails to flush.
    pub fn flush(&self, backing: &dyn BackingKv) -> Result<()> {
        backing.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackingKv;
    use test_log::test;

    #[test]
    fn segment_id_buckets_by_interval() {
        assert_eq!(segment_id(0, 100), 0);
        assert_eq!(segment_id(99, 100), 0);
        assert_eq!(segment_id(100, 100), 1);
        assert_eq!(segment_id(-1, 100), -1);
        assert_eq!(segment_id(-100, 100), -1);
        assert_eq!(segment_id(-101, 100), -2);
    }

    #[test]
    fn liveness_tracks_retention_window() {
        // segment 0 covers [0, 100); stream time 1000, retention 500 ->
        // live iff upper bound (100) > 1000 - 500 = 500. It is not.
        assert!(!is_live(0, 1_000, 500, 100));
        assert!(is_live(9, 1_000, 500, 100)); // covers [900,1000), upper bound 1000 > 500
    }

    #[test]
    fn get_or_create_respects_liveness() {
        let backing = MemoryBackingKv::new();
        let registry = SegmentRegistry::new("kv", 100);

        let cf = registry
            .get_or_create_if_live(&backing, 950, 1_000, 500)
            .unwrap();
        assert!(cf.is_some());
        assert!(backing.column_family_exists(&cf.unwrap()));

        let expired = registry
            .get_or_create_if_live(&backing, 50, 1_000, 500)
            .unwrap();
        assert_eq!(expired, None);
    }

    #[test]
    fn segments_covering_from_spans_newest_down_to_floor() {
        let registry = SegmentRegistry::new("kv", 100);
        // newest segment is segment_id_for(observed_stream_time=1_000) = 10;
        // floor is segment_id_for(from_timestamp=350) = 3; live iff
        // upper_bound(id) > 750, i.e. (id+1)*100 > 750 -> id >= 7. So the
        // scan yields 10, 9, 8, 7 and stops (7 is live; 6 would not be, but
        // it's also below the floor so it's moot).
        let ids: Vec<_> = registry.segments_covering_from(350, 1_000, 250).collect();
        assert_eq!(ids, vec![10, 9, 8, 7]);
    }

    #[test]
    fn segments_covering_from_never_descends_below_floor() {
        let registry = SegmentRegistry::new("kv", 100);
        // floor is segment_id_for(from_timestamp=950) = 9, but the newest
        // live segment is segment_id_for(observed_stream_time=1_000) = 10 —
        // a record with validTo == 1_000 legitimately lives there, so the
        // scan must still include it even though it sits above the floor.
        let ids: Vec<_> = registry.segments_covering_from(950, 1_000, 250).collect();
        assert_eq!(ids, vec![10, 9]);
    }

    #[test]
    fn expire_drops_out_of_window_segments() {
        let backing = MemoryBackingKv::new();
        let registry = SegmentRegistry::new("kv", 100);

        registry
            .get_or_create_if_live(&backing, 50, 100, 1_000)
            .unwrap();
        registry
            .get_or_create_if_live(&backing, 950, 100, 1_000)
            .unwrap();

        let expired = registry.expire(&backing, 5_000, 1_000).unwrap();
        assert_eq!(expired.len(), 2);
        assert!(!backing.column_family_exists(&registry.column_family(0)));
        assert!(!backing.column_family_exists(&registry.column_family(9)));
    }
}
