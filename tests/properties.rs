//! Property tests quantifying over arbitrary put sequences and arbitrary
//! encoded values, rather than the fixed scenarios in `tests/scenarios.rs`.

use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use versioned_kv::{MemoryBackingKv, SimpleContext, Store, StoreConfig};

fn store() -> Store {
    let state_dir = tempfile::tempdir().expect("tempdir should create");
    StoreConfig::new(
        "properties",
        Arc::new(MemoryBackingKv::new()),
        Arc::new(SimpleContext::new(state_dir.path())),
    )
    .segment_interval(5)
    .history_retention(1_000_000)
    .open()
    .expect("store should open")
}

/// A set of distinct `(validFrom, value)` pairs for a single key, sorted by
/// timestamp, with no two versions sharing a timestamp.
fn distinct_timestamped_values() -> impl Strategy<Value = Vec<(i64, u8)>> {
    vec((0i64..500, any::<u8>()), 1..30).prop_map(|entries| {
        let mut by_ts: BTreeMap<i64, u8> = BTreeMap::new();
        for (ts, v) in entries {
            by_ts.insert(ts, v);
        }
        by_ts.into_iter().collect()
    })
}

/// Deterministic Fisher-Yates shuffle seeded by a proptest-generated `u64`,
/// so arrival order varies across cases without pulling in `rand` (whose
/// shrinking doesn't compose with `proptest`'s).
fn shuffled_indices(len: usize, seed: u64) -> Vec<usize> {
    let mut items: Vec<usize> = (0..len).collect();
    let mut state = seed | 1;
    for i in (1..items.len()).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        let j = (state as usize) % (i + 1);
        items.swap(i, j);
    }
    items
}

proptest! {
    /// P1: however puts for a single key arrive, the store holds a total
    /// order over versions — querying exactly at any `validFrom` returns
    /// that version's own value, never a neighbor's.
    #[test]
    fn p1_total_order_is_independent_of_arrival_order(
        versions in distinct_timestamped_values(),
        seed in any::<u64>(),
    ) {
        let s = store();
        for &i in &shuffled_indices(versions.len(), seed) {
            let (ts, v) = versions[i];
            s.put(b"k", &[v], ts).unwrap();
        }

        for &(ts, v) in &versions {
            let record = s.get_as_of(b"k", ts).unwrap();
            prop_assert_eq!(record.map(|r| r.value), Some(vec![v]));
        }
    }

    /// P3: a version is retrievable anywhere in its validity interval
    /// `[validFrom, nextValidFrom)`, regardless of which segment the put
    /// physically lands in or what order puts arrive in.
    #[test]
    fn p3_segment_placement_preserves_validity_intervals(
        versions in distinct_timestamped_values(),
        seed in any::<u64>(),
    ) {
        let s = store();
        for &i in &shuffled_indices(versions.len(), seed) {
            let (ts, v) = versions[i];
            s.put(b"k", &[v], ts).unwrap();
        }

        for w in versions.windows(2) {
            let (ts, v) = w[0];
            let next_ts = w[1].0;
            let mid = ts + (next_ts - ts) / 2;
            let record = s.get_as_of(b"k", mid).unwrap();
            prop_assert_eq!(record.map(|r| r.value), Some(vec![v]));
        }

        let (last_ts, last_v) = *versions.last().unwrap();
        prop_assert_eq!(s.get(b"k").unwrap().map(|r| r.value), Some(vec![last_v]));
        prop_assert_eq!(s.get_as_of(b"k", last_ts + 1_000).unwrap().map(|r| r.value), Some(vec![last_v]));
    }

    /// P5: the latest-tier codec round-trips arbitrary values and
    /// timestamps exactly.
    #[test]
    fn p5_latest_value_round_trips(value in vec(any::<u8>(), 0..64), timestamp in any::<i64>()) {
        let raw = versioned_kv::latest_value::encode(&value, timestamp);
        prop_assert_eq!(versioned_kv::latest_value::decode_timestamp(&raw), timestamp);
        prop_assert_eq!(versioned_kv::latest_value::decode_value(&raw), value.as_slice());
    }

    /// P5: the segment-value codec round-trips an arbitrary chain of
    /// records built up through repeated inserts.
    #[test]
    fn p5_segment_value_round_trips(versions in distinct_timestamped_values()) {
        use versioned_kv::{RecordValue, SegmentValue};

        let (first_ts, first_v) = versions[0];
        let final_next = versions.last().unwrap().0 + 1;

        let mut sv = SegmentValue::new_segment_value_with_record(
            first_ts,
            versions.get(1).map_or(final_next, |&(t, _)| t),
            RecordValue::Value(vec![first_v]),
        );

        for (idx, &(ts, v)) in versions.iter().enumerate().skip(1) {
            let end = versions.get(idx + 1).map_or(final_next, |&(t, _)| t);
            sv.insert_as_latest(ts, end, RecordValue::Value(vec![v]));
        }

        let raw = sv.serialize();
        let decoded = SegmentValue::deserialize(&raw).unwrap();
        prop_assert_eq!(decoded, sv);
    }

    /// P6: replaying an identical put sequence a second time is a no-op —
    /// every query against the store returns the same result it did after
    /// the first pass.
    #[test]
    fn p6_replay_is_idempotent(versions in distinct_timestamped_values(), seed in any::<u64>()) {
        let s = store();
        let order = shuffled_indices(versions.len(), seed);

        for &i in &order {
            let (ts, v) = versions[i];
            s.put(b"k", &[v], ts).unwrap();
        }

        let before: Vec<_> = versions.iter().map(|&(ts, _)| s.get_as_of(b"k", ts).unwrap()).collect();
        let current_before = s.get(b"k").unwrap();

        for &i in &order {
            let (ts, v) = versions[i];
            s.put(b"k", &[v], ts).unwrap();
        }

        let after: Vec<_> = versions.iter().map(|&(ts, _)| s.get_as_of(b"k", ts).unwrap()).collect();
        prop_assert_eq!(before, after);
        prop_assert_eq!(current_before, s.get(b"k").unwrap());
    }
}
