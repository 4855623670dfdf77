//! Locates the version of a key valid at a queried timestamp (or "now"),
//! reading the latest tier first and falling back to a newest-first segment
//! scan — the read-side mirror of [`crate::put`].

use crate::client::VersionedStoreClient;
use crate::error::Result;
use crate::latest_value;
use crate::segment_value::{self, SegmentValue};

/// One version of a key as returned to a caller: its value and the
/// `validFrom` timestamp it was written at. Tombstones are never returned;
/// they surface as `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedRecord {
    /// The record's value.
    pub value: Vec<u8>,
    /// The timestamp this version became valid at.
    pub valid_from: i64,
}

/// Current value of `key`: whatever the latest tier holds, if anything.
///
/// # Errors
///
/// Returns an error on backing engine failure.
pub fn get(client: &dyn VersionedStoreClient, key: &[u8]) -> Result<Option<VersionedRecord>> {
    let Some(raw) = client.get_latest_value(key)? else {
        return Ok(None);
    };

    Ok(Some(VersionedRecord {
        value: latest_value::decode_value(&raw).to_vec(),
        valid_from: latest_value::decode_timestamp(&raw),
    }))
}

/// The version of `key` valid at `as_of`, or `None` if no version was valid
/// then (including: queried before anything was ever written, queried at a
/// tombstoned interval, or queried outside the retention window).
///
/// # Errors
///
/// Returns an error on backing engine failure.
pub fn get_as_of(
    client: &dyn VersionedStoreClient,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    as_of: i64,
) -> Result<Option<(Vec<u8>, i64)>> {
    if as_of < observed_stream_time.saturating_sub(history_retention) {
        return Ok(None);
    }

    if let Some(raw) = client.get_latest_value(key)? {
        let latest_ts = latest_value::decode_timestamp(&raw);
        if latest_ts <= as_of {
            return Ok(Some((latest_value::decode_value(&raw).to_vec(), latest_ts)));
        }
    }

    for segment_id in client.reverse_segments_from(as_of, observed_stream_time, history_retention) {
        let Some(raw) = client.get_segment_value(segment_id, key)? else {
            continue;
        };

        let next_ts = segment_value::next_timestamp(&raw)?;
        if next_ts <= as_of {
            // No record in this segment, or any earlier one, can satisfy
            // the query: this segment's newest record already ended at or
            // before `as_of`, and every earlier segment ends earlier still.
            return Ok(None);
        }

        let min_ts = segment_value::min_timestamp(&raw)?;
        if min_ts > as_of {
            // The desired version, if any, lies in an earlier segment.
            continue;
        }

        let found = SegmentValue::deserialize(&raw)?.find(as_of, true);
        return Ok(match found.value {
            Some(value) => value.as_slice().map(|bytes| (bytes.to_vec(), found.valid_from)),
            None => None,
        });
    }

    Ok(None)
}
