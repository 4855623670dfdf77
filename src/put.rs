//! Places a new `(key, value, timestamp)` version into the latest tier or a
//! segment, maintaining per-key version ordering, updating the implicit
//! `validTo` of whichever version it displaces, and honoring history
//! retention.
//!
//! This is the densest part of the store: a three-phase scan carrying one
//! running variable, `found_ts`, which holds the smallest `validFrom` seen so
//! far that is strictly greater than the incoming `timestamp` — the current
//! best guess for the new record's own `validTo`. `None` is the sentinel
//! meaning "nothing bounds it yet; it belongs in the latest tier."
//!
//! Write ordering inside phases 1 and 2 is deliberate: a displaced record is
//! always persisted to its new home before the write that removes it from
//! its old one, so that a crash between the two duplicates data rather than
//! losing it (see [`crate::client::VersionedStoreClient`] docs and the
//! teacher's own flush-before-replace ordering in `tree/mod.rs`).

use crate::client::VersionedStoreClient;
use crate::context::StreamContext;
use crate::error::Result;
use crate::latest_value;
use crate::metrics::Metrics;
use crate::segment_registry::SegmentId;
use crate::segment_value::{self, RecordValue, SegmentValue};

/// Inserts `value` (a real value or a tombstone) for `key` at `timestamp`.
///
/// `observed_stream_time` must already reflect `timestamp` (the caller, the
/// store facade, advances its clock before calling in).
///
/// # Errors
///
/// Returns an error on backing engine failure.
pub fn put(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    value: RecordValue,
    timestamp: i64,
) -> Result<()> {
    match phase1(client, context, metrics, history_retention, observed_stream_time, key, value, timestamp)? {
        Phase1Outcome::Done => Ok(()),
        Phase1Outcome::Continue { value, found_ts } => {
            let found_ts = phase2(
                client,
                context,
                metrics,
                history_retention,
                observed_stream_time,
                key,
                &value,
                timestamp,
                found_ts,
            )?;
            match found_ts {
                Phase2Outcome::Done => Ok(()),
                Phase2Outcome::FoundTs(found_ts) => phase3(
                    client,
                    context,
                    metrics,
                    history_retention,
                    observed_stream_time,
                    key,
                    value,
                    timestamp,
                    found_ts,
                ),
            }
        }
    }
}

/// Reads the as-of value for `key` at `timestamp`, writes a tombstone at
/// `timestamp`, and returns what the read saw.
///
/// # Errors
///
/// Returns an error on backing engine failure.
pub fn delete(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    timestamp: i64,
) -> Result<Option<(Vec<u8>, i64)>> {
    let previous = crate::get::get_as_of(client, history_retention, observed_stream_time, key, timestamp)?;
    put(
        client,
        context,
        metrics,
        history_retention,
        observed_stream_time,
        key,
        RecordValue::Tombstone,
        timestamp,
    )?;
    Ok(previous)
}

enum Phase1Outcome {
    Done,
    Continue {
        value: RecordValue,
        found_ts: Option<i64>,
    },
}

/// Phase 1: consult the latest tier.
#[allow(clippy::too_many_arguments)]
fn phase1(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    value: RecordValue,
    timestamp: i64,
) -> Result<Phase1Outcome> {
    let Some(raw) = client.get_latest_value(key)? else {
        return Ok(Phase1Outcome::Continue { value, found_ts: None });
    };

    let latest_ts = latest_value::decode_timestamp(&raw);

    if timestamp < latest_ts {
        return Ok(Phase1Outcome::Continue {
            value,
            found_ts: Some(latest_ts),
        });
    }

    if timestamp == latest_ts {
        match value {
            RecordValue::Value(v) => client.put_latest_value(key, &latest_value::encode(&v, timestamp))?,
            RecordValue::Tombstone => client.delete_latest_value(key)?,
        }
        return Ok(Phase1Outcome::Done);
    }

    // timestamp > latest_ts: the current latest is demoted to a segment.
    let old_value = latest_value::decode_value(&raw).to_vec();
    demote_latest_to_segment(
        client,
        context,
        metrics,
        history_retention,
        observed_stream_time,
        key,
        old_value,
        latest_ts,
        timestamp,
    )?;

    match value {
        RecordValue::Value(v) => {
            client.put_latest_value(key, &latest_value::encode(&v, timestamp))?;
            Ok(Phase1Outcome::Done)
        }
        RecordValue::Tombstone => {
            // The tombstone itself still needs placing; it did not displace
            // anything (there is no earlier validTo to update), so it
            // re-enters as though nothing were found yet.
            client.delete_latest_value(key)?;
            Ok(Phase1Outcome::Continue {
                value: RecordValue::Tombstone,
                found_ts: None,
            })
        }
    }
}

/// Moves the outgoing latest value into the segment covering `new_valid_to`
/// (its new `validTo`), persisting the segment write before the caller goes
/// on to overwrite/remove the latest tier entry.
#[allow(clippy::too_many_arguments)]
fn demote_latest_to_segment(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    old_value: Vec<u8>,
    old_valid_from: i64,
    new_valid_to: i64,
) -> Result<()> {
    // The demoted record's segment is keyed by its own new validTo, which
    // happens to equal the incoming record's timestamp; see DESIGN.md for
    // why this coincidence is intentional rather than accidental.
    let Some(segment_id) =
        client.get_or_create_segment_if_live(new_valid_to, observed_stream_time, history_retention)?
    else {
        // The segment this value would be demoted into is already past the
        // retention window: the value is expired the moment it is displaced.
        log::warn!("dropping demoted latest value past retention window");
        context.record_expired();
        metrics.record_expired_put();
        return Ok(());
    };

    write_segment_record(client, segment_id, key, old_valid_from, new_valid_to, RecordValue::Value(old_value))
}

/// Writes one record `[valid_from, valid_to)` into `segment_id` for `key`,
/// prepending onto an existing segment value if one exists there, or
/// creating a fresh one-record segment value otherwise.
fn write_segment_record(
    client: &dyn VersionedStoreClient,
    segment_id: SegmentId,
    key: &[u8],
    valid_from: i64,
    valid_to: i64,
    value: RecordValue,
) -> Result<()> {
    match client.get_segment_value(segment_id, key)? {
        None => {
            let sv = SegmentValue::new_segment_value_with_record(valid_from, valid_to, value);
            client.put_segment_value(segment_id, key, &sv.serialize())
        }
        Some(raw) => {
            let mut sv = SegmentValue::deserialize(&raw)?;
            sv.insert_as_latest(valid_from, valid_to, value);
            client.put_segment_value(segment_id, key, &sv.serialize())
        }
    }
}

enum Phase2Outcome {
    Done,
    FoundTs(Option<i64>),
}

/// Phase 2: scan segments newest-first looking for the one the new record
/// displaces a predecessor from.
#[allow(clippy::too_many_arguments)]
fn phase2(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    value: &RecordValue,
    timestamp: i64,
    mut found_ts: Option<i64>,
) -> Result<Phase2Outcome> {
    for segment_id in client.reverse_segments_from(timestamp, observed_stream_time, history_retention) {
        let Some(raw) = client.get_segment_value(segment_id, key)? else {
            continue;
        };

        let next_ts = segment_value::next_timestamp(&raw)?;
        let min_ts = segment_value::min_timestamp(&raw)?;

        if next_ts <= timestamp {
            // Everything in this and earlier segments ends at or before
            // `timestamp`; nothing left to displace.
            return Ok(Phase2Outcome::FoundTs(found_ts));
        }

        if min_ts <= timestamp {
            put_to_segment(
                client,
                context,
                metrics,
                history_retention,
                observed_stream_time,
                segment_id,
                &raw,
                key,
                value.clone(),
                timestamp,
            )?;
            return Ok(Phase2Outcome::Done);
        }

        if min_ts < observed_stream_time.saturating_sub(history_retention) {
            log::warn!("dropping expired put for key (older than retention window)");
            context.record_expired();
            metrics.record_expired_put();
            return Ok(Phase2Outcome::Done);
        }

        found_ts = Some(min_ts);
    }

    Ok(Phase2Outcome::FoundTs(found_ts))
}

/// `putToSegment`: places `value` at `timestamp` inside a segment already
/// known to contain the record it displaces (`min_ts <= timestamp <
/// next_ts`).
#[allow(clippy::too_many_arguments)]
fn put_to_segment(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    segment_id: SegmentId,
    raw: &[u8],
    key: &[u8],
    value: RecordValue,
    timestamp: i64,
) -> Result<()> {
    let mut sv = SegmentValue::deserialize(raw)?;
    let wanted_id = client.segment_id_for_timestamp(timestamp);
    let need_move = wanted_id != segment_id;
    let found = sv.find(timestamp, need_move);

    if found.valid_from == timestamp {
        sv.update_record(found.index, timestamp, value);
        return client.put_segment_value(segment_id, key, &sv.serialize());
    }

    if need_move {
        let predecessor_value = found
            .value
            .clone()
            .expect("find(includeValue = true) was requested when need_move is set");

        match client.get_or_create_segment_if_live(timestamp, observed_stream_time, history_retention)? {
            Some(older_id) => {
                write_segment_record(client, older_id, key, found.valid_from, timestamp, predecessor_value)?;
            }
            None => {
                log::warn!("dropping displaced record past retention window during cross-segment move");
                context.record_expired();
                metrics.record_expired_put();
            }
        }

        sv.update_record(found.index, timestamp, value);
        return client.put_segment_value(segment_id, key, &sv.serialize());
    }

    sv.insert(found.index, timestamp, value);
    client.put_segment_value(segment_id, key, &sv.serialize())
}

/// Phase 3: the new record was not displaced from, and did not land in, any
/// existing segment.
#[allow(clippy::too_many_arguments)]
fn phase3(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    value: RecordValue,
    timestamp: i64,
    found_ts: Option<i64>,
) -> Result<()> {
    let Some(valid_to) = found_ts else {
        return phase3_latest(client, context, metrics, history_retention, observed_stream_time, key, value, timestamp);
    };

    match client.get_or_create_segment_if_live(valid_to, observed_stream_time, history_retention)? {
        None => {
            log::warn!("dropping put past retention window in phase 3");
            context.record_expired();
            metrics.record_expired_put();
            Ok(())
        }
        Some(segment_id) => match client.get_segment_value(segment_id, key)? {
            None => {
                let sv = SegmentValue::new_segment_value_with_record(timestamp, valid_to, value);
                client.put_segment_value(segment_id, key, &sv.serialize())
            }
            Some(raw) => {
                let next_ts = segment_value::next_timestamp(&raw)?;
                let mut sv = SegmentValue::deserialize(&raw)?;
                if next_ts <= timestamp {
                    // A gap left by a degenerate segment elsewhere; see
                    // `SegmentValue::insert_as_latest`'s gap-tolerant
                    // contract.
                    sv.insert_as_latest(timestamp, valid_to, value);
                } else {
                    sv.insert_as_earliest(timestamp, value);
                }
                client.put_segment_value(segment_id, key, &sv.serialize())
            }
        },
    }
}

/// `found_ts == sentinel`: the new record is the overall latest version.
#[allow(clippy::too_many_arguments)]
fn phase3_latest(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    value: RecordValue,
    timestamp: i64,
) -> Result<()> {
    let RecordValue::Value(v) = value else {
        return phase3_latest_tombstone(client, context, metrics, history_retention, observed_stream_time, key, timestamp);
    };
    client.put_latest_value(key, &latest_value::encode(&v, timestamp))
}

#[allow(clippy::too_many_arguments)]
fn phase3_latest_tombstone(
    client: &dyn VersionedStoreClient,
    context: &dyn StreamContext,
    metrics: &Metrics,
    history_retention: i64,
    observed_stream_time: i64,
    key: &[u8],
    timestamp: i64,
) -> Result<()> {
    match client.get_or_create_segment_if_live(timestamp, observed_stream_time, history_retention)? {
        None => {
            log::warn!("dropping tombstone past retention window");
            context.record_expired();
            metrics.record_expired_put();
            Ok(())
        }
        Some(segment_id) => match client.get_segment_value(segment_id, key)? {
            None => {
                // Degenerate segment value: a zero-width tombstone record,
                // since there is no older value in this segment to shrink.
                let sv = SegmentValue::new_segment_value_with_record(timestamp, timestamp, RecordValue::Tombstone);
                client.put_segment_value(segment_id, key, &sv.serialize())
            }
            Some(raw) => {
                let next_ts = segment_value::next_timestamp(&raw)?;
                if next_ts == timestamp {
                    // Already represented by the existing newest record's
                    // validTo; nothing to do.
                    return Ok(());
                }
                let mut sv = SegmentValue::deserialize(&raw)?;
                sv.insert_as_latest(next_ts, timestamp, RecordValue::Tombstone);
                client.put_segment_value(segment_id, key, &sv.serialize())
            }
        },
    }
}
