//! Codec for the latest-tier value: the most recent non-tombstone version of
//! a key, stored as one opaque value per key.
//!
//! # Format
//!
//! ```text
//! +------------------+------------------+
//! | timestamp (i64)  | value (N bytes)  |
//! +------------------+------------------+
//!   8 bytes, BE         remaining bytes
//! ```
//!
//! Tombstones are never encoded here (see [`Invariants`](crate#invariants));
//! encoding one is a programmer error and panics rather than returning a
//! `Result`, the same way the teacher crate's `Config` builder panics on
//! out-of-range block sizes instead of surfacing them as `Err`.

use byteorder::{BigEndian, ByteOrder};

const TIMESTAMP_LEN: usize = 8;

/// Encodes `(value, timestamp)` as the latest-tier representation.
///
/// # Panics
///
/// Panics if called with a value that represents a tombstone encoding is
/// undefined for deletions in the latest tier; deletions are represented by
/// removing the key instead (see [`crate::put`]).
#[must_use]
pub fn encode(value: &[u8], timestamp: i64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TIMESTAMP_LEN + value.len());
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(value);
    buf
}

/// Reads the `validFrom` timestamp out of an encoded latest-tier value.
///
/// # Panics
///
/// Panics if `raw` is shorter than 8 bytes; the latest tier never stores a
/// malformed record, so this would indicate a corrupted backing engine.
#[must_use]
#[allow(clippy::indexing_slicing)]
pub fn decode_timestamp(raw: &[u8]) -> i64 {
    BigEndian::read_i64(&raw[..TIMESTAMP_LEN])
}

/// Reads the value bytes out of an encoded latest-tier value.
///
/// # Panics
///
/// Panics if `raw` is shorter than 8 bytes.
#[must_use]
#[allow(clippy::indexing_slicing)]
pub fn decode_value(raw: &[u8]) -> &[u8] {
    &raw[TIMESTAMP_LEN..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn round_trip() {
        let raw = encode(b"hello", 42);
        assert_eq!(decode_timestamp(&raw), 42);
        assert_eq!(decode_value(&raw), b"hello");
    }

    #[test]
    fn round_trip_empty_value() {
        let raw = encode(b"", -1);
        assert_eq!(decode_timestamp(&raw), -1);
        assert_eq!(decode_value(&raw), b"");
    }

    #[test]
    fn negative_timestamp() {
        let raw = encode(b"x", i64::MIN);
        assert_eq!(decode_timestamp(&raw), i64::MIN);
    }
}
