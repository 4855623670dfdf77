//! Codec for the segment-tier value: a packed, time-ordered list of
//! historical versions of one key, all sharing the same storage segment.
//!
//! # Format
//!
//! ```text
//! +----------------+----------------+------------------+-----+-------------------+
//! | nextTimestamp  | minTimestamp   | descriptor[0]    | ... | value heap        |
//! | i64, BE        | i64, BE        | validFrom: i64   |     | (packed, BE)      |
//! |                |                | valueLength: i32 |     |                   |
//! +----------------+----------------+------------------+-----+-------------------+
//!        8 bytes          8 bytes     12 bytes each            remaining bytes
//! ```
//!
//! There is no explicit record count. The descriptor table grows forward
//! from byte 16 and the value heap grows backward from the end of the
//! block; decoding walks both cursors toward each other and stops exactly
//! when they meet, which is also how it detects a corrupt/truncated block
//! (the cursors would cross or leave a gap instead of meeting exactly).
//!
//! Descriptors are stored physically newest-first: descriptor `0` describes
//! the most recent record, and its `validTo` is the block's `nextTimestamp`.
//! For `i > 0`, `validTo` of descriptor `i` is `validFrom` of descriptor
//! `i - 1` — the chain is contiguous by construction, which is what lets
//! [`SegmentValue::insert_as_latest`] and [`SegmentValue::insert_as_earliest`]
//! touch only the header and one end of the descriptor table.
//!
//! The value heap is packed in the same newest-first order, but growing from
//! the end of the block toward the descriptor table: record `0`'s bytes are
//! the last bytes in the block, record `1`'s precede them, and so on.
//! Tombstones (`valueLength == -1`) occupy no heap bytes. This layout means a
//! `prepend` (new latest record) or `append` (new earliest record) never
//! requires moving any other record's value bytes, only growing the block.

use crate::coding::{Decode, DecodeError, Encode, EncodeError};
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

const HEADER_LEN: usize = 16;
const DESCRIPTOR_LEN: usize = 12;
const TOMBSTONE_LEN: i32 = -1;

/// One version of a key, as held inside a [`SegmentValue`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordValue {
    /// A real value.
    Value(Vec<u8>),
    /// A logical delete marker.
    Tombstone,
}

impl RecordValue {
    /// Returns the value bytes, or `None` if this is a tombstone.
    #[must_use]
    pub fn as_slice(&self) -> Option<&[u8]> {
        match self {
            Self::Value(v) => Some(v),
            Self::Tombstone => None,
        }
    }

    /// Whether this represents a logical delete.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Self::Tombstone)
    }

    fn encoded_len(&self) -> i32 {
        match self {
            // NOTE: segment values are never this large in practice; a
            // u32-sized single value would already dwarf any reasonable
            // segment interval.
            #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
            Self::Value(v) => v.len() as i32,
            Self::Tombstone => TOMBSTONE_LEN,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Record {
    valid_from: i64,
    value: RecordValue,
}

/// A packed, time-ordered list of historical versions of a single key.
///
/// Physically, `records[0]` is the newest and `records[len - 1]` is the
/// oldest; see the module docs for why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentValue {
    next_timestamp: i64,
    records: Vec<Record>,
}

/// The result of [`SegmentValue::find`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FoundRecord {
    /// The matched record's `validFrom`.
    pub valid_from: i64,
    /// The matched record's `validTo` (exclusive upper bound of validity).
    pub valid_to: i64,
    /// The matched record's physical position within the segment value.
    pub index: usize,
    /// The matched record's value, present only if `include_value` was set.
    pub value: Option<RecordValue>,
}

/// Reads `nextTimestamp` without parsing the descriptor table or heap.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if `raw` is shorter than the header.
pub fn next_timestamp(raw: &[u8]) -> Result<i64, DecodeError> {
    header_field(raw, 0)
}

/// Reads `minTimestamp` without parsing the descriptor table or heap.
///
/// # Errors
///
/// Returns [`DecodeError::Truncated`] if `raw` is shorter than the header.
pub fn min_timestamp(raw: &[u8]) -> Result<i64, DecodeError> {
    header_field(raw, 8)
}

fn header_field(raw: &[u8], offset: usize) -> Result<i64, DecodeError> {
    let end = offset + 8;
    let slice = raw.get(offset..end).ok_or(DecodeError::Truncated {
        what: "segment value header",
        needed: end,
        available: raw.len(),
    })?;
    Ok(BigEndian::read_i64(slice))
}

impl SegmentValue {
    /// Builds a fresh segment value containing exactly one record
    /// `[valid_from, valid_to)`, used the first time a key is written into a
    /// segment that does not exist yet. When `valid_from == valid_to` the
    /// record is degenerate (zero-width) — this happens when the first
    /// thing ever written to a brand new segment is a tombstone, since
    /// there is no older value in this segment for it to shrink.
    ///
    /// # Panics
    ///
    /// Panics if `valid_from > valid_to`.
    #[must_use]
    pub fn new_segment_value_with_record(valid_from: i64, valid_to: i64, value: RecordValue) -> Self {
        assert!(valid_from <= valid_to, "valid_from must not exceed valid_to");
        Self {
            next_timestamp: valid_to,
            records: vec![Record { valid_from, value }],
        }
    }

    /// The `validTo` of the newest packed record (the segment value's top-
    /// level `nextTimestamp`).
    #[must_use]
    pub fn get_next_timestamp(&self) -> i64 {
        self.next_timestamp
    }

    /// The `validFrom` of the oldest packed record.
    #[must_use]
    pub fn get_min_timestamp(&self) -> i64 {
        self.records
            .last()
            .map_or(self.next_timestamp, |r| r.valid_from)
    }

    /// Number of records packed into this segment value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether this segment value holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Finds the record whose interval `[validFrom, validTo)` contains
    /// `as_of`. Callers are expected to have already checked
    /// `min_timestamp() <= as_of < next_timestamp()`; violating that is a
    /// programmer error, so this panics rather than returning an `Option`.
    ///
    /// `include_value` controls whether the record's value is decoded; pass
    /// `false` when only the boundaries and index are needed, avoiding a
    /// needless clone.
    #[must_use]
    pub fn find(&self, as_of: i64, include_value: bool) -> FoundRecord {
        assert!(
            as_of < self.next_timestamp,
            "find() called with as_of >= next_timestamp; caller should have short-circuited"
        );

        let index = crate::binary_search::partition_point(&self.records, |r| r.valid_from > as_of);
        let record = self
            .records
            .get(index)
            .expect("as_of < next_timestamp and record validFroms are contiguous, so a match exists");

        let valid_to = self.valid_to_of(index);

        FoundRecord {
            valid_from: record.valid_from,
            valid_to,
            index,
            value: include_value.then(|| record.value.clone()),
        }
    }

    fn valid_to_of(&self, index: usize) -> i64 {
        if index == 0 {
            self.next_timestamp
        } else {
            self.records[index - 1].valid_from
        }
    }

    /// Prepends a new newest record starting at `prev_valid_to`.
    /// `new_valid_to` becomes the new `next_timestamp`.
    ///
    /// `prev_valid_to` must be at least the current `next_timestamp`: equal
    /// means the new record directly abuts the old newest one; greater means
    /// a gap, which can arise when a degenerate (tombstone-only) segment
    /// elsewhere left this segment's `next_timestamp` stale relative to the
    /// incoming record (see the module docs on degenerate segments). Either
    /// way the new record becomes the physically newest.
    ///
    /// # Panics
    ///
    /// Panics if `prev_valid_to < self.get_next_timestamp()`, which would
    /// overlap the current newest record's interval.
    pub fn insert_as_latest(&mut self, prev_valid_to: i64, new_valid_to: i64, value: RecordValue) {
        assert!(
            prev_valid_to >= self.next_timestamp,
            "insert_as_latest would overlap the current newest record"
        );
        self.records.insert(
            0,
            Record {
                valid_from: prev_valid_to,
                value,
            },
        );
        self.next_timestamp = new_valid_to;
    }

    /// Appends a new oldest record. Its `validTo` is implicitly the current
    /// `min_timestamp()`, so no explicit `valid_to` parameter is needed.
    pub fn insert_as_earliest(&mut self, valid_from: i64, value: RecordValue) {
        self.records.push(Record { valid_from, value });
    }

    /// Inserts a new record at physical `index`, shifting the record
    /// previously at `index` (and everything older) one slot down. Used to
    /// split an existing record's interval in place, without moving either
    /// half to a different segment.
    ///
    /// # Panics
    ///
    /// Panics if `index > self.len()`.
    pub fn insert(&mut self, index: usize, valid_from: i64, value: RecordValue) {
        self.records.insert(index, Record { valid_from, value });
    }

    /// Replaces the record at `index` in place, updating both its
    /// `validFrom` and its value. Used both for the simple
    /// value-replacement case (`valid_from` unchanged) and for splitting a
    /// record's interval when the new version stays in this segment
    /// (`valid_from` becomes the split point, and the old record's earlier
    /// half is relocated by the caller).
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.len()`.
    pub fn update_record(&mut self, index: usize, valid_from: i64, value: RecordValue) {
        let record = self
            .records
            .get_mut(index)
            .expect("update_record index out of bounds");
        record.valid_from = valid_from;
        record.value = value;
    }

    /// Serializes to the on-disk binary layout.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        self.encode_into_vec()
    }

    /// Parses the on-disk binary layout.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] if `raw` is truncated or structurally
    /// inconsistent.
    pub fn deserialize(raw: &[u8]) -> Result<Self, DecodeError> {
        let mut cursor = std::io::Cursor::new(raw);
        Self::decode_from(&mut cursor)
    }
}

impl Encode for SegmentValue {
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError> {
        writer.write_i64::<BigEndian>(self.next_timestamp)?;
        writer.write_i64::<BigEndian>(self.get_min_timestamp())?;

        for record in &self.records {
            writer.write_i64::<BigEndian>(record.valid_from)?;
            writer.write_i32::<BigEndian>(record.value.encoded_len())?;
        }

        // Heap is packed oldest-to-newest so that, once all values are
        // written, the newest (record 0) ends up as the last bytes in the
        // block.
        for record in self.records.iter().rev() {
            if let RecordValue::Value(v) = &record.value {
                writer.write_all(v)?;
            }
        }

        Ok(())
    }
}

impl Decode for SegmentValue {
    #[allow(clippy::indexing_slicing)]
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;

        if buf.len() < HEADER_LEN {
            return Err(DecodeError::Truncated {
                what: "segment value header",
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }

        let next_ts = BigEndian::read_i64(&buf[0..8]);
        // min_timestamp (bytes 8..16) is re-derived from the descriptor
        // table below; the on-disk copy exists purely so callers can read
        // it cheaply without parsing descriptors (see `min_timestamp`).

        // No stored record count: the descriptor table (growing forward from
        // `desc_ptr`) and the value heap (growing backward from `heap_end`)
        // are walked toward each other until they meet exactly. A mismatch
        // there means the block is corrupt or truncated.
        let mut desc_ptr = HEADER_LEN;
        let mut heap_end = buf.len();
        let mut records = Vec::new();

        while desc_ptr != heap_end {
            if desc_ptr + DESCRIPTOR_LEN > heap_end {
                return Err(DecodeError::Truncated {
                    what: "segment value descriptor table",
                    needed: desc_ptr + DESCRIPTOR_LEN,
                    available: heap_end,
                });
            }

            let valid_from = BigEndian::read_i64(&buf[desc_ptr..desc_ptr + 8]);
            let value_len = BigEndian::read_i32(&buf[desc_ptr + 8..desc_ptr + 12]);
            desc_ptr += DESCRIPTOR_LEN;

            let value = if value_len == TOMBSTONE_LEN {
                RecordValue::Tombstone
            } else if value_len < 0 {
                return Err(DecodeError::Truncated {
                    what: "segment value length",
                    needed: 0,
                    available: 0,
                });
            } else {
                #[allow(clippy::cast_sign_loss)]
                let len = value_len as usize;
                let start = heap_end
                    .checked_sub(len)
                    .filter(|&s| s >= desc_ptr)
                    .ok_or(DecodeError::Truncated {
                        what: "segment value heap entry",
                        needed: len,
                        available: heap_end.saturating_sub(desc_ptr),
                    })?;
                let bytes = buf[start..heap_end].to_vec();
                heap_end = start;
                RecordValue::Value(bytes)
            };

            records.push(Record { valid_from, value });
        }

        Ok(Self {
            next_timestamp: next_ts,
            records,
        })
    }
}
