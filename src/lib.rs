// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A persistent, time-versioned key-value store core.
//!
//! ##### NOTE
//!
//! > This crate provides the put/get algorithms and on-disk formats for a
//! > versioned key-value store, not a full storage engine. It does not ship
//! > a backing disk engine; you bring one by implementing [`BackingKv`], or
//! > use the bundled [`MemoryBackingKv`] reference implementation to try it
//! > out or in tests.
//!
//! ##### About
//!
//! For each key this store retains a time-indexed history of values, so that
//! queries can ask not only "what is the current value of key K?" but also
//! "what was the value of key K as of timestamp T?". Versions older than a
//! configured history retention window are discarded; versions within the
//! window remain queryable.
//!
//! Internally, each key's current value lives in a **latest tier** (one
//! entry per key), while historical versions are packed into **segments**:
//! time-bucketed column families holding every version whose validity ended
//! within that bucket. Segmenting by `validTo` rather than `validFrom` is
//! what makes expiry a bulk, whole-segment drop instead of a per-key scan.
//!
//! # Example usage
//!
//! ```
//! use std::sync::Arc;
//! use versioned_kv::{MemoryBackingKv, SimpleContext, StoreConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let folder = tempfile::tempdir()?;
//!
//! let backing = Arc::new(MemoryBackingKv::new());
//! let context = Arc::new(SimpleContext::new(folder.path()));
//!
//! let store = StoreConfig::new("orders", backing, context)
//!     .segment_interval(60_000) // one-minute buckets
//!     .history_retention(3_600_000) // keep one hour of history
//!     .open()?;
//!
//! store.put(b"order-1", b"pending", 1_000)?;
//! store.put(b"order-1", b"shipped", 2_000)?;
//!
//! assert_eq!(store.get(b"order-1")?.unwrap().value, b"shipped");
//! assert_eq!(store.get_as_of(b"order-1", 1_500)?.unwrap().value, b"pending");
//!
//! store.delete(b"order-1", 3_000)?;
//! assert_eq!(store.get(b"order-1")?, None);
//!
//! store.flush()?;
//! store.close()?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

#[doc(hidden)]
pub mod binary_search;

pub mod backend;
pub mod client;
pub mod coding;
pub mod config;
pub mod context;
mod error;
pub mod get;
pub mod latest_value;
pub mod metrics;
pub mod put;
pub mod segment_registry;
pub mod segment_value;
mod store;
mod stream_time;

pub use {
    backend::{BackingKv, MemoryBackingKv},
    client::{LiveClient, VersionedStoreClient},
    config::StoreConfig,
    context::{SimpleContext, StreamContext},
    error::{Error, Result},
    get::VersionedRecord,
    metrics::Metrics,
    segment_registry::{SegmentId, SegmentRegistry},
    segment_value::{RecordValue, SegmentValue},
    store::Store,
};
