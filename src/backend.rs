//! The storage collaborator this crate builds on top of.
//!
//! The store itself only knows how to place bytes into named, independently
//! droppable keyspaces ("column families") and read them back; it has no
//! opinion on how those bytes reach disk, get compacted, or get cached. That
//! job belongs to whatever concrete engine implements [`BackingKv`] — in
//! production that would be a real LSM-tree or similar; here it is narrowed
//! to the handful of operations [`crate::client::VersionedStoreClient`]
//! actually needs, the way [`crate::abstract::AbstractTree`] (not carried
//! into this crate) narrows a whole storage engine down to `get`/`insert`/
//! `remove` for the code that only cares about reading and writing one tree.
//!
//! [`MemoryBackingKv`] is the one implementation shipped here: an in-memory
//! reference engine good enough to exercise and test the algorithms, not a
//! deliverable storage engine.

use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// A storage engine scoped into independently droppable column families.
///
/// All operations are keyed by `(column_family, key)`. Column families are
/// created implicitly by the first write or explicitly via
/// [`BackingKv::open_column_family`]; reading or writing to one that was
/// never opened and holds no data returns `Ok(None)`/is a no-op, matching
/// how a fresh LSM-tree segment behaves before anything has been flushed
/// into it.
pub trait BackingKv: Send + Sync {
    /// Reads a value, or `None` if the key is absent from the column family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] or [`Error::Io`] on engine failure.
    fn get(&self, column_family: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Writes a value, overwriting any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] or [`Error::Io`] on engine failure.
    fn put(&self, column_family: &str, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a key. Absent keys are a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] or [`Error::Io`] on engine failure.
    fn delete(&self, column_family: &str, key: &[u8]) -> Result<()>;

    /// Ensures the column family exists, creating it empty if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] on engine failure.
    fn open_column_family(&self, column_family: &str) -> Result<()>;

    /// Drops a column family and everything in it. Dropping one that does
    /// not exist is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] on engine failure.
    fn drop_column_family(&self, column_family: &str) -> Result<()>;

    /// Returns `true` if the column family exists (has been opened and not
    /// since dropped), regardless of whether it holds any data.
    fn column_family_exists(&self, column_family: &str) -> bool;

    /// Persists all pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] or [`Error::Io`] on engine failure.
    fn flush(&self) -> Result<()>;

    /// Releases engine resources. After this, every other method may
    /// return [`Error::StoreClosed`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] or [`Error::Io`] on engine failure.
    fn close(&self) -> Result<()>;
}

/// An in-memory [`BackingKv`] reference implementation.
///
/// Column families are plain `BTreeMap`s guarded by one `RwLock`; `flush`
/// and `close` are no-ops beyond the open/closed flag, since there is
/// nothing on disk to synchronize. Good enough to run the full algorithm
/// suite against in tests; not persistent, not concurrent beyond the single
/// lock, not a deliverable engine.
#[derive(Default)]
pub struct MemoryBackingKv {
    state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    column_families: HashMap<String, BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: bool,
}

impl MemoryBackingKv {
    /// Creates an empty in-memory engine with no column families.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(state: &MemoryState) -> Result<()> {
        if state.closed {
            Err(Error::StoreClosed)
        } else {
            Ok(())
        }
    }
}

impl BackingKv for MemoryBackingKv {
    fn get(&self, column_family: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.read().expect("lock poisoned");
        Self::check_open(&state)?;
        Ok(state
            .column_families
            .get(column_family)
            .and_then(|cf| cf.get(key))
            .cloned())
    }

    fn put(&self, column_family: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        Self::check_open(&state)?;
        state
            .column_families
            .entry(column_family.to_owned())
            .or_default()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, column_family: &str, key: &[u8]) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        Self::check_open(&state)?;
        if let Some(cf) = state.column_families.get_mut(column_family) {
            cf.remove(key);
        }
        Ok(())
    }

    fn open_column_family(&self, column_family: &str) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        Self::check_open(&state)?;
        state
            .column_families
            .entry(column_family.to_owned())
            .or_default();
        Ok(())
    }

    fn drop_column_family(&self, column_family: &str) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        Self::check_open(&state)?;
        state.column_families.remove(column_family);
        Ok(())
    }

    fn column_family_exists(&self, column_family: &str) -> bool {
        let state = self.state.read().expect("lock poisoned");
        state.column_families.contains_key(column_family)
    }

    fn flush(&self) -> Result<()> {
        let state = self.state.read().expect("lock poisoned");
        Self::check_open(&state)
    }

    fn close(&self) -> Result<()> {
        let mut state = self.state.write().expect("lock poisoned");
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn put_get_delete_round_trip() {
        let kv = MemoryBackingKv::new();
        kv.open_column_family("cf").unwrap();

        assert_eq!(kv.get("cf", b"k").unwrap(), None);

        kv.put("cf", b"k", b"v1").unwrap();
        assert_eq!(kv.get("cf", b"k").unwrap(), Some(b"v1".to_vec()));

        kv.put("cf", b"k", b"v2").unwrap();
        assert_eq!(kv.get("cf", b"k").unwrap(), Some(b"v2".to_vec()));

        kv.delete("cf", b"k").unwrap();
        assert_eq!(kv.get("cf", b"k").unwrap(), None);
    }

    #[test]
    fn column_families_are_isolated() {
        let kv = MemoryBackingKv::new();
        kv.put("a", b"k", b"in-a").unwrap();
        kv.put("b", b"k", b"in-b").unwrap();

        assert_eq!(kv.get("a", b"k").unwrap(), Some(b"in-a".to_vec()));
        assert_eq!(kv.get("b", b"k").unwrap(), Some(b"in-b".to_vec()));
    }

    #[test]
    fn drop_column_family_removes_all_keys() {
        let kv = MemoryBackingKv::new();
        kv.put("cf", b"k1", b"v1").unwrap();
        kv.put("cf", b"k2", b"v2").unwrap();

        assert!(kv.column_family_exists("cf"));
        kv.drop_column_family("cf").unwrap();
        assert!(!kv.column_family_exists("cf"));
        assert_eq!(kv.get("cf", b"k1").unwrap(), None);
    }

    #[test]
    fn closed_engine_rejects_operations() {
        let kv = MemoryBackingKv::new();
        kv.close().unwrap();

        assert!(matches!(kv.get("cf", b"k"), Err(Error::StoreClosed)));
        assert!(matches!(kv.put("cf", b"k", b"v"), Err(Error::StoreClosed)));
    }
}
