#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-store-memory** – In-memory, non-persistent storage driver for
//! LogJoin.
//!
//! Backed by a `BTreeMap`, which is natively ordered, so this driver gives
//! the [`KvCursor`] contract a direct, literal implementation with no
//! range-scan emulation required. It has no durability guarantees and is
//! intended for tests and local development.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use logjoin_store_core::{KvCursor, KvTransaction, StoreError};

/// An in-memory, non-persistent ordered key-value store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a transaction. Only one transaction may be open at a time —
    /// attempting to begin a second while the first is still borrowed will
    /// deadlock on the internal mutex, same as a real single-writer
    /// embedded engine would serialize concurrent writers.
    pub fn transaction(&self) -> MemoryTransaction<'_> {
        MemoryTransaction { guard: self.inner.lock().expect("memory store mutex poisoned") }
    }

    /// Number of keys currently stored. Useful in tests asserting a
    /// scan-and-drain left the store empty.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("memory store mutex poisoned").len()
    }

    /// True if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A transaction against a [`MemoryStore`].
///
/// There is no rollback support: every write lands in the underlying map
/// immediately. This is sufficient for the single-threaded, single-writer
/// discipline `spec.md` §5 describes, and keeps the reference backend used
/// by the core's tests simple to reason about.
pub struct MemoryTransaction<'a> {
    guard: MutexGuard<'a, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl KvTransaction for MemoryTransaction<'_> {
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.guard.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn cursor(&mut self) -> Result<Box<dyn KvCursor + '_>, StoreError> {
        Ok(Box::new(MemoryCursor { map: &mut self.guard, current_key: None }))
    }
}

/// A cursor over a [`MemoryTransaction`]'s view of the keyspace.
struct MemoryCursor<'a> {
    map: &'a mut BTreeMap<Vec<u8>, Vec<u8>>,
    current_key: Option<Vec<u8>>,
}

impl KvCursor for MemoryCursor<'_> {
    fn seek_first_or_greater(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        self.current_key = self.map.range(key.to_vec()..).next().map(|(k, _)| k.clone());
        Ok(self.current_key.is_some())
    }

    fn next(&mut self) -> Result<bool, StoreError> {
        self.current_key = match &self.current_key {
            Some(cur) => self
                .map
                .range((Bound::Excluded(cur.clone()), Bound::Unbounded))
                .next()
                .map(|(k, _)| k.clone()),
            None => None,
        };
        Ok(self.current_key.is_some())
    }

    fn current_key(&self) -> Option<&[u8]> {
        self.current_key.as_deref()
    }

    fn current_value(&self) -> Option<&[u8]> {
        self.current_key.as_ref().and_then(|k| self.map.get(k)).map(Vec::as_slice)
    }

    fn delete_current(&mut self) -> Result<(), StoreError> {
        if let Some(key) = &self.current_key {
            self.map.remove(key);
        }
        Ok(())
    }
}
