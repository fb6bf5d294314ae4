#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-store-sled** – Sled-backed durable storage driver for
//! LogJoin.
//!
//! This crate provides a durable, embedded storage backend using the sled
//! database engine, the same engine `toka-store-sled` uses elsewhere in
//! the Toka storage stack.
//!
//! `spec.md` §4.3 assumes the embedded engine hands the core "ordered
//! cursors and ACID transactions" directly. Sled's own transactional API
//! (`sled::Tree::transaction`) does not expose a multi-operation, ordered
//! cursor inside a transaction closure, so this driver bridges the gap
//! itself: a [`SledTransaction`] stages inserts and deletes in memory, a
//! cursor opened against it sees a merged view (the tree's committed
//! contents overlaid with the transaction's own pending writes), and
//! [`SledTransaction::commit`] applies everything as a single
//! [`sled::Batch`] — which sled *does* apply atomically. See `DESIGN.md`
//! for the full rationale.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use logjoin_store_core::{KvCursor, KvTransaction, StoreError};

//─────────────────────────────
//  Store
//─────────────────────────────

/// A durable, sled-backed ordered key-value store.
#[derive(Debug)]
pub struct SledStore {
    _db: sled::Db, // kept alive for the lifetime of the store
    tree: sled::Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`, using its default tree.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_config(sled::Config::default().path(path))
    }

    /// Open a sled database with a caller-supplied configuration.
    pub fn open_with_config(config: sled::Config) -> Result<Self, StoreError> {
        let db = config.open().map_err(|e| StoreError::Backend(e.to_string()))?;
        let tree = db.open_tree("logjoin").map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { _db: db, tree })
    }

    /// Open a temporary, self-cleaning sled database for tests.
    #[cfg(any(test, feature = "test-util"))]
    pub fn temporary() -> Result<Self, StoreError> {
        Self::open_with_config(sled::Config::new().temporary(true))
    }

    /// Begin a new transaction against this store.
    pub fn transaction(&self) -> SledTransaction<'_> {
        SledTransaction {
            tree: &self.tree,
            pending_inserts: BTreeMap::new(),
            pending_deletes: BTreeSet::new(),
        }
    }

    /// Flush all committed writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush().map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Number of keys currently committed to the store.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// True if the store holds no committed keys.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

//─────────────────────────────
//  Transaction
//─────────────────────────────

/// A staged, not-yet-committed unit of work against a [`SledStore`].
///
/// Dropping a `SledTransaction` without calling [`commit`](Self::commit)
/// discards every staged write — matching `spec.md` §5's "a caller that
/// abandons a transaction simply discards pending writes."
pub struct SledTransaction<'a> {
    tree: &'a sled::Tree,
    pending_inserts: BTreeMap<Vec<u8>, Vec<u8>>,
    pending_deletes: BTreeSet<Vec<u8>>,
}

impl SledTransaction<'_> {
    /// Apply every staged insert and delete atomically via a single
    /// [`sled::Batch`].
    pub fn commit(self) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for key in &self.pending_deletes {
            batch.remove(key.clone());
        }
        for (key, value) in &self.pending_inserts {
            batch.insert(key.clone(), value.clone());
        }
        self.tree.apply_batch(batch).map_err(|e| StoreError::Backend(e.to_string()))
    }
}

impl KvTransaction for SledTransaction<'_> {
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.pending_deletes.remove(key);
        self.pending_inserts.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn cursor(&mut self) -> Result<Box<dyn KvCursor + '_>, StoreError> {
        let mut snapshot = BTreeMap::new();
        for item in self.tree.iter() {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            let key = key.to_vec();
            if !self.pending_deletes.contains(&key) {
                snapshot.insert(key, value.to_vec());
            }
        }
        for (key, value) in &self.pending_inserts {
            snapshot.insert(key.clone(), value.clone());
        }
        Ok(Box::new(SledCursor {
            snapshot,
            current_key: None,
            pending_inserts: &mut self.pending_inserts,
            pending_deletes: &mut self.pending_deletes,
        }))
    }
}

//─────────────────────────────
//  Cursor
//─────────────────────────────

/// A cursor over a [`SledTransaction`]'s merged (committed ∪ pending) view
/// of the keyspace, materialized once when the cursor is opened.
struct SledCursor<'a> {
    snapshot: BTreeMap<Vec<u8>, Vec<u8>>,
    current_key: Option<Vec<u8>>,
    pending_inserts: &'a mut BTreeMap<Vec<u8>, Vec<u8>>,
    pending_deletes: &'a mut BTreeSet<Vec<u8>>,
}

impl KvCursor for SledCursor<'_> {
    fn seek_first_or_greater(&mut self, key: &[u8]) -> Result<bool, StoreError> {
        self.current_key = self.snapshot.range(key.to_vec()..).next().map(|(k, _)| k.clone());
        Ok(self.current_key.is_some())
    }

    fn next(&mut self) -> Result<bool, StoreError> {
        self.current_key = match &self.current_key {
            Some(cur) => self
                .snapshot
                .range((std::ops::Bound::Excluded(cur.clone()), std::ops::Bound::Unbounded))
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
        self.current_key.as_ref().and_then(|k| self.snapshot.get(k)).map(Vec::as_slice)
    }

    fn delete_current(&mut self) -> Result<(), StoreError> {
        if let Some(key) = &self.current_key {
            self.snapshot.remove(key);
            self.pending_inserts.remove(key);
            self.pending_deletes.insert(key.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_transaction_leaves_the_store_untouched() {
        let store = SledStore::temporary().unwrap();
        {
            let mut txn = store.transaction();
            txn.insert(b"a", b"1").unwrap();
            // dropped without commit
        }
        assert!(store.is_empty());
    }

    #[test]
    fn committed_writes_are_visible_after_commit() {
        let store = SledStore::temporary().unwrap();
        {
            let mut txn = store.transaction();
            txn.insert(b"a", b"1").unwrap();
            txn.commit().unwrap();
        }
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn cursor_sees_the_transactions_own_pending_writes() {
        let store = SledStore::temporary().unwrap();
        let mut txn = store.transaction();
        txn.insert(b"a", b"1").unwrap();
        let mut cursor = txn.cursor().unwrap();
        assert!(cursor.seek_first_or_greater(b"a").unwrap());
        assert_eq!(cursor.current_value(), Some(&b"1"[..]));
    }

    #[test]
    fn scan_and_drain_then_commit_removes_keys_durably() {
        let store = SledStore::temporary().unwrap();
        {
            let mut txn = store.transaction();
            txn.insert(b"u1~q~aaaa", b"1").unwrap();
            txn.insert(b"u2~q~bbbb", b"2").unwrap();
            txn.commit().unwrap();
        }
        {
            let mut txn = store.transaction();
            {
                let mut cursor = txn.cursor().unwrap();
                let mut found = cursor.seek_first_or_greater(b"u1").unwrap();
                while found {
                    if !cursor.current_key().unwrap().starts_with(b"u1") {
                        break;
                    }
                    cursor.delete_current().unwrap();
                    found = cursor.next().unwrap();
                }
            }
            txn.commit().unwrap();
        }
        assert_eq!(store.len(), 1);
    }
}
