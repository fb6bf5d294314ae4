#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-store-core** – Core ordered key-value transaction
//! abstractions for LogJoin storage drivers.
//!
//! This crate defines the contracts storage backends (in-memory, sled,
//! …) implement, without providing a concrete implementation itself. It
//! mirrors the separation the wider Toka storage stack uses: a dependency-
//! light trait crate at the core, with drivers living in sibling crates.
//!
//! [`EventStore`] is the "thin semantic wrapper" described by `spec.md`
//! §4.3: it knows the key layout (event records, customer-key records, the
//! session output queue) but owns no transaction itself — every call
//! borrows the caller's [`KvTransaction`] for the duration of the call,
//! per the concurrency model in `spec.md` §5.

use logjoin_types::{EventKind, CUSTOMER_KEY_SUFFIX, SESSION_QUEUE_PREFIX};

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Errors surfaced by a [`KvTransaction`]/[`KvCursor`] implementation.
///
/// Per `spec.md` §7, a store I/O failure is propagated to the caller and
/// the transaction is expected to abort — this crate never attempts to
/// retry or paper over a backend failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying engine reported an I/O or engine-level failure.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A cursor operation was attempted with no transaction live, or after
    /// the cursor was already closed.
    #[error("cursor used outside its transaction's lifetime")]
    CursorClosed,
}

//─────────────────────────────
//  Cursor trait
//─────────────────────────────

/// An ordered cursor over a transaction's keyspace.
///
/// Implementations must guarantee that `seek_first_or_greater` and `next`
/// visit keys in ascending lexicographic byte order, since the LogJoin
/// core relies on `<uid>~` being a contiguous range (`spec.md` §3
/// invariants).
pub trait KvCursor {
    /// Position the cursor at the first key `>= key`. Returns `true` if
    /// such a key exists.
    fn seek_first_or_greater(&mut self, key: &[u8]) -> Result<bool, StoreError>;

    /// Advance to the next key in ascending order. Returns `true` if a key
    /// exists after advancing.
    fn next(&mut self) -> Result<bool, StoreError>;

    /// The key at the cursor's current position, if any.
    fn current_key(&self) -> Option<&[u8]>;

    /// The value at the cursor's current position, if any.
    fn current_value(&self) -> Option<&[u8]>;

    /// Delete the key/value pair at the cursor's current position.
    fn delete_current(&mut self) -> Result<(), StoreError>;
}

//─────────────────────────────
//  Transaction trait
//─────────────────────────────

/// A single atomic unit of work against an ordered key-value store.
///
/// All writes performed through one `KvTransaction` are expected to commit
/// (or abort) together; this crate never calls commit/rollback itself —
/// per `spec.md` §5, "the KV transaction is exclusively owned by the
/// caller," and commit/abort is the caller's responsibility.
pub trait KvTransaction {
    /// Insert or overwrite `key` with `value`.
    fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Overwrite `key` with `value`. Per `spec.md` §4.3, the core treats
    /// this identically to `insert`; the distinction exists only because
    /// the embedded engine's own API distinguishes them.
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.insert(key, value)
    }

    /// Open a cursor over this transaction's view of the keyspace.
    fn cursor(&mut self) -> Result<Box<dyn KvCursor + '_>, StoreError>;
}

//─────────────────────────────
//  Key layout
//─────────────────────────────

/// Key-layout helpers shared by every storage driver, so the byte-level
/// encoding of uid/event/customer/envelope keys lives in exactly one place.
pub mod keys {
    use super::{EventKind, CUSTOMER_KEY_SUFFIX, SESSION_QUEUE_PREFIX};

    /// Build the key for one event record: `"<uid>~<evtype>~<hex>"`.
    pub fn event_key(uid: &str, kind: EventKind, suffix_hex: &str) -> Vec<u8> {
        format!("{uid}~{}~{suffix_hex}", kind.as_char()).into_bytes()
    }

    /// The `"<uid>~"` byte prefix shared by every record (event or
    /// customer-key) belonging to `uid`. Scanning on this prefix, rather
    /// than on bare `uid` bytes, is required so that a uid which is itself
    /// a byte-prefix of another uid (e.g. `"u1"` and `"u10"`) does not sweep
    /// up the longer uid's records.
    pub fn user_prefix(uid: &str) -> Vec<u8> {
        format!("{uid}~").into_bytes()
    }

    /// Build the key for a user's customer-key record: `"<uid>~cust"`.
    pub fn customer_key(uid: &str) -> Vec<u8> {
        format!("{uid}{CUSTOMER_KEY_SUFFIX}").into_bytes()
    }

    /// Build the key for an enqueued session envelope:
    /// `"__sessionq-<hex>"`.
    pub fn session_queue_key(suffix_hex: &str) -> Vec<u8> {
        format!("{SESSION_QUEUE_PREFIX}{suffix_hex}").into_bytes()
    }

    /// True if `key` is the customer-key record for `uid`.
    pub fn is_customer_key(key: &[u8], uid: &str) -> bool {
        key == customer_key(uid).as_slice()
    }

    /// Extract the event-kind character at the position it must occupy in
    /// an event key for `uid` (`spec.md` §4.5 step 2: "the character at
    /// offset `len(uid)+1`"). Returns `None` if `key` is too short or the
    /// byte there is not ASCII.
    pub fn event_kind_char(key: &[u8], uid: &str) -> Option<char> {
        key.get(uid.len() + 1).map(|&b| b as char)
    }
}

//─────────────────────────────
//  Random key suffixes
//─────────────────────────────

/// Generate a lowercase-hex-encoded random suffix of `n_bytes` bytes from a
/// per-process, thread-local cryptographically-strong generator (`spec.md`
/// §9: "must come from a cryptographically-strong or at least
/// per-process-seeded generator to avoid replay-across-restart key
/// collisions").
pub fn random_hex_suffix(n_bytes: usize) -> String {
    use rand::RngCore;
    let mut bytes = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

//─────────────────────────────
//  EventStore
//─────────────────────────────

/// A scanned key/value pair encountered while walking a user's event
/// records.
#[derive(Debug, Clone)]
pub struct ScannedRecord {
    /// The record's full key.
    pub key: Vec<u8>,
    /// The record's value bytes.
    pub value: Vec<u8>,
}

/// Thin, stateless wrapper over a [`KvTransaction`] that knows the LogJoin
/// key layout. Holds no transaction of its own — every method takes one by
/// reference, matching the ownership model in `spec.md` §5.
pub struct EventStore;

impl EventStore {
    /// Append one event record for `uid`, returning the key it was stored
    /// under. The random suffix makes a collision between two events of the
    /// same kind in the same microsecond vanishingly unlikely; on the rare
    /// collision the prior event is silently overwritten (`spec.md` §4.5
    /// "Tie-breaks").
    pub fn append_event(
        txn: &mut dyn KvTransaction,
        uid: &str,
        kind: EventKind,
        record_bytes: &[u8],
    ) -> Result<Vec<u8>, StoreError> {
        let suffix = random_hex_suffix(8); // 64 bits
        let key = keys::event_key(uid, kind, &suffix);
        txn.insert(&key, record_bytes)?;
        Ok(key)
    }

    /// Overwrite the customer-key record for `uid`.
    pub fn set_customer_key(
        txn: &mut dyn KvTransaction,
        uid: &str,
        customer_key: &str,
    ) -> Result<(), StoreError> {
        txn.update(&keys::customer_key(uid), customer_key.as_bytes())
    }

    /// Enqueue a serialized session envelope for downstream pickup.
    pub fn enqueue_session(
        txn: &mut dyn KvTransaction,
        envelope_bytes: &[u8],
    ) -> Result<(), StoreError> {
        let suffix = random_hex_suffix(16); // 128 bits
        txn.update(&keys::session_queue_key(&suffix), envelope_bytes)
    }

    /// Walk every record whose key begins with `uid`, invoking `visit` for
    /// each and deleting it from the store as it is visited — a single-pass
    /// scan-and-drain, per `spec.md` §4.3.
    ///
    /// `visit` receives the scanned key/value pair; returning an error from
    /// `visit` aborts the scan immediately (the cursor is still released).
    pub fn scan_and_drain_user<E>(
        txn: &mut dyn KvTransaction,
        uid: &str,
        mut visit: impl FnMut(ScannedRecord) -> Result<(), E>,
    ) -> Result<(), EventStoreScanError<E>> {
        // Scan on the `<uid>~` prefix, not bare `uid`: since `~` (0x7e) sorts
        // above every decimal digit, a shorter uid that is itself a prefix of
        // a longer one (e.g. "u1" vs "u10") would otherwise have its scan
        // range swallow the longer uid's records — `"u10~cust"` starts with
        // the bytes `"u1"` but not with `"u1~"`.
        let prefix = keys::user_prefix(uid);
        let mut cursor = txn.cursor().map_err(EventStoreScanError::Store)?;
        let mut found = cursor
            .seek_first_or_greater(&prefix)
            .map_err(EventStoreScanError::Store)?;
        while found {
            let key = cursor
                .current_key()
                .ok_or(StoreError::CursorClosed)
                .map_err(EventStoreScanError::Store)?
                .to_vec();
            if !key.starts_with(prefix.as_slice()) {
                break;
            }
            let value = cursor
                .current_value()
                .ok_or(StoreError::CursorClosed)
                .map_err(EventStoreScanError::Store)?
                .to_vec();
            visit(ScannedRecord { key, value }).map_err(EventStoreScanError::Visit)?;
            cursor.delete_current().map_err(EventStoreScanError::Store)?;
            found = cursor.next().map_err(EventStoreScanError::Store)?;
        }
        Ok(())
    }
}

/// Error produced by [`EventStore::scan_and_drain_user`]: either the store
/// itself failed, or the caller's visitor returned an error.
#[derive(Debug, thiserror::Error)]
pub enum EventStoreScanError<E> {
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The visitor callback failed.
    #[error(transparent)]
    Visit(E),
}
