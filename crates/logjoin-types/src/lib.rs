#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-types** – Shared primitive data structures for the LogJoin
//! sessionizer.
//!
//! The crate is dependency-light and sits at the bottom of the crate graph
//! so that every other `logjoin-*` crate can depend on it without causing
//! cycles. It makes no assumptions about storage, codecs, or I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//─────────────────────────────
//  Constants
//─────────────────────────────

/// Default idle timeout, in seconds, after which a quiescent user's session
/// is finalized. Mirrors `kSessionIdleTimeoutSeconds` in the source system.
pub const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 1800;

/// Byte prefix that marks a key as internal to the store (output queue,
/// bookkeeping). Bootstrap scans must skip keys beginning with this prefix.
pub const RESERVED_KEY_PREFIX: &str = "__";

/// Key prefix under which finalized session envelopes are enqueued for
/// downstream pickup.
pub const SESSION_QUEUE_PREFIX: &str = "__sessionq-";

/// Suffix appended to a uid to form the customer-key record's key.
pub const CUSTOMER_KEY_SUFFIX: &str = "~cust";

/// Key-space separator between a uid and the remainder of an event or
/// customer-key record's key. Also forbidden inside a raw `uid`/`eid`.
pub const KEY_SEPARATOR: u8 = b'~';

/// A session whose event count crosses this mark is still processed to
/// completion, but logs a warning — guards against one pathological user
/// silently ballooning a single flush transaction.
pub const SESSION_EVENT_WARN_COUNT: usize = 100_000;

//─────────────────────────────
//  Pixel parameter identifiers
//─────────────────────────────

/// Small integer identifying a registered pixel parameter name.
pub type ParamId = u16;

/// Lowest id reserved for the common pixel fields (1–25).
pub const COMMON_PARAM_ID_MIN: ParamId = 1;
/// Highest id reserved for the common pixel fields (1–25).
pub const COMMON_PARAM_ID_MAX: ParamId = 25;
/// Lowest id reserved for localized query-string variants (100–106).
pub const LOCALIZED_PARAM_ID_MIN: ParamId = 100;
/// Highest id reserved for localized query-string variants (100–106).
pub const LOCALIZED_PARAM_ID_MAX: ParamId = 106;

//─────────────────────────────
//  Event kind
//─────────────────────────────

/// The single-character event type carried in the `e` pixel parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `q` — a search/browse query.
    Query,
    /// `v` — an item view.
    View,
    /// `c` — a click.
    Click,
    /// `u` — a user-attribute update.
    UserUpdate,
}

impl EventKind {
    /// The wire character for this event kind, as it appears in the `e`
    /// pixel parameter and as the middle segment of an event record key.
    pub fn as_char(self) -> char {
        match self {
            Self::Query => 'q',
            Self::View => 'v',
            Self::Click => 'c',
            Self::UserUpdate => 'u',
        }
    }

    /// Parse a wire character into an [`EventKind`]. Returns `None` for any
    /// character outside `{q, v, c, u}`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'q' => Some(Self::Query),
            'v' => Some(Self::View),
            'c' => Some(Self::Click),
            'u' => Some(Self::UserUpdate),
            _ => None,
        }
    }
}

//─────────────────────────────
//  Decoded event
//─────────────────────────────

/// A single decoded pixel event, as reconstructed from its stored record.
///
/// Ordering between events of the same user is not guaranteed; a
/// [`crate::JoinTarget`]-style consumer must tolerate duplicate or
/// out-of-order timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedEvent {
    /// Event timestamp, whole seconds since the Unix epoch.
    pub time_s: u64,
    /// Event type.
    pub kind: EventKind,
    /// Event id, nominally unique within the user.
    pub eid: String,
    /// Pixel parameters attached to the event, keyed by registered id.
    pub params: Vec<(ParamId, Vec<u8>)>,
}

//─────────────────────────────
//  Tracked session
//─────────────────────────────

/// The in-memory reconstruction of one user's session, built by scanning
/// that user's event records out of the store at flush time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedSession {
    /// The user id this session belongs to.
    pub uid: String,
    /// The customer key recorded alongside the user's events, if any.
    pub customer: Option<String>,
    /// Decoded events for this user, in scan order (not necessarily
    /// chronological).
    pub events: Vec<DecodedEvent>,
}

impl TrackedSession {
    /// Create an empty session for `uid`.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            customer: None,
            events: Vec::new(),
        }
    }

    /// The first-seen time for this session: the minimum event timestamp,
    /// expressed as microseconds since the Unix epoch. `None` for a session
    /// with no events.
    pub fn first_seen_micros(&self) -> Option<u64> {
        self.events.iter().map(|e| e.time_s).min().map(|s| s * 1_000_000)
    }
}

//─────────────────────────────
//  Output envelope
//─────────────────────────────

/// Serialized output record enqueued under the
/// [`SESSION_QUEUE_PREFIX`] once a session has been finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnvelope {
    /// Customer key recorded for this user.
    pub customer: String,
    /// The session's user id (the original spec calls this `session_id`).
    pub session_id: String,
    /// First-seen time, microseconds since the Unix epoch.
    pub time: u64,
    /// Opaque, join-target-produced session payload.
    pub session_data: Vec<u8>,
}

//─────────────────────────────
//  Shard predicate
//─────────────────────────────

/// Deterministic test deciding whether a `uid` belongs to this instance.
///
/// Implementations partition the uid space; the core silently drops any
/// event whose uid is not accepted — this is not an error and increments
/// no counter.
pub trait ShardPredicate: Send + Sync {
    /// Returns `true` if `uid` belongs to this shard.
    fn accepts(&self, uid: &str) -> bool;
}

/// A [`ShardPredicate`] that accepts every uid. Useful for a single-shard
/// deployment or for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllShard;

impl ShardPredicate for AcceptAllShard {
    fn accepts(&self, _uid: &str) -> bool {
        true
    }
}

/// A [`ShardPredicate`] that partitions uids by a fixed-seed FNV-1a hash
/// modulo `shard_count`, accepting only those that land on `shard_index`.
#[derive(Debug, Clone, Copy)]
pub struct HashRangeShard {
    shard_count: u32,
    shard_index: u32,
}

impl HashRangeShard {
    /// Create a shard predicate for `shard_index` out of `shard_count`
    /// total shards. Panics if `shard_count` is zero or `shard_index` is
    /// not less than `shard_count` — both are construction-time
    /// programmer errors.
    pub fn new(shard_count: u32, shard_index: u32) -> Self {
        assert!(shard_count > 0, "shard_count must be non-zero");
        assert!(
            shard_index < shard_count,
            "shard_index {shard_index} must be < shard_count {shard_count}"
        );
        Self { shard_count, shard_index }
    }

    /// Fixed-seed FNV-1a hash of `uid`, used for shard assignment.
    fn hash(uid: &str) -> u64 {
        const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
        const PRIME: u64 = 0x100000001b3;
        let mut hash = OFFSET_BASIS;
        for byte in uid.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(PRIME);
        }
        hash
    }
}

impl ShardPredicate for HashRangeShard {
    fn accepts(&self, uid: &str) -> bool {
        (Self::hash(uid) % u64::from(self.shard_count)) == u64::from(self.shard_index)
    }
}

//─────────────────────────────
//  Stats snapshot
//─────────────────────────────

/// A point-in-time, delta-export snapshot of the core's counters.
///
/// See `logjoin_core::Stats::drain` for how this is produced: each field is
/// reset to zero as it is read, so repeated snapshots sum to the running
/// total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Total log lines accepted for processing (before shard filtering).
    pub loglines_total: u64,
    /// Log lines rejected for any reason (parse failure at insert, or
    /// decode failure at flush). Equal to `invalid_at_insert +
    /// invalid_at_flush`.
    pub loglines_invalid: u64,
    /// `loglines_invalid` attributable to a malformed `insert` call.
    pub invalid_at_insert: u64,
    /// `loglines_invalid` attributable to a single event failing to decode
    /// during `flush_session`.
    pub invalid_at_flush: u64,
    /// Sessions successfully joined and enqueued.
    pub joined_sessions: u64,
    /// Query events observed by a join target, summed across sessions.
    pub joined_queries: u64,
    /// Item-view events observed by a join target, summed across sessions.
    pub joined_item_visits: u64,
}

//─────────────────────────────
//  Envelope timestamp helper
//─────────────────────────────

/// Convert microseconds-since-epoch into a [`DateTime<Utc>`] for logging
/// and debugging purposes.
pub fn micros_to_datetime(micros: u64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(
        (micros / 1_000_000) as i64,
        ((micros % 1_000_000) * 1_000) as u32,
    )
    .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable"))
}
