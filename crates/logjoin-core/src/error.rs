//! The error kinds a [`crate::LogJoin`] instance can surface, per the
//! trigger/policy table: some are raised to the caller, others are only
//! logged and counted internally and never escape a public method.

use thiserror::Error;

use logjoin_codec::CodecError;
use logjoin_store_core::StoreError;

/// Errors a [`crate::LogJoin`] instance can encounter.
#[derive(Debug, Error)]
pub enum LogJoinError {
    /// A malformed pipe-wrapper, missing/invalid `c`/`e`, or disallowed
    /// event type. Raised to the caller; the event is not stored.
    #[error("malformed log line: {0}")]
    Parse(String),

    /// An unknown parameter name was used while encoding an event. Raised
    /// to the caller — per §4.2, the dictionary is fixed at construction,
    /// so this is a programmer error, not a recoverable runtime condition.
    #[error(transparent)]
    Index(#[from] CodecError),

    /// The underlying key-value store failed. Raised to the caller; the
    /// caller's transaction is expected to abort.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A [`crate::JoinTarget`] failed while joining a session.
    ///
    /// Never returned from a public `LogJoin` method: `flush_session` logs
    /// this and drops the session instead of propagating it, so one bad
    /// session does not abort an entire `flush`. Constructed purely to
    /// reuse its `Display` impl at the log site.
    #[error("join target failed for session {uid}: {source}")]
    JoinTarget {
        /// The uid whose session failed to join.
        uid: String,
        /// The underlying failure reported by the target.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No `~cust` record was found for a session at flush time.
    ///
    /// Never returned from a public `LogJoin` method, for the same reason
    /// as [`LogJoinError::JoinTarget`].
    #[error("no customer key recorded for session {uid}")]
    MissingCustomerKey {
        /// The uid missing a customer-key record.
        uid: String,
    },
}
