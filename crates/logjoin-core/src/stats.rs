//! Delta-export counters for a [`crate::LogJoin`] instance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use logjoin_types::StatsSnapshot;

/// Counters for one `LogJoin` instance, exported with delta semantics.
///
/// Every field is an independent `AtomicU64`. [`Stats::drain`] reads and
/// resets each one with its own `swap`, so repeated snapshots sum to the
/// running total without double-counting. Held behind an `Arc` so a
/// [`crate::JoinTarget`] implementation (e.g.
/// [`crate::CountingJoinTarget`]) can share and increment it directly, per
/// the external contract's "`joined_queries`/`joined_item_visits` are
/// incremented by the JoinTarget."
#[derive(Debug, Default)]
pub struct Stats {
    loglines_total: AtomicU64,
    invalid_at_insert: AtomicU64,
    invalid_at_flush: AtomicU64,
    joined_sessions: AtomicU64,
    joined_queries: AtomicU64,
    joined_item_visits: AtomicU64,
}

impl Stats {
    /// A fresh, zeroed counter set behind an `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn record_logline(&self) {
        self.loglines_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_at_insert(&self) {
        self.invalid_at_insert.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_at_flush(&self) {
        self.invalid_at_flush.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_joined_session(&self) {
        self.joined_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the joined-queries counter. Called by a [`crate::JoinTarget`]
    /// while it walks a session's events.
    pub fn record_joined_query(&self) {
        self.joined_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the joined-item-visits counter. See
    /// [`Stats::record_joined_query`].
    pub fn record_joined_item_visit(&self) {
        self.joined_item_visits.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every counter and reset it to zero.
    pub fn drain(&self) -> StatsSnapshot {
        let invalid_at_insert = self.invalid_at_insert.swap(0, Ordering::AcqRel);
        let invalid_at_flush = self.invalid_at_flush.swap(0, Ordering::AcqRel);
        StatsSnapshot {
            loglines_total: self.loglines_total.swap(0, Ordering::AcqRel),
            loglines_invalid: invalid_at_insert + invalid_at_flush,
            invalid_at_insert,
            invalid_at_flush,
            joined_sessions: self.joined_sessions.swap(0, Ordering::AcqRel),
            joined_queries: self.joined_queries.swap(0, Ordering::AcqRel),
            joined_item_visits: self.joined_item_visits.swap(0, Ordering::AcqRel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_resets_every_counter_and_sums_invalid_breakdown() {
        let stats = Stats::new();
        stats.record_logline();
        stats.record_logline();
        stats.record_invalid_at_insert();
        stats.record_invalid_at_flush();
        stats.record_joined_session();
        stats.record_joined_query();
        stats.record_joined_item_visit();

        let snapshot = stats.drain();
        assert_eq!(snapshot.loglines_total, 2);
        assert_eq!(snapshot.invalid_at_insert, 1);
        assert_eq!(snapshot.invalid_at_flush, 1);
        assert_eq!(snapshot.loglines_invalid, 2);
        assert_eq!(snapshot.joined_sessions, 1);
        assert_eq!(snapshot.joined_queries, 1);
        assert_eq!(snapshot.joined_item_visits, 1);

        let second = stats.drain();
        assert_eq!(second.loglines_total, 0);
        assert_eq!(second.loglines_invalid, 0);
    }
}
