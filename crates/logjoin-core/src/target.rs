//! The `JoinTarget` external contract and a minimal reference
//! implementation.

use std::sync::Arc;

use logjoin_codec::encode_event_by_id;
use logjoin_types::{EventKind, TrackedSession};

use crate::stats::Stats;

/// Consumes a finalized session and produces an opaque payload to carry in
/// the output envelope.
///
/// Implementations may examine every event and must tolerate duplicate or
/// out-of-order timestamps — `LogJoin` makes no ordering guarantee within a
/// session.
pub trait JoinTarget: Send + Sync {
    /// Join `session` into an opaque byte blob, or fail.
    fn join(
        &self,
        session: &TrackedSession,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>;
}

/// A minimal reference [`JoinTarget`]: re-serializes every event back out
/// through the event-record codec into one self-describing blob (an event
/// count followed by each event's own encoded record), and increments
/// `joined_queries`/`joined_item_visits` as it walks the session.
pub struct CountingJoinTarget {
    stats: Arc<Stats>,
}

impl CountingJoinTarget {
    /// Build a target that increments `stats` while joining each session.
    pub fn new(stats: Arc<Stats>) -> Self {
        Self { stats }
    }
}

impl JoinTarget for CountingJoinTarget {
    fn join(
        &self,
        session: &TrackedSession,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>> {
        let mut out = Vec::new();
        logjoin_codec::write_u64(&mut out, session.events.len() as u64);
        for event in &session.events {
            match event.kind {
                EventKind::Query => self.stats.record_joined_query(),
                EventKind::View => self.stats.record_joined_item_visit(),
                EventKind::Click | EventKind::UserUpdate => {}
            }
            let record = encode_event_by_id(event.time_s, &event.eid, &event.params);
            logjoin_codec::write_u64(&mut out, record.len() as u64);
            out.extend_from_slice(&record);
        }
        Ok(out)
    }
}
