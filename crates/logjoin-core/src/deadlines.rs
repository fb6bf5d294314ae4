//! In-memory uid → flush-deadline tracking.

use std::collections::HashMap;

/// Mapping from uid to a deadline expressed in microseconds since the Unix
/// epoch, monotonically advanced as events arrive.
#[derive(Debug, Default)]
pub struct DeadlineIndex {
    deadlines: HashMap<String, i64>,
}

impl DeadlineIndex {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance `uid`'s deadline to `max(existing, deadline_micros)`. Never
    /// decreases a deadline already on record.
    pub fn touch(&mut self, uid: &str, deadline_micros: i64) {
        self.deadlines
            .entry(uid.to_string())
            .and_modify(|current| *current = (*current).max(deadline_micros))
            .or_insert(deadline_micros);
    }

    /// uids whose deadline has elapsed as of `stream_time_micros`, in no
    /// particular order. Does not remove anything — the flush driver
    /// removes each uid explicitly once its session has been processed, so
    /// a session that fails mid-flush is not silently forgotten.
    pub fn due_uids(&self, stream_time_micros: i64) -> Vec<String> {
        self.deadlines
            .iter()
            .filter(|(_, &deadline)| deadline < stream_time_micros)
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// Remove `uid`'s deadline entry, if any.
    pub fn remove(&mut self, uid: &str) {
        self.deadlines.remove(uid);
    }

    /// The deadline currently recorded for `uid`, if any.
    pub fn get(&self, uid: &str) -> Option<i64> {
        self.deadlines.get(uid).copied()
    }

    /// Number of uids with a live deadline.
    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    /// True if no uid currently has a tracked deadline.
    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
