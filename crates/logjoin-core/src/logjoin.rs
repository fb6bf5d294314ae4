//! The `LogJoin` orchestrator: `insert`, `flush`, `flush_session`, and
//! `import_timeout_list`.

use std::sync::Arc;

use logjoin_codec::{decode_event_by_id, read_u64, ParamCodec};
use logjoin_config::LogJoinConfig;
use logjoin_store_core::{keys, EventStore, EventStoreScanError, KvTransaction};
use logjoin_types::{
    micros_to_datetime, AcceptAllShard, DecodedEvent, EventKind, HashRangeShard, SessionEnvelope,
    ShardPredicate, TrackedSession, CUSTOMER_KEY_SUFFIX, RESERVED_KEY_PREFIX,
    SESSION_EVENT_WARN_COUNT,
};
use tracing::{debug, error, trace, warn};

use crate::deadlines::DeadlineIndex;
use crate::error::LogJoinError;
use crate::query::{parse_pipe_wrapper, parse_query_string};
use crate::stats::Stats;
use crate::target::JoinTarget;

/// Shard-routed, transactionally buffered pixel-log sessionizer.
///
/// Holds no internal synchronization primitives. Per the concurrency
/// model, one driver thread owns an instance; a caller feeding it from
/// multiple producers must serialize access externally (e.g. behind a
/// `Mutex<LogJoin>`).
pub struct LogJoin {
    codec: ParamCodec,
    shard: Box<dyn ShardPredicate>,
    idle_timeout_seconds: u64,
    join_target: Box<dyn JoinTarget>,
    dry_run: bool,
    deadlines: DeadlineIndex,
    stats: Arc<Stats>,
}

impl LogJoin {
    /// Build a `LogJoin` from its collaborators.
    ///
    /// `stats` is shared via `Arc` so a [`JoinTarget`] implementation (e.g.
    /// [`crate::CountingJoinTarget`]) can increment `joined_queries` /
    /// `joined_item_visits` itself, per the external contract.
    pub fn new(
        codec: ParamCodec,
        shard: Box<dyn ShardPredicate>,
        idle_timeout_seconds: u64,
        join_target: Box<dyn JoinTarget>,
        dry_run: bool,
        stats: Arc<Stats>,
    ) -> Self {
        Self {
            codec,
            shard,
            idle_timeout_seconds,
            join_target,
            dry_run,
            deadlines: DeadlineIndex::new(),
            stats,
        }
    }

    /// Build a `LogJoin` from a validated [`LogJoinConfig`]: registers
    /// `extra_params` alongside the standard dictionary, and selects
    /// `AcceptAllShard` for a single-shard deployment or `HashRangeShard`
    /// otherwise.
    pub fn from_config(
        config: &LogJoinConfig,
        join_target: Box<dyn JoinTarget>,
        stats: Arc<Stats>,
    ) -> Self {
        let codec = ParamCodec::standard_with_extras(&config.extra_params);
        let shard: Box<dyn ShardPredicate> = if config.shard_count <= 1 {
            Box::new(AcceptAllShard)
        } else {
            Box::new(HashRangeShard::new(config.shard_count, config.shard_index))
        };
        Self::new(codec, shard, config.idle_timeout_seconds, join_target, config.dry_run, stats)
    }

    /// The shared counter set for this instance.
    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Number of uids with a currently live deadline.
    pub fn tracked_user_count(&self) -> usize {
        self.deadlines.len()
    }

    /// Parse the pipe-delimited wrapper `"<customer>|<unix_seconds>|<body>"`
    /// and delegate to [`LogJoin::insert`].
    pub fn insert_line(
        &mut self,
        raw_line: &str,
        txn: &mut dyn KvTransaction,
    ) -> Result<(), LogJoinError> {
        let (customer_key, time_s, body) = match parse_pipe_wrapper(raw_line) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.stats.record_logline();
                self.stats.record_invalid_at_insert();
                return Err(err);
            }
        };
        self.insert(&customer_key, time_s, &body, txn)
    }

    /// Decode, validate, shard-route, and append one pixel log event.
    pub fn insert(
        &mut self,
        customer_key: &str,
        time_s: u64,
        body: &str,
        txn: &mut dyn KvTransaction,
    ) -> Result<(), LogJoinError> {
        self.stats.record_logline();
        let result = self.insert_inner(customer_key, time_s, body, txn);
        if let Err(LogJoinError::Parse(_)) = &result {
            self.stats.record_invalid_at_insert();
        }
        result
    }

    fn insert_inner(
        &mut self,
        customer_key: &str,
        time_s: u64,
        body: &str,
        txn: &mut dyn KvTransaction,
    ) -> Result<(), LogJoinError> {
        let pairs = parse_query_string(body)?;

        let c_value = pairs
            .iter()
            .find(|(k, _)| k == "c")
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| LogJoinError::Parse("missing required parameter 'c'".into()))?;
        let (uid, eid) = split_uid_eid(c_value)?;

        if !self.shard.accepts(uid) {
            trace!(uid, "dropping event: uid not accepted by this shard");
            return Ok(());
        }

        let e_value = pairs
            .iter()
            .find(|(k, _)| k == "e")
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| LogJoinError::Parse("missing required parameter 'e'".into()))?;
        let kind = parse_event_kind(e_value)?;

        let stored_params: Vec<(String, Vec<u8>)> = pairs
            .iter()
            .filter(|(k, _)| k != "c" && k != "e" && k != "v")
            .map(|(k, v)| (k.clone(), v.clone().into_bytes()))
            .collect();

        let deadline_micros = (time_s as i64 + self.idle_timeout_seconds as i64) * 1_000_000;
        self.deadlines.touch(uid, deadline_micros);

        let record = self.codec.encode_event(time_s, eid, &stored_params)?;
        EventStore::append_event(txn, uid, kind, &record)?;
        EventStore::set_customer_key(txn, uid, customer_key)?;

        Ok(())
    }

    /// Evict every user whose deadline has elapsed as of
    /// `stream_time_micros`, in unspecified order.
    pub fn flush(
        &mut self,
        txn: &mut dyn KvTransaction,
        stream_time_micros: i64,
    ) -> Result<(), LogJoinError> {
        for uid in self.deadlines.due_uids(stream_time_micros) {
            self.flush_session(&uid, stream_time_micros, txn)?;
            self.deadlines.remove(&uid);
        }
        Ok(())
    }

    /// Reconstruct, join, and enqueue one user's session, deleting its
    /// source event records in the same pass.
    pub fn flush_session(
        &mut self,
        uid: &str,
        _stream_time_micros: i64,
        txn: &mut dyn KvTransaction,
    ) -> Result<(), LogJoinError> {
        let mut session = TrackedSession::new(uid);
        let stats = Arc::clone(&self.stats);
        let codec = &self.codec;

        let scan = EventStore::scan_and_drain_user(txn, uid, |record| {
            if keys::is_customer_key(&record.key, uid) {
                session.customer = Some(String::from_utf8_lossy(&record.value).into_owned());
                return Ok::<(), std::convert::Infallible>(());
            }
            let Some(kind_char) = keys::event_kind_char(&record.key, uid) else {
                return Ok(());
            };
            let Some(kind) = EventKind::from_char(kind_char) else {
                return Ok(());
            };
            match decode_event_by_id(&record.value) {
                Ok(fields) => {
                    let unknown_id = fields
                        .params
                        .iter()
                        .find_map(|(id, _)| codec.dictionary().name_of(*id).err().map(|_| *id));
                    if let Some(unknown) = unknown_id {
                        warn!(uid, param_id = unknown, "dropping event with an unregistered parameter id");
                        stats.record_invalid_at_flush();
                    } else {
                        session.events.push(DecodedEvent {
                            time_s: fields.time_s,
                            kind,
                            eid: fields.eid,
                            params: fields.params,
                        });
                    }
                }
                Err(err) => {
                    warn!(uid, error = %err, "dropping event that failed to decode during flush");
                    stats.record_invalid_at_flush();
                }
            }
            Ok(())
        });

        match scan {
            Ok(()) => {}
            Err(EventStoreScanError::Store(err)) => return Err(LogJoinError::Store(err)),
            Err(EventStoreScanError::Visit(infallible)) => match infallible {},
        }

        if session.events.len() >= SESSION_EVENT_WARN_COUNT {
            warn!(
                uid,
                event_count = session.events.len(),
                "session crossed the event-count warning threshold; still processing to completion"
            );
        }

        let Some(customer) = session.customer.clone() else {
            let err = LogJoinError::MissingCustomerKey { uid: uid.to_string() };
            let first_seen = session.first_seen_micros().map(micros_to_datetime);
            error!(uid, %err, first_seen = ?first_seen, "session dropped");
            return Ok(());
        };

        let Some(first_seen_micros) = session.first_seen_micros() else {
            debug!(uid, "session has a customer key but no events; dropping silently");
            return Ok(());
        };

        let session_data = match self.join_target.join(&session) {
            Ok(bytes) => bytes,
            Err(source) => {
                let err = LogJoinError::JoinTarget { uid: uid.to_string(), source };
                let first_seen = micros_to_datetime(first_seen_micros);
                error!(uid, session = ?session, %err, %first_seen, "session dropped");
                return Ok(());
            }
        };

        self.stats.record_joined_session();

        if self.dry_run {
            debug!(uid, "dry run: envelope computed but not written");
            return Ok(());
        }

        let envelope =
            SessionEnvelope { customer, session_id: uid.to_string(), time: first_seen_micros, session_data };
        let envelope_bytes = rmp_serde::to_vec(&envelope).map_err(|e| {
            LogJoinError::Parse(format!("failed to serialize session envelope: {e}"))
        })?;
        EventStore::enqueue_session(txn, &envelope_bytes)?;

        Ok(())
    }

    /// Bootstrap: rebuild `deadlines` by scanning every persisted event
    /// record. Must complete before the first `insert` call.
    pub fn import_timeout_list(&mut self, txn: &mut dyn KvTransaction) -> Result<(), LogJoinError> {
        let mut cursor = txn.cursor()?;
        let mut found = cursor.seek_first_or_greater(&[])?;
        while found {
            let key = cursor.current_key().expect("cursor positioned on a key").to_vec();
            let is_reserved = key.starts_with(RESERVED_KEY_PREFIX.as_bytes());
            let is_customer_record = key.ends_with(CUSTOMER_KEY_SUFFIX.as_bytes());
            if !is_reserved && !is_customer_record {
                if let Some(tilde) = key.iter().position(|&b| b == b'~') {
                    let uid = String::from_utf8_lossy(&key[..tilde]).into_owned();
                    let value = cursor.current_value().expect("cursor positioned on a value");
                    let mut pos = 0usize;
                    if let Ok(time_s) = read_u64(value, &mut pos) {
                        let deadline_micros =
                            (time_s as i64 + self.idle_timeout_seconds as i64) * 1_000_000;
                        self.deadlines.touch(&uid, deadline_micros);
                    }
                }
            }
            found = cursor.next()?;
        }
        Ok(())
    }
}

fn split_uid_eid(c_value: &str) -> Result<(&str, &str), LogJoinError> {
    let tilde = c_value.find('~').ok_or_else(|| {
        LogJoinError::Parse(format!("parameter 'c' is missing its '~' separator: {c_value:?}"))
    })?;
    let (uid, rest) = c_value.split_at(tilde);
    let eid = &rest[1..];
    if uid.is_empty() || eid.is_empty() {
        return Err(LogJoinError::Parse("uid and eid in 'c' must both be non-empty".into()));
    }
    if eid.contains('~') {
        return Err(LogJoinError::Parse(format!("eid must not contain '~': {eid:?}")));
    }
    Ok((uid, eid))
}

fn parse_event_kind(e_value: &str) -> Result<EventKind, LogJoinError> {
    let mut chars = e_value.chars();
    let Some(c) = chars.next() else {
        return Err(LogJoinError::Parse("parameter 'e' is empty".into()));
    };
    if chars.next().is_some() {
        return Err(LogJoinError::Parse(format!(
            "parameter 'e' must be exactly one character: {e_value:?}"
        )));
    }
    EventKind::from_char(c).ok_or_else(|| LogJoinError::Parse(format!("unrecognized event type {c:?}")))
}
