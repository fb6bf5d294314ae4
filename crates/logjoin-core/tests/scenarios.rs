//! End-to-end sessionizer scenarios against the in-memory store.

use std::sync::Arc;

use logjoin_codec::ParamCodec;
use logjoin_core::{CountingJoinTarget, LogJoin, Stats};
use logjoin_store_core::KvTransaction;
use logjoin_store_memory::MemoryStore;
use logjoin_types::{AcceptAllShard, HashRangeShard, ShardPredicate};

const IDLE_TIMEOUT_SECONDS: u64 = 1800;

fn new_logjoin() -> (LogJoin, Arc<Stats>) {
    let stats = Stats::new();
    let target = Box::new(CountingJoinTarget::new(Arc::clone(&stats)));
    let logjoin = LogJoin::new(
        ParamCodec::standard(),
        Box::new(AcceptAllShard),
        IDLE_TIMEOUT_SECONDS,
        target,
        false,
        Arc::clone(&stats),
    );
    (logjoin, stats)
}

fn envelope_count(txn: &mut dyn KvTransaction) -> usize {
    let mut cursor = txn.cursor().unwrap();
    let mut found = cursor.seek_first_or_greater(b"__sessionq-").unwrap();
    let mut count = 0;
    while found {
        if !cursor.current_key().unwrap().starts_with(b"__sessionq-") {
            break;
        }
        count += 1;
        found = cursor.next().unwrap();
    }
    count
}

#[test]
fn single_query_event_is_sessionized_once_the_idle_timeout_elapses() {
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin
            .insert_line("CUST1|1000|c=u1~e1&e=q&qstr~en=hello", &mut txn)
            .unwrap();
    }

    {
        let mut txn = store.transaction();
        logjoin.flush(&mut txn, 1_001 * 1_000_000).unwrap();
        assert_eq!(envelope_count(&mut txn), 0);
    }

    {
        let mut txn = store.transaction();
        logjoin.flush(&mut txn, (1000 + 1800) * 1_000_000 + 1).unwrap();
        assert_eq!(envelope_count(&mut txn), 1);
    }
}

#[test]
fn idle_extension_by_a_later_event_postpones_the_session() {
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin.insert_line("CUST1|1000|c=u1~e1&e=q", &mut txn).unwrap();
        logjoin.insert_line("CUST1|2500|c=u1~e2&e=v", &mut txn).unwrap();
    }

    {
        let mut txn = store.transaction();
        logjoin.flush(&mut txn, 2_801 * 1_000_000).unwrap();
        assert_eq!(envelope_count(&mut txn), 0);
    }

    {
        let mut txn = store.transaction();
        logjoin.flush(&mut txn, 4_301 * 1_000_000).unwrap();
        assert_eq!(envelope_count(&mut txn), 1);
    }
}

#[test]
fn two_users_are_flushed_independently() {
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin.insert_line("CUST1|1000|c=u1~e1&e=q", &mut txn).unwrap();
        logjoin.insert_line("CUST1|1500|c=u2~e1&e=q", &mut txn).unwrap();
    }

    {
        let mut txn = store.transaction();
        logjoin.flush(&mut txn, 2_801 * 1_000_000).unwrap();
        assert_eq!(envelope_count(&mut txn), 1);
    }
    assert_eq!(logjoin.tracked_user_count(), 1);

    {
        let mut txn = store.transaction();
        logjoin.flush(&mut txn, 3_301 * 1_000_000).unwrap();
        assert_eq!(envelope_count(&mut txn), 1);
    }
    assert_eq!(logjoin.tracked_user_count(), 0);
}

#[test]
fn a_malformed_line_missing_c_is_rejected_and_nothing_is_stored() {
    let (mut logjoin, stats) = new_logjoin();
    let store = MemoryStore::new();
    let mut txn = store.transaction();

    let result = logjoin.insert_line("CUST1|1000|e=q", &mut txn);
    assert!(result.is_err());

    let snapshot = stats.drain();
    assert_eq!(snapshot.loglines_total, 1);
    assert_eq!(snapshot.loglines_invalid, 1);
    assert_eq!(snapshot.invalid_at_insert, 1);
    assert!(store.is_empty());
    assert_eq!(logjoin.tracked_user_count(), 0);
}

#[test]
fn a_structurally_malformed_pipe_wrapper_still_counts_against_both_counters() {
    let (mut logjoin, stats) = new_logjoin();
    let store = MemoryStore::new();
    let mut txn = store.transaction();

    // No `|` separators at all: fails inside `parse_pipe_wrapper`, before
    // `insert` is ever reached.
    let result = logjoin.insert_line("garbage", &mut txn);
    assert!(result.is_err());

    let snapshot = stats.drain();
    assert_eq!(snapshot.loglines_total, 1);
    assert_eq!(snapshot.loglines_invalid, 1);
    assert_eq!(snapshot.invalid_at_insert, 1);
    assert!(store.is_empty());
    assert_eq!(logjoin.tracked_user_count(), 0);
}

#[test]
fn a_non_numeric_timestamp_field_still_counts_against_both_counters() {
    let (mut logjoin, stats) = new_logjoin();
    let store = MemoryStore::new();
    let mut txn = store.transaction();

    let result = logjoin.insert_line("CUST1|notanumber|c=u1~e1&e=q", &mut txn);
    assert!(result.is_err());

    let snapshot = stats.drain();
    assert_eq!(snapshot.loglines_total, 1);
    assert_eq!(snapshot.loglines_invalid, 1);
    assert_eq!(snapshot.invalid_at_insert, 1);
    assert!(store.is_empty());
    assert_eq!(logjoin.tracked_user_count(), 0);
}

#[test]
fn a_shard_miss_is_dropped_silently() {
    let stats = Stats::new();
    let target = Box::new(CountingJoinTarget::new(Arc::clone(&stats)));
    // A single-bucket-out-of-two shard that this uid will not hash into
    // for at least one of the two indices; pick whichever index rejects it.
    let shard_rejecting_u3: Box<dyn ShardPredicate> = {
        let candidate = HashRangeShard::new(2, 0);
        if candidate.accepts("u3") {
            Box::new(HashRangeShard::new(2, 1))
        } else {
            Box::new(candidate)
        }
    };
    let mut logjoin =
        LogJoin::new(ParamCodec::standard(), shard_rejecting_u3, IDLE_TIMEOUT_SECONDS, target, false, Arc::clone(&stats));
    let store = MemoryStore::new();
    let mut txn = store.transaction();

    logjoin.insert_line("CUST1|1000|c=u3~e1&e=q", &mut txn).unwrap();

    let snapshot = stats.drain();
    assert_eq!(snapshot.loglines_total, 1);
    assert_eq!(snapshot.loglines_invalid, 0);
    assert!(store.is_empty());
    assert_eq!(logjoin.tracked_user_count(), 0);
}

#[test]
fn bootstrap_rebuilds_deadlines_from_persisted_events() {
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin.insert_line("CUST1|1000|c=u1~e1&e=q", &mut txn).unwrap();
        logjoin.insert_line("CUST1|2500|c=u1~e2&e=v", &mut txn).unwrap();
    }

    let (mut fresh_logjoin, _fresh_stats) = new_logjoin();
    {
        let mut txn = store.transaction();
        fresh_logjoin.import_timeout_list(&mut txn).unwrap();
    }

    assert_eq!(fresh_logjoin.tracked_user_count(), 1);

    {
        let mut txn = store.transaction();
        fresh_logjoin.flush(&mut txn, (2500 + 1800) * 1_000_000).unwrap();
        assert_eq!(envelope_count(&mut txn), 0);
    }
    {
        let mut txn = store.transaction();
        fresh_logjoin.flush(&mut txn, (2500 + 1800) * 1_000_000 + 1).unwrap();
        assert_eq!(envelope_count(&mut txn), 1);
    }
}

#[test]
fn scan_and_drain_leaves_no_keys_for_the_flushed_user() {
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin.insert_line("CUST1|1000|c=u1~e1&e=q", &mut txn).unwrap();
        logjoin.insert_line("CUST1|1000|c=u1~e2&e=v", &mut txn).unwrap();
    }

    let mut txn = store.transaction();
    logjoin.flush_session("u1", (1000 + 1800) * 1_000_000 + 1, &mut txn).unwrap();

    let mut cursor = txn.cursor().unwrap();
    let found = cursor.seek_first_or_greater(b"u1").unwrap();
    if found {
        assert!(!cursor.current_key().unwrap().starts_with(b"u1~"));
    }
}

#[test]
fn dry_run_deletes_events_but_writes_no_envelope() {
    let stats = Stats::new();
    let target = Box::new(CountingJoinTarget::new(Arc::clone(&stats)));
    let mut logjoin = LogJoin::new(
        ParamCodec::standard(),
        Box::new(AcceptAllShard),
        IDLE_TIMEOUT_SECONDS,
        target,
        true,
        Arc::clone(&stats),
    );
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin.insert_line("CUST1|1000|c=u1~e1&e=q", &mut txn).unwrap();
    }

    let mut txn = store.transaction();
    logjoin.flush(&mut txn, (1000 + 1800) * 1_000_000 + 1).unwrap();
    assert_eq!(envelope_count(&mut txn), 0);
    drop(txn);
    assert!(store.is_empty());
}

#[test]
fn flushing_a_uid_that_is_a_byte_prefix_of_another_uid_leaves_the_other_intact() {
    // "u1" is a byte-prefix of "u10"; since `~` sorts above every decimal
    // digit, "u10"'s records sort *before* "u1"'s own records. A scan that
    // matched on bare `uid` bytes instead of the `"<uid>~"` prefix would
    // sweep up and delete "u10"'s records while flushing "u1".
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    {
        let mut txn = store.transaction();
        logjoin.insert_line("CUST1|1000|c=u1~e1&e=q", &mut txn).unwrap();
        logjoin.insert_line("CUST1|1000|c=u10~e1&e=q", &mut txn).unwrap();
    }

    let mut txn = store.transaction();
    logjoin.flush_session("u1", (1000 + 1800) * 1_000_000 + 1, &mut txn).unwrap();
    assert_eq!(envelope_count(&mut txn), 1);

    let mut cursor = txn.cursor().unwrap();
    let mut found = cursor.seek_first_or_greater(b"u10~").unwrap();
    let mut remaining = 0;
    while found {
        if !cursor.current_key().unwrap().starts_with(b"u10~") {
            break;
        }
        remaining += 1;
        found = cursor.next().unwrap();
    }
    assert_eq!(remaining, 2, "u10's event and customer-key records must survive flushing u1");
}

proptest::proptest! {
    #[test]
    fn shard_miss_is_a_no_op_on_the_store_and_deadlines_for_any_time_and_body(
        time_s in 0u64..2_000_000_000,
        eid in "[a-zA-Z0-9_-]{1,16}",
        qstr in "[a-zA-Z0-9 ]{0,32}",
    ) {
        let stats = Stats::new();
        let target = Box::new(CountingJoinTarget::new(Arc::clone(&stats)));
        let shard_rejecting_u3: Box<dyn ShardPredicate> = {
            let candidate = HashRangeShard::new(2, 0);
            if candidate.accepts("u3") {
                Box::new(HashRangeShard::new(2, 1))
            } else {
                Box::new(candidate)
            }
        };
        let mut logjoin = LogJoin::new(
            ParamCodec::standard(),
            shard_rejecting_u3,
            IDLE_TIMEOUT_SECONDS,
            target,
            false,
            Arc::clone(&stats),
        );
        let store = MemoryStore::new();
        let mut txn = store.transaction();

        let body = format!("c=u3~{eid}&e=q&qstr={qstr}");
        logjoin.insert("CUST1", time_s, &body, &mut txn).unwrap();

        let snapshot = stats.drain();
        proptest::prop_assert_eq!(snapshot.loglines_total, 1);
        proptest::prop_assert_eq!(snapshot.loglines_invalid, 0);
        proptest::prop_assert!(store.is_empty());
        proptest::prop_assert_eq!(logjoin.tracked_user_count(), 0);
    }
}

#[test]
fn missing_customer_key_drops_the_session_without_queuing_an_envelope() {
    let (mut logjoin, _stats) = new_logjoin();
    let store = MemoryStore::new();

    // Write an event record directly, bypassing `insert`, so no `~cust`
    // record is ever written.
    {
        use logjoin_store_core::EventStore;
        let mut txn = store.transaction();
        let record = logjoin_codec::encode_event_by_id(1000, "e1", &[]);
        EventStore::append_event(&mut txn, "u1", logjoin_types::EventKind::Query, &record).unwrap();
    }

    let mut txn = store.transaction();
    logjoin.flush_session("u1", 0, &mut txn).unwrap();
    assert_eq!(envelope_count(&mut txn), 0);
}
