use logjoin_types::{DecodedEvent, EventKind, SessionEnvelope, StatsSnapshot, TrackedSession};

#[test]
fn test_session_envelope_serde_roundtrip() {
    let original = SessionEnvelope {
        customer: "CUST1".into(),
        session_id: "u1".into(),
        time: 1_700_000_000_000_000,
        session_data: vec![1, 2, 3],
    };

    let json = serde_json::to_string(&original).expect("serialization failed");
    let decoded: SessionEnvelope = serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(original, decoded);
}

#[test]
fn test_tracked_session_serde_roundtrip() {
    let mut original = TrackedSession::new("u1");
    original.customer = Some("CUST1".into());
    original.events.push(DecodedEvent {
        time_s: 1_000,
        kind: EventKind::Query,
        eid: "e1".into(),
        params: vec![(1, b"hello".to_vec())],
    });

    let json = serde_json::to_string(&original).expect("serialization failed");
    let decoded: TrackedSession = serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(original, decoded);
}

#[test]
fn test_stats_snapshot_serde_roundtrip() {
    let original = StatsSnapshot {
        loglines_total: 10,
        loglines_invalid: 2,
        invalid_at_insert: 1,
        invalid_at_flush: 1,
        joined_sessions: 3,
        joined_queries: 2,
        joined_item_visits: 1,
    };

    let json = serde_json::to_string(&original).expect("serialization failed");
    let decoded: StatsSnapshot = serde_json::from_str(&json).expect("deserialization failed");

    assert_eq!(original, decoded);
}
