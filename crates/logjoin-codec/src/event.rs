//! Binary event record encoding: `encode_event` / `decode_event`.
//!
//! Wire format (varint-packed, per `spec.md` §3):
//!
//! 1. event timestamp in whole seconds (varint)
//! 2. event-id length (varint), event-id bytes
//! 3. zero or more `(param-id varint, value-length varint, value bytes)`
//!    triples until end of buffer

use logjoin_types::ParamId;

use crate::dictionary::CodecError;
use crate::varint::{read_u64, write_u64, VarintError};

impl From<VarintError> for CodecError {
    fn from(err: VarintError) -> Self {
        CodecError::MalformedRecord(err.to_string())
    }
}

/// The decoded fields of an event record, prior to the event's `kind`
/// (which is not part of the record value — it comes from the record's
/// key — and is attached separately by the caller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFields {
    /// Event timestamp, whole seconds since the Unix epoch.
    pub time_s: u64,
    /// Event id.
    pub eid: String,
    /// Parameter id → raw value bytes, in encounter order.
    pub params: Vec<(ParamId, Vec<u8>)>,
}

/// Encode `time_s`, `eid`, and `params` into the binary event record format.
pub fn encode_event(time_s: u64, eid: &str, params: &[(ParamId, Vec<u8>)]) -> Vec<u8> {
    let mut out = Vec::new();
    write_u64(&mut out, time_s);
    write_u64(&mut out, eid.len() as u64);
    out.extend_from_slice(eid.as_bytes());
    for (param_id, value) in params {
        write_u64(&mut out, u64::from(*param_id));
        write_u64(&mut out, value.len() as u64);
        out.extend_from_slice(value);
    }
    out
}

/// Decode a binary event record produced by [`encode_event`].
pub fn decode_event(bytes: &[u8]) -> Result<EventFields, CodecError> {
    let mut pos = 0usize;
    let time_s = read_u64(bytes, &mut pos)?;

    let eid_len = read_u64(bytes, &mut pos)? as usize;
    let eid_bytes = bytes
        .get(pos..pos + eid_len)
        .ok_or_else(|| CodecError::MalformedRecord("event id runs past end of record".into()))?;
    let eid = String::from_utf8(eid_bytes.to_vec())
        .map_err(|e| CodecError::MalformedRecord(format!("event id is not valid utf-8: {e}")))?;
    pos += eid_len;

    let mut params = Vec::new();
    while pos < bytes.len() {
        let param_id = read_u64(bytes, &mut pos)?;
        let param_id: ParamId = param_id
            .try_into()
            .map_err(|_| CodecError::MalformedRecord(format!("param id {param_id} out of range")))?;
        let value_len = read_u64(bytes, &mut pos)? as usize;
        let value = bytes
            .get(pos..pos + value_len)
            .ok_or_else(|| CodecError::MalformedRecord("param value runs past end of record".into()))?
            .to_vec();
        pos += value_len;
        params.push((param_id, value));
    }

    Ok(EventFields { time_s, eid, params })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_event_with_no_params() {
        let encoded = encode_event(1_000, "e1", &[]);
        let decoded = decode_event(&encoded).unwrap();
        assert_eq!(decoded, EventFields { time_s: 1_000, eid: "e1".into(), params: vec![] });
    }

    #[test]
    fn round_trips_an_event_with_several_params() {
        let params = vec![(1u16, b"hello".to_vec()), (100u16, vec![]), (7u16, vec![0xff; 300])];
        let encoded = encode_event(1_700_000_000, "evt-42", &params);
        let decoded = decode_event(&encoded).unwrap();
        assert_eq!(decoded.time_s, 1_700_000_000);
        assert_eq!(decoded.eid, "evt-42");
        assert_eq!(decoded.params, params);
    }

    #[test]
    fn truncated_record_is_malformed() {
        let encoded = encode_event(1, "e", &[(1, vec![1, 2, 3])]);
        let truncated = &encoded[..encoded.len() - 1];
        assert!(matches!(decode_event(truncated), Err(CodecError::MalformedRecord(_))));
    }

    proptest::proptest! {
        #[test]
        fn round_trips_arbitrary_events(
            time_s: u64,
            eid in "[a-zA-Z0-9_-]{0,32}",
            params in proptest::collection::vec((0u16..=1000, proptest::collection::vec(proptest::num::u8::ANY, 0..16)), 0..8),
        ) {
            let encoded = encode_event(time_s, &eid, &params);
            let decoded = decode_event(&encoded).unwrap();
            proptest::prop_assert_eq!(decoded.time_s, time_s);
            proptest::prop_assert_eq!(decoded.eid, eid);
            proptest::prop_assert_eq!(decoded.params, params);
        }
    }
}
