#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-codec** – Pixel parameter dictionary and binary event-record
//! codec.
//!
//! Combines the injective name↔id dictionary with the varint-packed event
//! record format into a single `ParamCodec` that operates on name-keyed
//! parameters, so callers never have to manage ids themselves.

mod dictionary;
mod event;
mod varint;

pub use dictionary::{CodecError, ParamDictionary, ParamDictionaryBuilder};
pub use event::{decode_event as decode_event_by_id, encode_event as encode_event_by_id, EventFields};
pub use varint::{read_u64, write_u64, VarintError};

use logjoin_types::ParamId;

/// Name-keyed view over an event's pixel parameters, as decoded by
/// [`ParamCodec::decode_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEventFields {
    /// Event timestamp, whole seconds since the Unix epoch.
    pub time_s: u64,
    /// Event id.
    pub eid: String,
    /// Pixel parameters, keyed by their registered name.
    pub params: Vec<(String, Vec<u8>)>,
}

/// The pixel parameter dictionary paired with the event record codec.
///
/// `encode_event`/`decode_event` operate on name-keyed parameters; names not
/// present in the dictionary fail with [`CodecError::UnknownParam`] — a
/// programmer error on encode (the caller controls what it registers), and
/// a per-event, countable failure on decode (the data came from the store
/// and may predate a dictionary change).
#[derive(Debug, Clone)]
pub struct ParamCodec {
    dictionary: ParamDictionary,
}

impl ParamCodec {
    /// Build a codec around an explicit dictionary.
    pub fn new(dictionary: ParamDictionary) -> Self {
        Self { dictionary }
    }

    /// Build a codec around the standard dictionary (§4.2 / `spec.md` §3).
    pub fn standard() -> Self {
        Self::new(ParamDictionary::standard())
    }

    /// Build a codec around the standard dictionary plus caller-supplied
    /// extra entries. See [`ParamDictionary::standard_with_extras`].
    pub fn standard_with_extras(extra: &[(String, ParamId)]) -> Self {
        Self::new(ParamDictionary::standard_with_extras(extra))
    }

    /// Borrow the underlying dictionary, e.g. to look up names for
    /// diagnostics.
    pub fn dictionary(&self) -> &ParamDictionary {
        &self.dictionary
    }

    /// Encode a name-keyed event into the binary event record format.
    ///
    /// # Errors
    /// Returns [`CodecError::UnknownParam`] if any parameter name is not
    /// registered in the dictionary. Per §4.2, this is a programmer error
    /// on the encode path and should not be treated as an ordinary runtime
    /// failure to recover from — the dictionary is fixed at construction.
    pub fn encode_event(
        &self,
        time_s: u64,
        eid: &str,
        params: &[(String, Vec<u8>)],
    ) -> Result<Vec<u8>, CodecError> {
        let mut by_id: Vec<(ParamId, Vec<u8>)> = Vec::with_capacity(params.len());
        for (name, value) in params {
            let id = self.dictionary.id_of(name)?;
            by_id.push((id, value.clone()));
        }
        Ok(event::encode_event(time_s, eid, &by_id))
    }

    /// Decode a binary event record back into name-keyed fields.
    ///
    /// # Errors
    /// Returns [`CodecError::MalformedRecord`] if `bytes` is not a
    /// well-formed event record. A parameter id with no registered name is
    /// *not* a hard error here — callers that need per-parameter recovery
    /// should use [`decode_event_by_id`] directly and consult
    /// [`ParamDictionary::name_of`] themselves; an unknown id on decode is a
    /// per-event skip handled by the orchestrator, not the codec.
    pub fn decode_event(&self, bytes: &[u8]) -> Result<NamedEventFields, CodecError> {
        let fields = event::decode_event(bytes)?;
        let mut named = Vec::with_capacity(fields.params.len());
        for (id, value) in fields.params {
            let name = self.dictionary.name_of(id)?.to_string();
            named.push((name, value));
        }
        Ok(NamedEventFields { time_s: fields.time_s, eid: fields.eid, params: named })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_for_all_registered_parameter_names() {
        let codec = ParamCodec::standard();
        let params = vec![
            ("qstr".to_string(), b"hello world".to_vec()),
            ("qstr~en".to_string(), b"hello".to_vec()),
            ("price".to_string(), b"19.99".to_vec()),
        ];
        let encoded = codec.encode_event(1_700_000_000, "e1", &params).unwrap();
        let decoded = codec.decode_event(&encoded).unwrap();
        assert_eq!(decoded.time_s, 1_700_000_000);
        assert_eq!(decoded.eid, "e1");
        assert_eq!(decoded.params, params);
    }

    #[test]
    fn encode_fails_for_an_unregistered_name() {
        let codec = ParamCodec::standard();
        let err = codec
            .encode_event(1, "e1", &[("totally-unknown".to_string(), vec![])])
            .unwrap_err();
        assert!(matches!(err, CodecError::UnknownParam(_)));
    }

    #[test]
    fn decode_fails_when_a_param_id_has_no_registered_name() {
        let codec = ParamCodec::standard();
        // id 999 is not part of the standard dictionary.
        let raw = encode_event_by_id(1, "e1", &[(999, vec![1])]);
        let err = codec.decode_event(&raw).unwrap_err();
        assert!(matches!(err, CodecError::UnknownParam(_)));
    }
}
