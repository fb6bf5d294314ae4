//! Static, injective mapping between short pixel parameter names and the
//! small integer ids used in the binary event record format.

use std::collections::HashMap;

use logjoin_types::{
    ParamId, COMMON_PARAM_ID_MAX, COMMON_PARAM_ID_MIN, LOCALIZED_PARAM_ID_MAX,
    LOCALIZED_PARAM_ID_MIN,
};

/// The common pixel fields, assigned ids 1–25 in declaration order.
const COMMON_FIELDS: &[&str] = &[
    "qstr", "cat", "item", "sku", "price", "qty", "referrer", "url", "ip", "ua", "customer",
    "campaign", "session", "pos", "rank", "page", "tab", "device", "os", "browser", "lang",
    "currency", "discount", "coupon", "ab",
];

/// The localized query-string variants, assigned ids 100–106 in declaration
/// order.
const LOCALIZED_FIELDS: &[&str] =
    &["qstr~en", "qstr~de", "qstr~fr", "qstr~es", "qstr~it", "qstr~pt", "qstr~ja"];

/// Errors raised when registering or looking up a parameter name/id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// `id_of`/`name_of` found no registered entry. Raised to the caller on
    /// encode (programmer error); counted and skipped per-event on decode.
    #[error("unregistered pixel parameter: {0}")]
    UnknownParam(String),
    /// A record's bytes did not form a valid event (truncated length,
    /// invalid varint, or trailing garbage).
    #[error("malformed event record: {0}")]
    MalformedRecord(String),
}

/// Bidirectional, injective mapping between pixel parameter names and the
/// small integer ids used on the wire.
///
/// Fixed at construction; may only be extended via
/// [`ParamDictionaryBuilder::register`] before [`ParamDictionaryBuilder::build`]
/// is called.
#[derive(Debug, Clone)]
pub struct ParamDictionary {
    name_to_id: HashMap<String, ParamId>,
    id_to_name: HashMap<ParamId, String>,
}

impl ParamDictionary {
    /// Start building a dictionary from scratch (no entries registered).
    pub fn builder() -> ParamDictionaryBuilder {
        ParamDictionaryBuilder::new()
    }

    /// The standard dictionary: common pixel fields at ids 1–25, localized
    /// query-string variants at ids 100–106.
    pub fn standard() -> Self {
        Self::standard_with_extras(&[])
    }

    /// The standard dictionary, plus caller-supplied `(name, id)` entries
    /// registered on top of it — e.g. a deployment's
    /// `logjoin_config::LogJoinConfig::extra_params`.
    ///
    /// # Panics
    /// Panics if an extra entry's name or id collides with the standard
    /// dictionary or with another extra entry. `LogJoinConfig::validate`
    /// is expected to have already rejected that case before this is
    /// called from configuration.
    pub fn standard_with_extras(extra: &[(String, ParamId)]) -> Self {
        let mut builder = Self::builder();
        for (offset, name) in COMMON_FIELDS.iter().enumerate() {
            builder.register(name, COMMON_PARAM_ID_MIN + offset as ParamId);
        }
        for (offset, name) in LOCALIZED_FIELDS.iter().enumerate() {
            builder.register(name, LOCALIZED_PARAM_ID_MIN + offset as ParamId);
        }
        debug_assert!(COMMON_PARAM_ID_MIN + COMMON_FIELDS.len() as ParamId - 1 <= COMMON_PARAM_ID_MAX);
        debug_assert!(
            LOCALIZED_PARAM_ID_MIN + LOCALIZED_FIELDS.len() as ParamId - 1 <= LOCALIZED_PARAM_ID_MAX
        );
        for (name, id) in extra {
            builder.register(name, *id);
        }
        builder.build()
    }

    /// Look up the id registered for `name`.
    pub fn id_of(&self, name: &str) -> Result<ParamId, CodecError> {
        self.name_to_id
            .get(name)
            .copied()
            .ok_or_else(|| CodecError::UnknownParam(name.to_string()))
    }

    /// Look up the name registered for `id`.
    pub fn name_of(&self, id: ParamId) -> Result<&str, CodecError> {
        self.id_to_name
            .get(&id)
            .map(String::as_str)
            .ok_or_else(|| CodecError::UnknownParam(id.to_string()))
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.name_to_id.len()
    }

    /// True if no names are registered.
    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }
}

/// Construction-time builder for a [`ParamDictionary`].
#[derive(Debug, Default)]
pub struct ParamDictionaryBuilder {
    name_to_id: HashMap<String, ParamId>,
    id_to_name: HashMap<ParamId, String>,
}

impl ParamDictionaryBuilder {
    /// Start with an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` under `id`.
    ///
    /// # Panics
    /// Panics if `name` or `id` is already registered — per §4.2, a
    /// duplicate name or id in the dictionary is a programmer error, not a
    /// runtime condition to recover from.
    pub fn register(&mut self, name: &str, id: ParamId) -> &mut Self {
        assert!(
            !self.name_to_id.contains_key(name),
            "pixel parameter name {name:?} already registered"
        );
        assert!(
            !self.id_to_name.contains_key(&id),
            "pixel parameter id {id} already registered"
        );
        self.name_to_id.insert(name.to_string(), id);
        self.id_to_name.insert(id, name.to_string());
        self
    }

    /// Finish building the dictionary.
    pub fn build(self) -> ParamDictionary {
        ParamDictionary {
            name_to_id: self.name_to_id,
            id_to_name: self.id_to_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_dictionary_round_trips_every_entry() {
        let dict = ParamDictionary::standard();
        for name in COMMON_FIELDS.iter().chain(LOCALIZED_FIELDS.iter()) {
            let id = dict.id_of(name).unwrap();
            assert_eq!(dict.name_of(id).unwrap(), *name);
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let dict = ParamDictionary::standard();
        assert!(matches!(dict.id_of("nope"), Err(CodecError::UnknownParam(_))));
    }

    #[test]
    fn standard_with_extras_registers_additional_entries_without_disturbing_the_standard_ones() {
        let dict = ParamDictionary::standard_with_extras(&[("widget".to_string(), 500)]);
        assert_eq!(dict.id_of("widget").unwrap(), 500);
        assert_eq!(dict.id_of("qstr").unwrap(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_name_panics() {
        let mut builder = ParamDictionary::builder();
        builder.register("qstr", 1);
        builder.register("qstr", 2);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_id_panics() {
        let mut builder = ParamDictionary::builder();
        builder.register("a", 1);
        builder.register("b", 1);
    }
}
