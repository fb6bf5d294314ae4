#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-config** – Configuration loading and validation for the
//! LogJoin sessionizer.
//!
//! Mirrors the shape of `toka-config-cli`'s configuration layer (structured
//! `thiserror` errors, a dedicated validation pass, TOML as the on-disk
//! format) but packaged as a library type rather than a CLI subcommand,
//! since packaging/CLI concerns are explicitly out of scope for this crate.

mod error;

pub use error::{ConfigError, Result};

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use logjoin_types::{
    ParamId, COMMON_PARAM_ID_MAX, COMMON_PARAM_ID_MIN, DEFAULT_IDLE_TIMEOUT_SECONDS,
    LOCALIZED_PARAM_ID_MAX, LOCALIZED_PARAM_ID_MIN,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Runtime configuration for one [`logjoin_core::LogJoin`] instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogJoinConfig {
    /// Idle timeout, in seconds, after which a quiescent user's session is
    /// finalized. Default 1800 (30 minutes), per `spec.md` §4.5.
    pub idle_timeout_seconds: u64,
    /// When `true`, `flush_session` computes the envelope but does not
    /// write the output record; deletion of source events still occurs.
    pub dry_run: bool,
    /// Total number of shards this deployment is split across.
    pub shard_count: u32,
    /// This instance's shard index, in `0..shard_count`.
    pub shard_index: u32,
    /// Prefix under which counters are exported (e.g. `"logjoin_total"`).
    pub stats_prefix: String,
    /// Additional pixel parameter name/id pairs to register alongside the
    /// standard dictionary.
    pub extra_params: Vec<(String, ParamId)>,
}

impl Default for LogJoinConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: DEFAULT_IDLE_TIMEOUT_SECONDS,
            dry_run: false,
            shard_count: 1,
            shard_index: 0,
            stats_prefix: "logjoin".to_string(),
            extra_params: Vec::new(),
        }
    }
}

impl LogJoinConfig {
    /// Start building a config from defaults.
    pub fn builder() -> LogJoinConfigBuilder {
        LogJoinConfigBuilder::default()
    }

    /// Parse a config from a TOML string, then validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            file: Path::new("<string>").to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a TOML file on disk.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(file = %path.display(), "loading LogJoin configuration");
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { file: path.to_path_buf(), source })?;
        let config: Self = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { file: path.to_path_buf(), source })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration's invariants.
    ///
    /// # Errors
    /// - [`ConfigError::ZeroIdleTimeout`] if `idle_timeout_seconds` is zero.
    /// - [`ConfigError::ShardIndexOutOfRange`] if `shard_index >= shard_count`.
    /// - [`ConfigError::DuplicateParamId`] / [`ConfigError::DuplicateParamName`]
    ///   if `extra_params` collides with the standard dictionary's reserved
    ///   ranges (1–25, 100–106) or with itself.
    pub fn validate(&self) -> Result<()> {
        if self.idle_timeout_seconds == 0 {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        if self.shard_index >= self.shard_count {
            return Err(ConfigError::ShardIndexOutOfRange {
                shard_index: self.shard_index,
                shard_count: self.shard_count,
            });
        }

        let mut seen_ids: HashSet<ParamId> = HashSet::new();
        let mut seen_names: HashSet<&str> = HashSet::new();
        for (name, id) in &self.extra_params {
            let reserved = (COMMON_PARAM_ID_MIN..=COMMON_PARAM_ID_MAX).contains(id)
                || (LOCALIZED_PARAM_ID_MIN..=LOCALIZED_PARAM_ID_MAX).contains(id);
            if reserved || !seen_ids.insert(*id) {
                return Err(ConfigError::DuplicateParamId { id: *id, name: name.clone() });
            }
            if !seen_names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateParamName { name: name.clone() });
            }
        }
        Ok(())
    }
}

/// Builder for [`LogJoinConfig`], for constructing one programmatically
/// instead of from a TOML file.
#[derive(Debug, Default)]
pub struct LogJoinConfigBuilder {
    config: LogJoinConfig,
}

impl LogJoinConfigBuilder {
    /// Set the idle timeout, in seconds.
    pub fn idle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.idle_timeout_seconds = seconds;
        self
    }

    /// Enable or disable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Set the shard count and this instance's index within it.
    pub fn shard(mut self, shard_index: u32, shard_count: u32) -> Self {
        self.config.shard_index = shard_index;
        self.config.shard_count = shard_count;
        self
    }

    /// Set the stats export prefix.
    pub fn stats_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.stats_prefix = prefix.into();
        self
    }

    /// Register an additional pixel parameter name/id pair.
    pub fn extra_param(mut self, name: impl Into<String>, id: ParamId) -> Self {
        self.config.extra_params.push((name.into(), id));
        self
    }

    /// Finish building, validating the result.
    pub fn build(self) -> Result<LogJoinConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        LogJoinConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_idle_timeout_is_rejected() {
        let config = LogJoinConfig::builder().idle_timeout_seconds(0).build();
        assert!(matches!(config, Err(ConfigError::ZeroIdleTimeout)));
    }

    #[test]
    fn shard_index_out_of_range_is_rejected() {
        let config = LogJoinConfig::builder().shard(3, 3).build();
        assert!(matches!(config, Err(ConfigError::ShardIndexOutOfRange { .. })));
    }

    #[test]
    fn extra_param_colliding_with_the_standard_dictionary_is_rejected() {
        let config = LogJoinConfig::builder().extra_param("custom", 5).build();
        assert!(matches!(config, Err(ConfigError::DuplicateParamId { .. })));
    }

    #[test]
    fn duplicate_extra_param_name_is_rejected() {
        let config = LogJoinConfig::builder()
            .extra_param("widget", 500)
            .extra_param("widget", 501)
            .build();
        assert!(matches!(config, Err(ConfigError::DuplicateParamName { .. })));
    }

    #[test]
    fn parses_from_toml() {
        let toml = r#"
            idle_timeout_seconds = 900
            dry_run = true
            shard_count = 4
            shard_index = 1
            stats_prefix = "pixel"
            extra_params = [["widget", 500]]
        "#;
        let config = LogJoinConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.idle_timeout_seconds, 900);
        assert!(config.dry_run);
        assert_eq!(config.shard_count, 4);
        assert_eq!(config.shard_index, 1);
        assert_eq!(config.stats_prefix, "pixel");
        assert_eq!(config.extra_params, vec![("widget".to_string(), 500)]);
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logjoin.toml");
        fs::write(&path, "idle_timeout_seconds = 60\n").unwrap();
        let config = LogJoinConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.idle_timeout_seconds, 60);
    }
}
