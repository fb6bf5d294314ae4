//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating a [`crate::LogJoinConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read from disk.
    #[error("failed to read configuration file '{file}': {source}")]
    Io {
        /// The file path that failed to read.
        file: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file's contents were not valid TOML, or did not
    /// match the expected shape.
    #[error("failed to parse configuration in '{file}': {source}")]
    Parse {
        /// The file path that failed to parse.
        file: PathBuf,
        /// The underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// `idle_timeout_seconds` was zero.
    #[error("idle_timeout_seconds must be non-zero")]
    ZeroIdleTimeout,

    /// `shard_index` was not less than `shard_count`.
    #[error("shard_index {shard_index} must be less than shard_count {shard_count}")]
    ShardIndexOutOfRange {
        /// The configured shard index.
        shard_index: u32,
        /// The configured shard count.
        shard_count: u32,
    },

    /// An `extra_params` entry reused an id already claimed by the standard
    /// dictionary or by another `extra_params` entry.
    #[error("parameter id {id} is already registered (name {name:?} conflicts with an existing entry)")]
    DuplicateParamId {
        /// The conflicting id.
        id: u16,
        /// The name that tried to claim it.
        name: String,
    },

    /// An `extra_params` entry reused a name already claimed by the
    /// standard dictionary or by another `extra_params` entry.
    #[error("parameter name {name:?} is already registered")]
    DuplicateParamName {
        /// The conflicting name.
        name: String,
    },
}

/// Convenience alias for results that may contain a [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
