#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **logjoin-core** – The LogJoin orchestrator: ingest, shard-route,
//! persist, and sessionize tracking-pixel log lines against an embedded
//! ordered key-value store.
//!
//! Ties together `logjoin-codec` (event encoding), `logjoin-store-core`
//! (the storage contract), and a pluggable [`JoinTarget`] into the single
//! [`LogJoin`] type that owns one deployment's in-memory deadlines and
//! counters.

mod clock;
mod deadlines;
mod error;
mod logjoin;
mod query;
mod stats;
mod target;

pub mod telemetry;

pub use clock::{Clock, SystemClock};
pub use deadlines::DeadlineIndex;
pub use error::LogJoinError;
pub use logjoin::LogJoin;
pub use stats::Stats;
pub use target::{CountingJoinTarget, JoinTarget};
