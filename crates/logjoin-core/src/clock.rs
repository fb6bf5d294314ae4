//! An injectable source of "now", so production callers are not forced to
//! read `SystemTime::now()` by hand at every `flush` call site.
//!
//! `LogJoin::flush` itself always takes `stream_time_micros` as an explicit
//! argument — this trait exists purely so a driver loop has a typed handle
//! to pass that argument from, with `SystemClock` as the production default
//! and a fake implementation swapped in for deterministic tests.

use std::time::{SystemTime, UNIX_EPOCH};

/// A source of the logical "now" driving flush decisions.
pub trait Clock: Send + Sync {
    /// The current time, in microseconds since the Unix epoch.
    fn now_micros(&self) -> i64;
}

/// A [`Clock`] backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is set before the Unix epoch")
            .as_micros() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_reports_a_plausible_recent_time() {
        // Sanity bound: any time after 2020-01-01 in micros.
        let floor = 1_577_836_800_i64 * 1_000_000;
        assert!(SystemClock.now_micros() > floor);
    }
}
