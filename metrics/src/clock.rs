// SPDX-License-Identifier: Apache-2.0

//! The monotonic-millisecond time capability threaded through the registry, sensors, and stats.
//!
//! Nothing in this crate calls `std::time::Instant::now()` directly. Instead every component
//! that needs "now" holds a [`Clock`], which wraps a [`metrics_timesource::TimeSource`]. Tests
//! swap in a fake source (see [`Clock::custom`]) to make window rotation and purge deterministic
//! without real sleeps.

use metrics_timesource::TimeSource;
use std::time::UNIX_EPOCH;

/// A monotonic, millisecond-resolution time source.
///
/// Cloning a `Clock` is cheap; clones observe the same underlying time source (including any
/// fake time installed for tests).
#[derive(Clone, Debug)]
pub struct Clock {
    source: TimeSource,
}

impl Clock {
    /// The real system clock.
    pub fn system() -> Self {
        Self {
            source: TimeSource::System,
        }
    }

    /// Wrap a custom [`metrics_timesource::Time`] implementation, e.g. one of the fakes in
    /// [`metrics_timesource::fakes`].
    pub fn custom(time: impl metrics_timesource::Time + 'static) -> Self {
        Self {
            source: TimeSource::custom(time),
        }
    }

    /// Current time in milliseconds since the Unix epoch.
    ///
    /// Never runs backward for a given `Clock` instance; two calls on the same instance are
    /// non-decreasing.
    pub fn now_ms(&self) -> i64 {
        let elapsed = self
            .source
            .system_time()
            .as_std()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        elapsed.as_millis() as i64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}
