// SPDX-License-Identifier: Apache-2.0

//! Immutable per-stat windowing configuration.

use crate::error::{MetricsError, Result};
use crate::quota::Quota;

/// The time unit a [`crate::stats::Rate`] normalizes its denominator to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateUnit {
    /// Report the rate per second (the default).
    #[default]
    Seconds,
    /// Report the rate per millisecond.
    Milliseconds,
}

impl RateUnit {
    pub(crate) fn as_millis(self) -> f64 {
        match self {
            Self::Seconds => 1000.0,
            Self::Milliseconds => 1.0,
        }
    }
}

/// Effectively-unbounded event window, used as the default.
pub const UNBOUNDED_EVENT_WINDOW: u64 = u64::MAX;

/// Default time window: 30 seconds.
pub const DEFAULT_TIME_WINDOW_MS: i64 = 30_000;

/// Default sample count.
pub const DEFAULT_SAMPLES: usize = 2;

/// Immutable bundle of windowing parameters shared by a sensor's stats.
///
/// Construct with [`MetricConfig::builder`]. A `MetricConfig` is cheap to clone and is typically
/// shared via `Arc` once frozen. Once a stat has allocated its sample array using a given
/// `MetricConfig`, later changes to that sensor's config do not resize the stat's array; only
/// stats created afterward see the new config.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricConfig {
    event_window: u64,
    time_window_ms: i64,
    samples: usize,
    quota: Option<Quota>,
    rate_unit: RateUnit,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            event_window: UNBOUNDED_EVENT_WINDOW,
            time_window_ms: DEFAULT_TIME_WINDOW_MS,
            samples: DEFAULT_SAMPLES,
            quota: None,
            rate_unit: RateUnit::default(),
        }
    }
}

impl MetricConfig {
    /// Start building a config from the defaults (`samples = 2`, `time_window_ms = 30_000`,
    /// `event_window` unbounded, no quota, rate unit seconds).
    pub fn builder() -> MetricConfigBuilder {
        MetricConfigBuilder(Self::default())
    }

    /// The number of samples kept in each stat's rotating window.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// The per-sample time window, in milliseconds.
    pub fn time_window_ms(&self) -> i64 {
        self.time_window_ms
    }

    /// The per-sample event-count window.
    pub fn event_window(&self) -> u64 {
        self.event_window
    }

    /// The quota attached to metrics using this config, if any.
    pub fn quota(&self) -> Option<Quota> {
        self.quota
    }

    /// The unit a [`crate::stats::Rate`] normalizes against.
    pub fn rate_unit(&self) -> RateUnit {
        self.rate_unit
    }
}

/// Fluent builder for [`MetricConfig`].
#[derive(Debug, Clone)]
pub struct MetricConfigBuilder(MetricConfig);

impl MetricConfigBuilder {
    /// Set the number of samples kept in the rotating window. Must be at least 1.
    pub fn samples(mut self, samples: usize) -> Self {
        self.0.samples = samples;
        self
    }

    /// Set the per-sample time window. Must be positive.
    pub fn time_window_ms(mut self, time_window_ms: i64) -> Self {
        self.0.time_window_ms = time_window_ms;
        self
    }

    /// Set the per-sample event-count window. Must be positive.
    pub fn event_window(mut self, event_window: u64) -> Self {
        self.0.event_window = event_window;
        self
    }

    /// Attach a quota evaluated after every `record`.
    pub fn quota(mut self, quota: Quota) -> Self {
        self.0.quota = Some(quota);
        self
    }

    /// Set the unit a [`crate::stats::Rate`] normalizes against.
    pub fn rate_unit(mut self, rate_unit: RateUnit) -> Self {
        self.0.rate_unit = rate_unit;
        self
    }

    /// Freeze the builder into an immutable [`MetricConfig`], validating every field.
    pub fn build(self) -> Result<MetricConfig> {
        let config = self.0;
        if config.samples == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "samples must be at least 1".into(),
            });
        }
        if config.time_window_ms <= 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "time_window_ms must be positive".into(),
            });
        }
        if config.event_window == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "event_window must be positive".into(),
            });
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = MetricConfig::default();
        assert_eq!(config.samples(), 2);
        assert_eq!(config.time_window_ms(), 30_000);
        assert_eq!(config.event_window(), u64::MAX);
        assert_eq!(config.quota(), None);
        assert_eq!(config.rate_unit(), RateUnit::Seconds);
    }

    #[test]
    fn rejects_non_positive_fields() {
        assert!(MetricConfig::builder().samples(0).build().is_err());
        assert!(MetricConfig::builder().time_window_ms(0).build().is_err());
        assert!(MetricConfig::builder().event_window(0).build().is_err());
    }

    #[test]
    fn builder_round_trips_values() {
        let config = MetricConfig::builder()
            .samples(4)
            .time_window_ms(1000)
            .event_window(10)
            .quota(Quota::upper_bound(5.0))
            .build()
            .unwrap();
        assert_eq!(config.samples(), 4);
        assert_eq!(config.time_window_ms(), 1000);
        assert_eq!(config.event_window(), 10);
        assert_eq!(config.quota(), Some(Quota::upper_bound(5.0)));
    }
}
