// SPDX-License-Identifier: Apache-2.0

//! A named, queryable metric in a [`crate::registry::Metrics`] registry.

use std::sync::Arc;

use crate::config::MetricConfig;
use crate::stat::Measurable;

/// A single named, queryable value: a recordable [`crate::stat::Stat`] bound to a sensor, or a
/// read-only view such as one quantile of a [`crate::stats::Percentiles`] histogram.
///
/// `Metric`s are what reporters and [`crate::registry::Metrics::metric_value`] see; they never
/// expose `record` — only a sensor, via its own stats, can mutate the underlying state.
///
/// Cloning a `Metric` is cheap: it shares the same underlying `Measurable` (typically a stat
/// still owned by its sensor) rather than snapshotting a value.
#[derive(Clone)]
pub struct Metric {
    name: String,
    measurable: Arc<dyn Measurable>,
    config: MetricConfig,
}

impl Metric {
    pub(crate) fn new(name: impl Into<String>, measurable: Arc<dyn Measurable>, config: MetricConfig) -> Self {
        Self {
            name: name.into(),
            measurable,
            config,
        }
    }

    /// This metric's registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The config this metric's stat was built from.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// The current reading, as of `now_ms`.
    pub fn value(&self, now_ms: i64) -> f64 {
        self.measurable.measure(now_ms)
    }
}

impl std::fmt::Debug for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metric").field("name", &self.name).finish_non_exhaustive()
    }
}
