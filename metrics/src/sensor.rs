// SPDX-License-Identifier: Apache-2.0

//! [`Sensor`]: the recordable node in a [`crate::registry::Metrics`] registry's hierarchy.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, Weak};

use tracing::trace;

use crate::clock::Clock;
use crate::config::MetricConfig;
use crate::error::{MetricsError, Result};
use crate::metric::Metric;
use crate::registry::Metrics;
use crate::stat::Stat;

struct StatEntry {
    name: String,
    stat: Arc<dyn Stat>,
    config: MetricConfig,
}

/// A named point of instrumentation. Recording a value feeds every stat attached directly to
/// this sensor, then recurses into every parent (child-before-parent), so a single `record` call
/// updates the whole chain of ancestors in one pass.
///
/// Sensors are always owned by a [`Metrics`] registry and reached via [`Metrics::sensor`] —
/// there is no public constructor, since a sensor detached from a registry couldn't enforce
/// metric-name uniqueness or notify reporters when [`Sensor::add`] is called.
pub struct Sensor {
    name: String,
    parents: Vec<Weak<Sensor>>,
    stats: RwLock<Vec<StatEntry>>,
    config: MetricConfig,
    clock: Clock,
    registry: Weak<Metrics>,
}

impl Sensor {
    pub(crate) fn new(
        name: impl Into<String>,
        parents: Vec<Weak<Sensor>>,
        config: MetricConfig,
        clock: Clock,
        registry: Weak<Metrics>,
    ) -> Self {
        Self {
            name: name.into(),
            parents,
            stats: RwLock::new(Vec::new()),
            config,
            clock,
            registry,
        }
    }

    /// This sensor's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The config new stats on this sensor are sized from, unless overridden per-stat.
    pub fn config(&self) -> &MetricConfig {
        &self.config
    }

    /// This sensor's direct parents, for inspection. Entries whose sensor has since been dropped
    /// from the registry are skipped.
    pub fn parents(&self) -> Vec<Arc<Sensor>> {
        self.parents.iter().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn push_stat(&self, name: impl Into<String>, stat: Arc<dyn Stat>, config: MetricConfig) {
        self.stats
            .write()
            .expect("sensor stat list lock poisoned")
            .push(StatEntry {
                name: name.into(),
                stat,
                config,
            });
    }

    /// Attach a stat to this sensor, registering it as `name` in the owning registry.
    ///
    /// `build` receives the config this stat should be sized from (`self.config()` unless a
    /// different one is supplied via a future per-stat override) and the current time, and
    /// returns the freshly constructed stat.
    pub fn add<S>(&self, name: impl Into<String>, build: impl FnOnce(&MetricConfig, i64) -> S) -> Result<Metric>
    where
        S: Stat + 'static,
    {
        let registry = self.registry.upgrade().ok_or_else(|| MetricsError::InvalidConfig {
            reason: "sensor's registry has been dropped".into(),
        })?;
        registry.register_stat(self, name.into(), build, self.config.clone())
    }

    /// Record a bare occurrence — shorthand for `record(1.0)`, for sensors only ever used to
    /// count events.
    pub fn record_occurrence(&self) -> Result<()> {
        self.record(1.0)
    }

    /// Record a value as of now, propagating to every ancestor. Returns an error if this
    /// sensor's own quota (if any) rejects the new value — the value has already been persisted
    /// into every stat by the time this returns, whether or not a quota was violated.
    pub fn record(&self, value: f64) -> Result<()> {
        let now_ms = self.clock.now_ms();
        let mut visited = HashSet::new();
        match self.record_inner(value, now_ms, &mut visited, true) {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    fn record_inner(
        &self,
        value: f64,
        now_ms: i64,
        visited: &mut HashSet<usize>,
        check_quota: bool,
    ) -> Option<MetricsError> {
        if !visited.insert(self as *const Sensor as usize) {
            return None;
        }
        trace!(sensor = %self.name, value, "recording");
        let mut violation = None;
        {
            let stats = self.stats.read().expect("sensor stat list lock poisoned");
            for entry in stats.iter() {
                entry.stat.record(value, now_ms);
                if check_quota {
                    if let Some(quota) = entry.config.quota() {
                        let measured = entry.stat.measure(now_ms);
                        if !quota.acceptable(measured) {
                            tracing::warn!(
                                metric = %entry.name,
                                value = measured,
                                quota = ?quota,
                                "quota violated"
                            );
                            if violation.is_none() {
                                violation = Some(MetricsError::QuotaViolation {
                                    metric: entry.name.clone(),
                                    quota,
                                    value: measured,
                                });
                            }
                        }
                    }
                }
            }
        }
        for parent in &self.parents {
            if let Some(parent) = parent.upgrade() {
                if let Some(e) = parent.record_inner(value, now_ms, visited, false) {
                    if violation.is_none() {
                        violation = Some(e);
                    }
                }
            }
        }
        violation
    }
}

impl std::fmt::Debug for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sensor")
            .field("name", &self.name)
            .field("parents", &self.parents.len())
            .finish_non_exhaustive()
    }
}
