// SPDX-License-Identifier: Apache-2.0

//! [`Metrics`]: the process-wide registry tying sensors, metrics, and reporters together.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::MetricConfig;
use crate::error::{MetricsError, Result};
use crate::metric::Metric;
use crate::reporter::Reporter;
use crate::sensor::Sensor;
use crate::stat::{Measurable, Stat, StatAsMeasurable};
use crate::stats::{self, BucketSizing, PercentileQuery, PercentileRecorder, Percentiles};

/// The registry of every sensor and metric in a process, and the reporters watching them.
///
/// A `Metrics` is always held behind an `Arc` (see [`Metrics::new`]): sensors hold a weak
/// back-reference to their owning registry so that [`Sensor::add`] can enforce name uniqueness
/// and notify reporters without every caller threading the registry through by hand.
///
/// Sensor and metric names share one namespace: you cannot register a sensor and a metric under
/// the same name, even though they're tracked in separate maps internally.
pub struct Metrics {
    sensors: RwLock<HashMap<String, Arc<Sensor>>>,
    metrics: RwLock<HashMap<String, Metric>>,
    reporters: Mutex<Vec<Box<dyn Reporter>>>,
    clock: Clock,
    // a handle to our own Arc, so `sensor()` can hand sensors a `Weak<Metrics>` back-reference
    // without requiring an unstable `self: &Arc<Self>` receiver.
    self_ref: std::sync::Weak<Metrics>,
}

impl Metrics {
    /// A fresh registry backed by the real system clock.
    pub fn new() -> Arc<Self> {
        Self::with_clock(Clock::system())
    }

    /// A fresh registry backed by a custom [`Clock`] — tests use this with a fake time source to
    /// make window rotation and purging deterministic.
    pub fn with_clock(clock: Clock) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            sensors: RwLock::new(HashMap::new()),
            metrics: RwLock::new(HashMap::new()),
            reporters: Mutex::new(Vec::new()),
            clock,
            self_ref: self_ref.clone(),
        })
    }

    fn name_taken(&self, name: &str) -> bool {
        self.sensors.read().expect("sensor map lock poisoned").contains_key(name)
            || self.metrics.read().expect("metric map lock poisoned").contains_key(name)
    }

    /// Create a sensor, or return the existing one of the same name if it was built from an
    /// equivalent parent set and config. Conflicting re-registration (same name, different
    /// parents or config) is an error, as is a parent list that would introduce a diamond: two
    /// parents sharing a common ancestor.
    pub fn sensor(
        &self,
        name: impl Into<String>,
        parents: &[&Arc<Sensor>],
        config: Option<MetricConfig>,
    ) -> Result<Arc<Sensor>> {
        let name = name.into();
        let config = config.unwrap_or_default();

        let existing = self.sensors.read().expect("sensor map lock poisoned").get(&name).cloned();
        if let Some(existing) = existing {
            let existing_parents: HashSet<String> = existing.parents().iter().map(|p| p.name().to_string()).collect();
            let requested_parents: HashSet<String> = parents.iter().map(|p| p.name().to_string()).collect();
            if existing_parents == requested_parents && existing.config() == &config {
                debug!(sensor = %name, "reusing existing equivalent sensor");
                return Ok(existing);
            }
            return Err(MetricsError::IllegalSensorHierarchy {
                reason: format!("sensor `{name}` already exists with a different parent set or config"),
            });
        }

        if self.metrics.read().expect("metric map lock poisoned").contains_key(&name) {
            return Err(MetricsError::DuplicateMetricName { name });
        }

        self.check_no_diamond(&name, parents)?;

        let sensor = Arc::new(Sensor::new(
            name.clone(),
            parents.iter().copied().map(Arc::downgrade).collect(),
            config,
            self.clock.clone(),
            self.self_ref.clone(),
        ));
        self.sensors
            .write()
            .expect("sensor map lock poisoned")
            .insert(name.clone(), Arc::clone(&sensor));
        debug!(sensor = %name, parents = parents.len(), "created sensor");
        Ok(sensor)
    }

    fn check_no_diamond(&self, name: &str, parents: &[&Arc<Sensor>]) -> Result<()> {
        let mut seen = HashSet::new();
        for parent in parents.iter().copied() {
            let ancestors = ancestor_names(parent);
            for ancestor in &ancestors {
                if !seen.insert(ancestor.clone()) {
                    return Err(MetricsError::IllegalSensorHierarchy {
                        reason: format!(
                            "sensor `{name}` would have two parent paths converging on `{ancestor}`"
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub(crate) fn register_stat<S>(
        &self,
        sensor: &Sensor,
        name: String,
        build: impl FnOnce(&MetricConfig, i64) -> S,
        config: MetricConfig,
    ) -> Result<Metric>
    where
        S: Stat + 'static,
    {
        if self.name_taken(&name) {
            return Err(MetricsError::DuplicateMetricName { name });
        }
        let now_ms = self.clock.now_ms();
        let stat: Arc<dyn Stat> = Arc::new(build(&config, now_ms));
        sensor.push_stat(name.clone(), Arc::clone(&stat), config.clone());
        let measurable: Arc<dyn Measurable> = Arc::new(StatAsMeasurable(stat));
        self.insert_metric(name, measurable, config)
    }

    /// Attach a percentile histogram to `sensor`, registering one queryable metric per
    /// `(name, quantile)` pair. Recording into `sensor` feeds the shared histogram; each
    /// registered name reads one quantile of it.
    pub fn add_percentiles(
        &self,
        sensor: &Sensor,
        sizing: BucketSizing,
        min: f64,
        max: f64,
        buckets: usize,
        quantiles: &[(&str, f64)],
    ) -> Result<()> {
        for (name, _) in quantiles {
            if self.name_taken(name) {
                return Err(MetricsError::DuplicateMetricName { name: (*name).to_string() });
            }
        }
        let now_ms = self.clock.now_ms();
        let window = stats::window_from(sensor.config());
        let histogram = Percentiles::new(sizing, min, max, buckets, window, now_ms)?;
        let recorder: Arc<dyn Stat> = Arc::new(PercentileRecorder(Arc::clone(&histogram)));
        sensor.push_stat(format!("{}-percentiles", sensor.name()), recorder, sensor.config().clone());
        for (name, quantile) in quantiles {
            let view: Arc<dyn Measurable> = Arc::new(PercentileQuery::new(Arc::clone(&histogram), *quantile));
            self.insert_metric((*name).to_string(), view, sensor.config().clone())?;
        }
        Ok(())
    }

    /// Register a measurable that isn't backed by a sensor at all — a one-off gauge, say.
    pub fn add_metric(&self, name: impl Into<String>, measurable: Arc<dyn Measurable>, config: MetricConfig) -> Result<Metric> {
        let name = name.into();
        if self.name_taken(&name) {
            return Err(MetricsError::DuplicateMetricName { name });
        }
        self.insert_metric(name, measurable, config)
    }

    fn insert_metric(&self, name: String, measurable: Arc<dyn Measurable>, config: MetricConfig) -> Result<Metric> {
        let metric = Metric::new(name.clone(), measurable, config);
        self.notify_reporters(|r| r.metric_change(&metric));
        self.metrics
            .write()
            .expect("metric map lock poisoned")
            .insert(name, metric.clone());
        Ok(metric)
    }

    /// The current value of the metric named `name`.
    pub fn metric_value(&self, name: &str) -> Result<f64> {
        let now_ms = self.clock.now_ms();
        self.metrics
            .read()
            .expect("metric map lock poisoned")
            .get(name)
            .map(|m| m.value(now_ms))
            .ok_or_else(|| MetricsError::MetricNotFound { name: name.to_string() })
    }

    /// Look up a metric by name.
    pub fn get_metric(&self, name: &str) -> Result<Metric> {
        self.metrics
            .read()
            .expect("metric map lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound { name: name.to_string() })
    }

    /// A point-in-time snapshot of every registered metric.
    pub fn metrics(&self) -> Vec<Metric> {
        self.metrics.read().expect("metric map lock poisoned").values().cloned().collect()
    }

    /// Remove a metric, notifying reporters.
    pub fn remove_metric(&self, name: &str) -> Result<()> {
        let removed = self
            .metrics
            .write()
            .expect("metric map lock poisoned")
            .remove(name)
            .ok_or_else(|| MetricsError::MetricNotFound { name: name.to_string() })?;
        self.notify_reporters(|r| r.metric_removal(&removed));
        Ok(())
    }

    /// Every currently-registered metric name.
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.read().expect("metric map lock poisoned").keys().cloned().collect()
    }

    /// Register a reporter, immediately calling its `init` with every metric that exists right
    /// now.
    pub fn add_reporter(&self, reporter: Box<dyn Reporter>) {
        {
            let metrics = self.metrics.read().expect("metric map lock poisoned");
            let refs: Vec<&Metric> = metrics.values().collect();
            let result = panic::catch_unwind(AssertUnwindSafe(|| reporter.init(&refs)));
            if result.is_err() {
                warn!("reporter panicked during init");
            }
        }
        self.reporters.lock().expect("reporter list lock poisoned").push(reporter);
    }

    fn notify_reporters(&self, mut f: impl FnMut(&dyn Reporter)) {
        let reporters = self.reporters.lock().expect("reporter list lock poisoned");
        for reporter in reporters.iter() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| f(reporter.as_ref())));
            if result.is_err() {
                warn!("reporter panicked while handling a metric event");
            }
        }
    }

    /// Shut every reporter down. Idempotent: reporters are not removed, just notified again.
    pub fn close(&self) {
        self.notify_reporters(|r| r.close());
    }
}

fn ancestor_names(sensor: &Arc<Sensor>) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut frontier: Vec<Arc<Sensor>> = vec![Arc::clone(sensor)];
    while let Some(s) = frontier.pop() {
        if names.insert(s.name().to_string()) {
            frontier.extend(s.parents());
        }
    }
    names
}
