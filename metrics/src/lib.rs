// SPDX-License-Identifier: Apache-2.0

//! A process-embedded metrics library: record observations against named [`Sensor`]s, compose
//! them through windowed [`stats`] (moving averages, rates, percentile histograms, counts,
//! totals), enforce [`Quota`] bounds on recorded traffic, and expose the results as named
//! [`Metric`]s through a [`Metrics`] registry that any [`Reporter`] can subscribe to.
//!
//! ```
//! use metrics_core::{Metrics, stats::Avg};
//!
//! let registry = Metrics::new();
//! let sensor = registry.sensor("requests", &[], None).unwrap();
//! sensor.add("requests.avg-size", |config, now| Avg::new(config, now)).unwrap();
//! sensor.record(128.0).unwrap();
//! assert_eq!(registry.metric_value("requests.avg-size").unwrap(), 128.0);
//! ```

#![deny(missing_docs)]

mod clock;
mod config;
mod error;
mod metric;
mod quota;
mod registry;
mod sample;
mod sensor;
mod stat;
pub mod stats;

pub mod reporter;

pub use clock::Clock;
pub use config::{MetricConfig, MetricConfigBuilder, RateUnit};
pub use error::{MetricsError, Result};
pub use metric::Metric;
pub use quota::Quota;
pub use registry::Metrics;
pub use reporter::Reporter;
pub use sensor::Sensor;
pub use stat::{Measurable, Stat};

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_timesource::fakes::ManuallyAdvancedTimeSource;
    use std::time::{Duration, UNIX_EPOCH};
    use stats::{Avg, Max, Min, OccurrenceRate, Rate, SampledCount, Total};

    fn fake_registry_at_zero() -> (std::sync::Arc<Metrics>, ManuallyAdvancedTimeSource) {
        let fake = ManuallyAdvancedTimeSource::at_time(UNIX_EPOCH);
        let registry = Metrics::with_clock(Clock::custom(fake.clone()));
        (registry, fake)
    }

    fn advance(fake: &ManuallyAdvancedTimeSource, ms: u64) {
        // reading the current time back out avoids hard-coding an absolute epoch offset in tests
        let now = Clock::custom(fake.clone()).now_ms();
        fake.update_time(UNIX_EPOCH + Duration::from_millis(now as u64 + ms));
    }

    /// Scenario 1 from the testable-properties list: attach every simple stat to one sensor,
    /// record 0..9, advance the clock 2s, and check each stat's reading.
    #[test]
    fn simple_stats_scenario() {
        let (registry, fake) = fake_registry_at_zero();
        let s = registry.sensor("s", &[], None).unwrap();
        s.add("s.avg", |c, now| Avg::new(c, now)).unwrap();
        s.add("s.max", |c, now| Max::new(c, now)).unwrap();
        s.add("s.min", |c, now| Min::new(c, now)).unwrap();
        s.add("s.count", |c, now| SampledCount::new(c, now)).unwrap();
        s.add("s.rate", |c, now| Rate::for_config(c, now)).unwrap();
        s.add("s.occurrence-rate", |c, now| OccurrenceRate::for_config(c, now))
            .unwrap();

        for v in 0..10 {
            s.record(v as f64).unwrap();
        }
        advance(&fake, 2000);

        assert_eq!(registry.metric_value("s.avg").unwrap(), 4.5);
        assert_eq!(registry.metric_value("s.max").unwrap(), 9.0);
        assert_eq!(registry.metric_value("s.min").unwrap(), 0.0);
        assert_eq!(registry.metric_value("s.count").unwrap(), 10.0);
        assert!((registry.metric_value("s.rate").unwrap() - 22.5).abs() < 1e-9);
        assert!((registry.metric_value("s.occurrence-rate").unwrap() - 5.0).abs() < 1e-9);
    }

    /// Scenario 2: recording at a child propagates to its parent.
    #[test]
    fn hierarchy_propagates_counts_to_parents() {
        let (registry, _fake) = fake_registry_at_zero();
        let parent = registry.sensor("parent", &[], None).unwrap();
        parent.add("parent.count", |c, now| SampledCount::new(c, now)).unwrap();
        let child = registry.sensor("child", &[&parent], None).unwrap();
        child.add("child.count", |c, now| SampledCount::new(c, now)).unwrap();

        for _ in 0..5 {
            child.record_occurrence().unwrap();
        }
        parent.record_occurrence().unwrap();

        assert_eq!(registry.metric_value("child.count").unwrap(), 5.0);
        assert_eq!(registry.metric_value("parent.count").unwrap(), 6.0);
    }

    /// Scenario 3: two sensors that both descend from the same parent cannot also be declared
    /// parents of a third sensor — that would form a diamond.
    #[test]
    fn diamond_hierarchy_is_rejected() {
        let (registry, _fake) = fake_registry_at_zero();
        let parent = registry.sensor("parent", &[], None).unwrap();
        let child1 = registry.sensor("child1", &[&parent], None).unwrap();
        let child2 = registry.sensor("child2", &[&parent], None).unwrap();

        let result = registry.sensor("gc", &[&child1, &child2], None);
        assert!(matches!(result, Err(MetricsError::IllegalSensorHierarchy { .. })));
    }

    /// Scenario 4: event-count windowing rotates out the oldest sample once `event_window` is
    /// exceeded.
    #[test]
    fn event_window_rotates_out_stale_samples() {
        let (registry, _fake) = fake_registry_at_zero();
        let config = MetricConfig::builder().samples(2).event_window(2).build().unwrap();
        let s = registry.sensor("s", &[], Some(config)).unwrap();
        s.add("s.count", |c, now| SampledCount::new(c, now)).unwrap();

        for _ in 0..5 {
            s.record(1.0).unwrap();
        }
        // event 3 rotates sample 0 (full at 2 events) out as current, event 5 rotates sample 1
        // (also full at 2 events) out as current; what's left is sample 0's lone 5th event plus
        // sample 1's 2 events from before it was rotated away from.
        assert_eq!(registry.metric_value("s.count").unwrap(), 3.0);
    }

    /// Scenario 5: a quota violation is raised after the value is persisted, not instead of it.
    #[test]
    fn quota_violation_does_not_roll_back_the_write() {
        let (registry, _fake) = fake_registry_at_zero();
        let config = MetricConfig::builder().quota(Quota::upper_bound(5.0)).build().unwrap();
        let s = registry.sensor("test1", &[], Some(config)).unwrap();
        s.add("test1.total", |_config, _now| Total::new()).unwrap();

        s.record(4.0).unwrap();
        let result = s.record(2.0);
        assert!(matches!(result, Err(MetricsError::QuotaViolation { .. })));
        assert_eq!(registry.metric_value("test1.total").unwrap(), 6.0);
    }

    /// Scenario 6: once every sample has aged out, a rate reads 0.0, never NaN.
    #[test]
    fn all_samples_purged_yields_zero_not_nan() {
        let (registry, fake) = fake_registry_at_zero();
        let config = MetricConfig::builder().samples(2).time_window_ms(10_000).build().unwrap();
        let s = registry.sensor("s", &[], Some(config)).unwrap();
        s.add("s.rate", |c, now| OccurrenceRate::for_config(c, now)).unwrap();

        s.record(12_345.0).unwrap();
        advance(&fake, 1000);
        assert!((registry.metric_value("s.rate").unwrap() - 1.0).abs() < 1e-9);

        advance(&fake, 20_000);
        let value = registry.metric_value("s.rate").unwrap();
        assert_eq!(value, 0.0);
        assert!(!value.is_nan());
    }

    /// Scenario 7: percentile queries against a windowed histogram. Uses a small `event_window`
    /// (samples fill up by event count well before their time window elapses) so that a
    /// time-vs-event-count purge bug would show up as percentiles collapsing to `min` instead of
    /// tracking the recorded distribution.
    #[test]
    fn percentiles_report_quantiles_of_recorded_values() {
        let (registry, _fake) = fake_registry_at_zero();
        let config = MetricConfig::builder().samples(2).event_window(50).build().unwrap();
        let s = registry.sensor("s", &[], Some(config)).unwrap();
        registry
            .add_percentiles(
                &s,
                stats::BucketSizing::Constant,
                0.0,
                100.0,
                400,
                &[("s.p25", 25.0), ("s.p50", 50.0), ("s.p75", 75.0)],
            )
            .unwrap();

        for v in 0..100 {
            s.record(v as f64).unwrap();
        }
        let p25 = registry.metric_value("s.p25").unwrap();
        let p50 = registry.metric_value("s.p50").unwrap();
        let p75 = registry.metric_value("s.p75").unwrap();
        assert!((p25 - 25.0).abs() <= 1.0, "p25 was {p25}");
        assert!((p50 - 50.0).abs() <= 1.0, "p50 was {p50}");
        assert!((p75 - 75.0).abs() <= 1.0, "p75 was {p75}");

        for _ in 0..100 {
            s.record(0.0).unwrap();
        }
        let p25 = registry.metric_value("s.p25").unwrap();
        let p50 = registry.metric_value("s.p50").unwrap();
        let p75 = registry.metric_value("s.p75").unwrap();
        assert!((p25 - 0.0).abs() <= 1.0, "p25 was {p25}");
        assert!((p50 - 0.0).abs() <= 1.0, "p50 was {p50}");
        assert!((p75 - 0.0).abs() <= 1.0, "p75 was {p75}");
    }

    #[test]
    fn duplicate_metric_name_is_rejected() {
        let (registry, _fake) = fake_registry_at_zero();
        let s = registry.sensor("s", &[], None).unwrap();
        s.add("dup", |c, now| Avg::new(c, now)).unwrap();
        let result = s.add("dup", |c, now| Max::new(c, now));
        assert!(matches!(result, Err(MetricsError::DuplicateMetricName { .. })));
    }

    #[test]
    fn get_metric_and_metrics_snapshot_see_newly_added_stats() {
        let (registry, _fake) = fake_registry_at_zero();
        let s = registry.sensor("s", &[], None).unwrap();
        let added = s.add("s.avg", |c, now| Avg::new(c, now)).unwrap();
        assert_eq!(added.name(), "s.avg");

        let fetched = registry.get_metric("s.avg").unwrap();
        assert_eq!(fetched.name(), "s.avg");
        assert!(matches!(registry.get_metric("missing"), Err(MetricsError::MetricNotFound { .. })));

        let snapshot = registry.metrics();
        assert!(snapshot.iter().any(|m| m.name() == "s.avg"));
    }

    #[test]
    fn requesting_an_equivalent_sensor_twice_reuses_it() {
        let (registry, _fake) = fake_registry_at_zero();
        let first = registry.sensor("s", &[], None).unwrap();
        let second = registry.sensor("s", &[], None).unwrap();
        assert!(std::sync::Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn reporter_is_notified_on_metric_change() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        struct CountingReporter(Arc<AtomicUsize>);
        impl Reporter for CountingReporter {
            fn metric_change(&self, _metric: &Metric) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let (registry, _fake) = fake_registry_at_zero();
        let seen = Arc::new(AtomicUsize::new(0));
        registry.add_reporter(Box::new(CountingReporter(seen.clone())));

        let s = registry.sensor("s", &[], None).unwrap();
        s.add("s.avg", |c, now| Avg::new(c, now)).unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    /// Many threads fan in to record on the same child/parent pair concurrently; every
    /// observation must still land exactly once on each, with no lost updates from racing
    /// per-stat locks.
    #[test]
    fn concurrent_recording_from_many_threads_loses_no_updates() {
        let (registry, _fake) = fake_registry_at_zero();
        let parent = registry.sensor("parent", &[], None).unwrap();
        parent.add("parent.count", |c, now| SampledCount::new(c, now)).unwrap();
        let child = registry.sensor("child", &[&parent], None).unwrap();
        child.add("child.count", |c, now| SampledCount::new(c, now)).unwrap();

        const THREADS: usize = 8;
        const PER_THREAD: usize = 200;
        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    for _ in 0..PER_THREAD {
                        child.record_occurrence().unwrap();
                    }
                });
            }
        });

        let expected = (THREADS * PER_THREAD) as f64;
        assert_eq!(registry.metric_value("child.count").unwrap(), expected);
        assert_eq!(registry.metric_value("parent.count").unwrap(), expected);
    }
}
