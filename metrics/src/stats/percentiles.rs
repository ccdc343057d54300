// SPDX-License-Identifier: Apache-2.0

//! [`Percentiles`]: a windowed histogram queried at one or more quantiles.
//!
//! Bucket count is a runtime parameter (chosen per histogram), which doesn't fit
//! [`crate::sample::Kernel`]'s zero-sized-type shape, so this module keeps its own small
//! rotate/purge loop over `Vec<u64>` cells rather than going through [`crate::sample::SampledEngine`].
//! The rotate/purge predicates themselves are identical to the generic engine's.

use std::sync::{Arc, Mutex};

use crate::error::{MetricsError, Result};
use crate::sample::Window;
use crate::stat::{Measurable, Stat};

/// How bucket boundaries are spaced across `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketSizing {
    /// Every bucket spans the same width: `boundary(i) = min + i * (max - min) / buckets`.
    Constant,
    /// Bucket widths grow with `k`, giving finer resolution near `min`:
    /// `boundary(k) = min + (max - min) * k(k+1) / (buckets(buckets+1))`.
    Linear,
}

impl BucketSizing {
    /// Fraction of `[min, max]` covered by boundaries `0..=i`.
    fn boundary_fraction(self, i: usize, buckets: usize) -> f64 {
        match self {
            Self::Constant => i as f64 / buckets as f64,
            Self::Linear => (i * (i + 1)) as f64 / (buckets * (buckets + 1)) as f64,
        }
    }

    fn boundary(self, i: usize, buckets: usize, min: f64, max: f64) -> f64 {
        min + (max - min) * self.boundary_fraction(i, buckets)
    }

    /// Which bucket index does `value` fall into, given `value` is already clamped to `[min, max]`.
    ///
    /// Walks boundaries in order rather than inverting the (quadratic, for `Linear`) boundary
    /// formula directly — `buckets` is small enough in practice that this is cheap, and it keeps
    /// bucket lookup and boundary computation using the exact same formula.
    fn bucket_of(self, value: f64, buckets: usize, min: f64, max: f64) -> usize {
        if max <= min {
            return 0;
        }
        let t = ((value - min) / (max - min)).clamp(0.0, 1.0);
        for k in 0..buckets {
            if self.boundary_fraction(k + 1, buckets) > t {
                return k;
            }
        }
        buckets - 1
    }
}

struct HistogramSample {
    counts: Vec<u64>,
    event_count: u64,
    window_start_ms: i64,
}

impl HistogramSample {
    fn empty(buckets: usize, now_ms: i64) -> Self {
        Self {
            counts: vec![0; buckets],
            event_count: 0,
            window_start_ms: now_ms,
        }
    }
}

struct HistogramEngine {
    samples: Vec<HistogramSample>,
    current: usize,
    buckets: usize,
    window: Window,
}

impl HistogramEngine {
    fn new(buckets: usize, window: Window, now_ms: i64) -> Self {
        let samples = (0..window.samples.max(1))
            .map(|_| HistogramSample::empty(buckets, now_ms))
            .collect();
        Self {
            samples,
            current: 0,
            buckets,
            window,
        }
    }

    fn record(&mut self, bucket: usize, now_ms: i64) {
        let rotate = {
            let s = &self.samples[self.current];
            s.event_count > 0
                && (s.event_count >= self.window.event_window
                    || now_ms - s.window_start_ms >= self.window.time_window_ms)
        };
        if rotate {
            self.current = (self.current + 1) % self.samples.len();
            self.samples[self.current] = HistogramSample::empty(self.buckets, now_ms);
        }
        let s = &mut self.samples[self.current];
        if s.event_count == 0 {
            s.window_start_ms = now_ms;
        }
        s.counts[bucket] += 1;
        s.event_count += 1;
    }

    /// Time-only, like [`crate::sample::SampledEngine`]'s purge: the event window governs
    /// rotation, not purging, so a sample that filled up by event count stays in the combine
    /// until its time span actually elapses.
    fn purge(&mut self, now_ms: i64) {
        let span = self.window.time_window_ms.saturating_mul(self.window.samples as i64);
        for s in &mut self.samples {
            let expired = s.event_count > 0 && now_ms - s.window_start_ms > span;
            if expired {
                *s = HistogramSample::empty(self.buckets, now_ms);
            }
        }
    }

    fn combined_counts(&mut self, now_ms: i64) -> Vec<u64> {
        self.purge(now_ms);
        let mut total = vec![0u64; self.buckets];
        for s in &self.samples {
            for (acc, c) in total.iter_mut().zip(s.counts.iter()) {
                *acc += c;
            }
        }
        total
    }
}

/// A windowed histogram, queryable at arbitrary quantiles.
pub struct Percentiles {
    engine: Mutex<HistogramEngine>,
    buckets: usize,
    min: f64,
    max: f64,
    sizing: BucketSizing,
}

impl Percentiles {
    /// Build a new histogram. `buckets` must be at least 1 and `max` must be greater than `min`.
    pub fn new(
        sizing: BucketSizing,
        min: f64,
        max: f64,
        buckets: usize,
        window: Window,
        now_ms: i64,
    ) -> Result<Arc<Self>> {
        if buckets == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "percentile histogram must have at least one bucket".into(),
            });
        }
        if max <= min {
            return Err(MetricsError::InvalidConfig {
                reason: "percentile histogram max must be greater than min".into(),
            });
        }
        Ok(Arc::new(Self {
            engine: Mutex::new(HistogramEngine::new(buckets, window, now_ms)),
            buckets,
            min,
            max,
            sizing,
        }))
    }

    fn record(&self, value: f64, now_ms: i64) {
        let clamped = value.clamp(self.min, self.max);
        let bucket = self.sizing.bucket_of(clamped, self.buckets, self.min, self.max);
        self.engine
            .lock()
            .expect("percentiles mutex poisoned")
            .record(bucket, now_ms);
    }

    /// Query the value at quantile `q` (0.0..=100.0) as of `now_ms`. An empty histogram (nothing
    /// recorded, or everything purged) reports `min`.
    fn query(&self, q: f64, now_ms: i64) -> f64 {
        let combined = self
            .engine
            .lock()
            .expect("percentiles mutex poisoned")
            .combined_counts(now_ms);
        let total_count: u64 = combined.iter().sum();
        if total_count == 0 {
            return self.min;
        }
        let threshold = (q / 100.0) * total_count as f64;
        let mut cumulative = 0u64;
        for (i, &count) in combined.iter().enumerate() {
            cumulative += count;
            if cumulative as f64 >= threshold {
                let lo = self.sizing.boundary(i, self.buckets, self.min, self.max);
                let hi = self.sizing.boundary(i + 1, self.buckets, self.min, self.max);
                return (lo + hi) / 2.0;
            }
        }
        self.max
    }
}

/// A [`Stat`] that records into a shared [`Percentiles`] histogram.
///
/// Returned by [`crate::sensor::Sensor::add_percentiles`] alongside the per-quantile
/// [`PercentileQuery`] views; recording through this handle feeds every view at once.
pub struct PercentileRecorder(pub(crate) Arc<Percentiles>);

impl Stat for PercentileRecorder {
    fn record(&self, value: f64, now_ms: i64) {
        self.0.record(value, now_ms);
    }

    fn measure(&self, now_ms: i64) -> f64 {
        // the recorder itself reports the median; per-quantile readings go through `PercentileQuery`.
        self.0.query(50.0, now_ms)
    }
}

/// A read-only view of one quantile of a shared [`Percentiles`] histogram.
pub struct PercentileQuery {
    histogram: Arc<Percentiles>,
    quantile: f64,
}

impl PercentileQuery {
    pub(crate) fn new(histogram: Arc<Percentiles>, quantile: f64) -> Self {
        Self { histogram, quantile }
    }
}

impl Measurable for PercentileQuery {
    fn measure(&self, now_ms: i64) -> f64 {
        self.histogram.query(self.quantile, now_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window {
            samples: 1,
            time_window_ms: 60_000,
            event_window: u64::MAX,
        }
    }

    #[test]
    fn empty_histogram_reports_min() {
        let hist = Percentiles::new(BucketSizing::Constant, 0.0, 100.0, 10, window(), 0).unwrap();
        assert_eq!(hist.query(50.0, 0), 0.0);
    }

    #[test]
    fn constant_buckets_find_the_median() {
        let hist = Percentiles::new(BucketSizing::Constant, 0.0, 100.0, 100, window(), 0).unwrap();
        for v in 0..100 {
            hist.record(v as f64, 0);
        }
        let p50 = hist.query(50.0, 0);
        assert!((40.0..=60.0).contains(&p50), "p50 was {p50}");
    }

    #[test]
    fn values_outside_range_are_clamped_into_edge_buckets() {
        let hist = Percentiles::new(BucketSizing::Constant, 0.0, 100.0, 10, window(), 0).unwrap();
        hist.record(-50.0, 0);
        hist.record(5000.0, 0);
        let p100 = hist.query(100.0, 0);
        assert!(p100 <= 100.0);
    }

    #[test]
    fn linear_sizing_gives_finer_resolution_near_min() {
        let low_res = Percentiles::new(BucketSizing::Linear, 0.0, 100.0, 10, window(), 0).unwrap();
        low_res.record(5.0, 0);
        low_res.record(5.0, 0);
        low_res.record(95.0, 0);
        let p50 = low_res.query(50.0, 0);
        assert!(p50 < 50.0, "p50 was {p50}");
    }

    #[test]
    fn rejects_invalid_range_and_bucket_count() {
        assert!(Percentiles::new(BucketSizing::Constant, 10.0, 10.0, 5, window(), 0).is_err());
        assert!(Percentiles::new(BucketSizing::Constant, 0.0, 10.0, 0, window(), 0).is_err());
    }
}
