// SPDX-License-Identifier: Apache-2.0

//! The trait every stat a sensor can hold implements, plus the generic windowed wrapper that
//! most concrete stats are built from.

use std::sync::Mutex;

use crate::sample::{Kernel, SampledEngine, Window};

/// Anything that can report a current value from a `now` timestamp.
///
/// [`crate::metric::Metric`] holds a `Arc<dyn Measurable>`; a [`Stat`] is always `Measurable`
/// too (via [`StatAsMeasurable`]), but some registered metrics — a [`crate::stats::Percentiles`]
/// query at a particular percentile, for instance — are measurable without being directly
/// recordable.
pub trait Measurable: Send + Sync {
    /// Compute the current reading as of `now_ms`.
    fn measure(&self, now_ms: i64) -> f64;
}

/// A stat attached to a sensor: absorbs recorded values and reports a windowed reading.
pub trait Stat: Send + Sync {
    /// Fold `value` into this stat's windowed state.
    fn record(&self, value: f64, now_ms: i64);

    /// Compute the current reading as of `now_ms`.
    fn measure(&self, now_ms: i64) -> f64;
}

/// Adapts an `Arc<dyn Stat>` into `Measurable` without relying on trait-object upcasting.
pub(crate) struct StatAsMeasurable(pub(crate) std::sync::Arc<dyn Stat>);

impl Measurable for StatAsMeasurable {
    fn measure(&self, now_ms: i64) -> f64 {
        self.0.measure(now_ms)
    }
}

/// A [`Stat`] built directly on the generic windowed [`SampledEngine`].
///
/// This is the shape of [`crate::stats::Avg`], [`crate::stats::Max`], [`crate::stats::Min`], and
/// [`crate::stats::SampledCount`] — each is nothing more than `SampledStat<SomeKernel>`.
pub(crate) struct SampledStat<K: Kernel> {
    engine: Mutex<SampledEngine<K>>,
}

impl<K: Kernel> SampledStat<K> {
    pub(crate) fn new(window: Window, now_ms: i64) -> Self {
        Self {
            engine: Mutex::new(SampledEngine::new(window, now_ms)),
        }
    }
}

impl<K: Kernel> Stat for SampledStat<K> {
    fn record(&self, value: f64, now_ms: i64) {
        self.engine
            .lock()
            .expect("sampled stat mutex poisoned")
            .record(value, now_ms);
    }

    fn measure(&self, now_ms: i64) -> f64 {
        self.engine
            .lock()
            .expect("sampled stat mutex poisoned")
            .measure(now_ms)
    }
}
