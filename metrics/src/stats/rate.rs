// SPDX-License-Identifier: Apache-2.0

//! [`Rate`] and [`OccurrenceRate`]: a windowed sum or event count normalized by elapsed time.

use std::marker::PhantomData;
use std::sync::Mutex;

use crate::config::RateUnit;
use crate::sample::{SampledEngine, Window};
use crate::stat::Stat;

use super::kernels::{CountKernel, SumKernel};

/// `sum(values) / elapsed_time`, normalized to [`RateUnit`].
///
/// The elapsed-time denominator is the time since the oldest sample that still has data,
/// floored at one millisecond so a rate measured immediately after the very first record never
/// divides by zero. When every sample has purged (nothing recorded in a full window span), the
/// numerator is the kernel's identity (`0.0`), so the reported rate is `0.0` regardless of the
/// denominator — never `NaN`.
pub struct Rate<K = SumKernel> {
    engine: Mutex<SampledEngine<K>>,
    rate_unit: RateUnit,
    _kernel: PhantomData<K>,
}

impl Rate<SumKernel> {
    /// A rate over the sum of recorded values (the default kind of `Rate`).
    pub fn new(window: Window, rate_unit: RateUnit, now_ms: i64) -> Self {
        Self {
            engine: Mutex::new(SampledEngine::new(window, now_ms)),
            rate_unit,
            _kernel: PhantomData,
        }
    }
}

impl Rate<CountKernel> {
    /// A rate over the count of recorded events rather than their sum — this is what
    /// [`OccurrenceRate`] is built from.
    pub fn occurrences(window: Window, rate_unit: RateUnit, now_ms: i64) -> Self {
        Self {
            engine: Mutex::new(SampledEngine::new(window, now_ms)),
            rate_unit,
            _kernel: PhantomData,
        }
    }
}

impl<K: crate::sample::Kernel> Stat for Rate<K> {
    fn record(&self, value: f64, now_ms: i64) {
        self.engine
            .lock()
            .expect("rate mutex poisoned")
            .record(value, now_ms);
    }

    fn measure(&self, now_ms: i64) -> f64 {
        let mut engine = self.engine.lock().expect("rate mutex poisoned");
        let value = engine.measure(now_ms);
        let elapsed_ms = match engine.oldest_active_window_start_ms() {
            Some(oldest) => (now_ms - oldest).max(1),
            None => 1,
        };
        value / (elapsed_ms as f64 / self.rate_unit.as_millis())
    }
}

/// `count(events) / elapsed_time`: how often a sensor is recorded to, rather than the sum of
/// what it's recorded with.
pub type OccurrenceRate = Rate<CountKernel>;

#[cfg(test)]
mod tests {
    use super::*;

    fn window(samples: usize, time_window_ms: i64) -> Window {
        Window {
            samples,
            time_window_ms,
            event_window: u64::MAX,
        }
    }

    #[test]
    fn rate_uses_actual_elapsed_time_not_the_configured_window() {
        // default-shaped config: samples=2, time_window_ms=30_000
        let rate = Rate::<SumKernel>::new(window(2, 30_000), RateUnit::Seconds, 0);
        for v in 0..10 {
            rate.record(v as f64, 0);
        }
        // 2000ms later, with nothing rotated: sum(0..10)=45, elapsed=2s -> 22.5
        assert!((rate.measure(2000) - 22.5).abs() < 1e-9);
    }

    #[test]
    fn occurrence_rate_is_events_per_second() {
        let rate = OccurrenceRate::occurrences(window(2, 10_000), RateUnit::Seconds, 0);
        rate.record(12_345.0, 0);
        assert!((rate.measure(1000) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rate_after_full_purge_is_zero_not_nan() {
        let rate = OccurrenceRate::occurrences(window(2, 10_000), RateUnit::Seconds, 0);
        rate.record(1.0, 0);
        assert!((rate.measure(1000) - 1.0).abs() < 1e-9);
        let value = rate.measure(21_000);
        assert_eq!(value, 0.0);
        assert!(!value.is_nan());
    }
}
