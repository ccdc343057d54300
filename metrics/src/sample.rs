// SPDX-License-Identifier: Apache-2.0

//! The windowed sample-rotation engine shared by every stat in [`crate::stats`].
//!
//! Rather than an inheritance hierarchy of "SampledStat subclasses", this crate factors the
//! rotation/purge mechanics into one generic [`SampledEngine`] and lets each stat plug in a
//! [`Kernel`] describing only how a single cell absorbs a value and how a window of cells
//! combines into one number.

/// One cell of a stat's rotating buffer.
#[derive(Clone, Debug)]
pub(crate) struct Sample<C> {
    pub(crate) cell: C,
    pub(crate) event_count: u64,
    pub(crate) window_start_ms: i64,
}

impl<C> Sample<C> {
    fn new(cell: C, now_ms: i64) -> Self {
        Self {
            cell,
            event_count: 0,
            window_start_ms: now_ms,
        }
    }
}

/// How a single stat absorbs values into a cell and combines a window of cells into a reading.
///
/// Implementors never see rotation, purging, or sample indices — [`SampledEngine`] handles all
/// of that uniformly. `Cell`'s identity value must be chosen so that a cell which has never
/// received an event contributes nothing to `combine` (e.g. `0.0` for sums, `-inf` for max,
/// `+inf` for min): this is what makes the "all samples purged" case fall out for free instead
/// of needing special-cased handling.
pub(crate) trait Kernel: Send + Sync {
    /// The per-sample accumulator.
    type Cell: Clone + Send + Sync;

    /// The value of a cell that has never absorbed an event.
    fn identity() -> Self::Cell;

    /// Fold one recorded value into a cell.
    fn update(cell: &mut Self::Cell, value: f64);

    /// Combine every cell in the current window into a single reading.
    fn combine(samples: &[Sample<Self::Cell>]) -> f64;
}

/// Fixed windowing parameters an engine is constructed with. Frozen for the engine's lifetime:
/// later changes to a sensor's [`crate::config::MetricConfig`] only affect stats allocated after
/// the change, never stats already built from the old config.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Window {
    pub(crate) samples: usize,
    pub(crate) time_window_ms: i64,
    pub(crate) event_window: u64,
}

/// The generic rotating-sample engine underlying every windowed stat.
pub(crate) struct SampledEngine<K: Kernel> {
    samples: Vec<Sample<K::Cell>>,
    current: usize,
    window: Window,
}

impl<K: Kernel> SampledEngine<K> {
    pub(crate) fn new(window: Window, now_ms: i64) -> Self {
        let samples = (0..window.samples.max(1))
            .map(|_| Sample::new(K::identity(), now_ms))
            .collect();
        Self {
            samples,
            current: 0,
            window,
        }
    }

    /// Record one event into the current sample, rotating first if the current sample's single
    /// window has elapsed.
    pub(crate) fn record(&mut self, value: f64, now_ms: i64) {
        self.maybe_rotate(now_ms);
        let sample = &mut self.samples[self.current];
        if sample.event_count == 0 {
            sample.window_start_ms = now_ms;
        }
        K::update(&mut sample.cell, value);
        sample.event_count += 1;
    }

    /// Rotation check: does the *current* sample alone exceed a single window?
    fn maybe_rotate(&mut self, now_ms: i64) {
        let rotate = {
            let sample = &self.samples[self.current];
            sample.event_count > 0
                && (sample.event_count >= self.window.event_window
                    || now_ms - sample.window_start_ms >= self.window.time_window_ms)
        };
        if rotate {
            self.current = (self.current + 1) % self.samples.len();
            self.samples[self.current] = Sample::new(K::identity(), now_ms);
        }
    }

    /// Purge check: does a sample (current or not) exceed the *whole* multi-sample window? This
    /// is the predicate that makes the "every sample expired" case return identity rather than
    /// NaN: every sample gets reset in place, and `combine` over all-identity cells is the
    /// kernel's identity value.
    ///
    /// Time-only: the event window governs rotation (`maybe_rotate`), not purging. A sample that
    /// filled up by event count is still within its time span and must stay in the combine until
    /// that span elapses.
    fn purge(&mut self, now_ms: i64) {
        let span = self.window.time_window_ms.saturating_mul(self.window.samples as i64);
        for sample in &mut self.samples {
            let expired = sample.event_count > 0 && now_ms - sample.window_start_ms > span;
            if expired {
                *sample = Sample::new(K::identity(), now_ms);
            }
        }
    }

    /// Purge stale samples, then combine what's left.
    pub(crate) fn measure(&mut self, now_ms: i64) -> f64 {
        self.purge(now_ms);
        K::combine(&self.samples)
    }

    /// The window-start timestamp of the oldest sample that has ever recorded an event, used by
    /// [`crate::stats::Rate`] to size its elapsed-time denominator. `None` if nothing has been
    /// recorded since construction (or since the last purge reset everything).
    pub(crate) fn oldest_active_window_start_ms(&self) -> Option<i64> {
        self.samples
            .iter()
            .filter(|s| s.event_count > 0)
            .map(|s| s.window_start_ms)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SumKernel;
    impl Kernel for SumKernel {
        type Cell = f64;
        fn identity() -> f64 {
            0.0
        }
        fn update(cell: &mut f64, value: f64) {
            *cell += value;
        }
        fn combine(samples: &[Sample<f64>]) -> f64 {
            samples.iter().map(|s| s.cell).sum()
        }
    }

    fn window(samples: usize, time_window_ms: i64, event_window: u64) -> Window {
        Window {
            samples,
            time_window_ms,
            event_window,
        }
    }

    #[test]
    fn sample_array_length_is_fixed() {
        let engine = SampledEngine::<SumKernel>::new(window(3, 1000, u64::MAX), 0);
        assert_eq!(engine.samples.len(), 3);
    }

    #[test]
    fn purge_resets_to_identity_without_nan() {
        let mut engine = SampledEngine::<SumKernel>::new(window(2, 1000, u64::MAX), 0);
        engine.record(5.0, 0);
        assert_eq!(engine.measure(500), 5.0);
        // advance well past the full two-window span
        assert_eq!(engine.measure(10_000), 0.0);
    }

    #[test]
    fn event_window_rotation_drops_oldest_sample() {
        // samples=2, event_window=1: every record rotates.
        let mut engine = SampledEngine::<SumKernel>::new(window(2, 30_000, 1), 0);
        engine.record(1.0, 0);
        assert_eq!(engine.measure(0), 1.0);
        engine.record(1.0, 0);
        assert_eq!(engine.measure(0), 2.0);
        // a third record rotates out the oldest sample; total count stays 2
        engine.record(1.0, 0);
        assert_eq!(engine.measure(0), 2.0);
    }

    #[test]
    fn repeated_measure_without_record_is_idempotent() {
        let mut engine = SampledEngine::<SumKernel>::new(window(2, 1000, u64::MAX), 0);
        engine.record(3.0, 0);
        assert_eq!(engine.measure(10), engine.measure(10));
    }
}
