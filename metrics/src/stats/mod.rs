// SPDX-License-Identifier: Apache-2.0

//! Concrete stats a sensor can hold.
//!
//! [`Avg`], [`Max`], [`Min`], and [`SampledCount`] are thin wrappers over
//! [`crate::stat::SampledStat`] with a different [`crate::sample::Kernel`] plugged in. [`Total`]
//! opts out of windowing entirely. [`Rate`]/[`OccurrenceRate`] and [`Percentiles`] need a bit
//! more than a kernel can express and get their own modules.

mod kernels;
mod percentiles;
mod rate;
mod total;

pub use percentiles::{BucketSizing, PercentileQuery, PercentileRecorder, Percentiles};
pub use rate::{OccurrenceRate, Rate};
pub use total::Total;

use crate::config::MetricConfig;
use crate::sample::Window;
use crate::stat::{SampledStat, Stat};

use kernels::{AvgKernel, CountKernel, MaxKernel, MinKernel};

pub(crate) fn window_from(config: &MetricConfig) -> Window {
    Window {
        samples: config.samples(),
        time_window_ms: config.time_window_ms(),
        event_window: config.event_window(),
    }
}

macro_rules! sampled_stat {
    ($name:ident, $kernel:ty, $doc:literal) => {
        #[doc = $doc]
        pub struct $name(SampledStat<$kernel>);

        impl $name {
            /// Build a new stat sized from `config`, frozen at construction time.
            pub fn new(config: &MetricConfig, now_ms: i64) -> Self {
                Self(SampledStat::new(window_from(config), now_ms))
            }
        }

        impl Stat for $name {
            fn record(&self, value: f64, now_ms: i64) {
                self.0.record(value, now_ms);
            }

            fn measure(&self, now_ms: i64) -> f64 {
                self.0.measure(now_ms)
            }
        }
    };
}

sampled_stat!(Avg, AvgKernel, "The windowed mean of recorded values.");
sampled_stat!(Max, MaxKernel, "The windowed maximum of recorded values.");
sampled_stat!(Min, MinKernel, "The windowed minimum of recorded values.");
sampled_stat!(
    SampledCount,
    CountKernel,
    "The windowed count of recorded events, irrespective of their values."
);

impl Rate {
    /// Build a rate over the sum of recorded values, windowed and sized from `config`.
    pub fn for_config(config: &MetricConfig, now_ms: i64) -> Self {
        Self::new(window_from(config), config.rate_unit(), now_ms)
    }
}

impl OccurrenceRate {
    /// Build a rate over the count of recorded events, windowed and sized from `config`.
    pub fn for_config(config: &MetricConfig, now_ms: i64) -> Self {
        Self::occurrences(window_from(config), config.rate_unit(), now_ms)
    }
}
