// SPDX-License-Identifier: Apache-2.0

//! [`Kernel`] implementations for the additive/extremal stats. Each one is a couple of lines;
//! all the rotation and purge machinery lives in [`crate::sample`].

use crate::sample::{Kernel, Sample};

pub(crate) struct SumKernel;

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

pub(crate) struct MaxKernel;

impl Kernel for MaxKernel {
    type Cell = f64;

    fn identity() -> f64 {
        f64::NEG_INFINITY
    }

    fn update(cell: &mut f64, value: f64) {
        if value > *cell {
            *cell = value;
        }
    }

    fn combine(samples: &[Sample<f64>]) -> f64 {
        samples.iter().fold(f64::NEG_INFINITY, |acc, s| acc.max(s.cell))
    }
}

pub(crate) struct MinKernel;

impl Kernel for MinKernel {
    type Cell = f64;

    fn identity() -> f64 {
        f64::INFINITY
    }

    fn update(cell: &mut f64, value: f64) {
        if value < *cell {
            *cell = value;
        }
    }

    fn combine(samples: &[Sample<f64>]) -> f64 {
        samples.iter().fold(f64::INFINITY, |acc, s| acc.min(s.cell))
    }
}

/// Running mean. Reuses each sample's own `event_count` as the per-sample divisor instead of
/// tracking a parallel count in the cell.
pub(crate) struct AvgKernel;

impl Kernel for AvgKernel {
    type Cell = f64;

    fn identity() -> f64 {
        0.0
    }

    fn update(cell: &mut f64, value: f64) {
        *cell += value;
    }

    fn combine(samples: &[Sample<f64>]) -> f64 {
        let sum: f64 = samples.iter().map(|s| s.cell).sum();
        let count: u64 = samples.iter().map(|s| s.event_count).sum();
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Counts recorded events; the value passed to `record` is irrelevant.
pub(crate) struct CountKernel;

impl Kernel for CountKernel {
    type Cell = ();

    fn identity() {}

    fn update(_cell: &mut (), _value: f64) {}

    fn combine(samples: &[Sample<()>]) -> f64 {
        samples.iter().map(|s| s.event_count).sum::<u64>() as f64
    }
}
