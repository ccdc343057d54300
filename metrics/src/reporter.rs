// SPDX-License-Identifier: Apache-2.0

//! [`Reporter`]: the extension point a [`crate::registry::Metrics`] registry drives on every
//! metric lifecycle event.

use crate::metric::Metric;

/// Observes metric registration, removal, and (optionally) periodic export.
///
/// All three hooks run synchronously on the calling thread, inside a `catch_unwind` guard in
/// [`crate::registry::Metrics`] — a panicking reporter is logged and otherwise ignored, so one
/// broken reporter can't take down the registry or whichever sensor triggered the change.
pub trait Reporter: Send + Sync {
    /// Called once, immediately after this reporter is registered, with every metric that
    /// already existed at that point.
    fn init(&self, metrics: &[&Metric]) {
        let _ = metrics;
    }

    /// Called whenever a new metric is registered, or an existing one's config changes.
    fn metric_change(&self, metric: &Metric);

    /// Called when a metric is removed from the registry.
    fn metric_removal(&self, metric: &Metric) {
        let _ = metric;
    }

    /// Called when the owning registry is shut down.
    fn close(&self) {}
}
