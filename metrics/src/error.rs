// SPDX-License-Identifier: Apache-2.0

//! The error surface for this crate.
//!
//! Modeled after this codebase's `ValidationError`/`IoStreamError`: a plain enum with hand-rolled
//! `Display`/`Debug`, no `thiserror` dependency. Errors here are never on the hot path, so it's
//! fine for them to allocate (e.g. to build a message).

use std::fmt;

use crate::quota::Quota;

/// Every way a call into this crate can fail.
#[derive(Debug, Clone)]
pub enum MetricsError {
    /// `add` / `add_metric` was called with a name that's already registered.
    DuplicateMetricName {
        /// The name that was already taken.
        name: String,
    },
    /// A sensor's quota was violated by a recorded value.
    ///
    /// The observation that triggered this error has already been persisted; see
    /// [`crate::sensor::Sensor::record`].
    QuotaViolation {
        /// The metric whose quota was violated.
        metric: String,
        /// The configured bound.
        quota: Quota,
        /// The value that was recorded.
        value: f64,
    },
    /// `sensor(name, parents, ..)` would introduce a forbidden diamond in the sensor DAG, or
    /// conflicts with an already-registered sensor of the same name.
    IllegalSensorHierarchy {
        /// A human-readable explanation of which sensors conflict and why.
        reason: String,
    },
    /// `get_metric` was called with a name that isn't registered.
    MetricNotFound {
        /// The name that was looked up.
        name: String,
    },
    /// A `MetricConfig` or `Percentiles` constructor was given out-of-range parameters.
    InvalidConfig {
        /// A human-readable explanation of which parameter was invalid.
        reason: String,
    },
}

impl fmt::Display for MetricsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateMetricName { name } => {
                write!(f, "a metric or sensor named `{name}` is already registered")
            }
            Self::QuotaViolation {
                metric,
                quota,
                value,
            } => write!(
                f,
                "metric `{metric}` violated its quota ({quota:?}): recorded value {value}"
            ),
            Self::IllegalSensorHierarchy { reason } => {
                write!(f, "illegal sensor hierarchy: {reason}")
            }
            Self::MetricNotFound { name } => write!(f, "no metric named `{name}` is registered"),
            Self::InvalidConfig { reason } => write!(f, "invalid metric config: {reason}"),
        }
    }
}

impl std::error::Error for MetricsError {}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, MetricsError>;
