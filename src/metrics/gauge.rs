//! Module implementing a Prometheus gauge.
//!
//! See [`Gauge`] for details.

use crate::encoding::{EncodeMetric, MetricEncoder};

use super::{MetricType, TypedMetric};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prometheus [`Gauge`] to record current measurements.
///
/// Stores an [`f64`] as its bit pattern in an [`AtomicU64`], so setting and
/// reading never takes a lock.
///
/// ```
/// # use xer::metrics::gauge::Gauge;
/// let gauge = Gauge::default();
/// gauge.set(21.5);
/// assert_eq!(21.5, gauge.get());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    value: Arc<AtomicU64>,
}

impl Gauge {
    /// Sets the [`Gauge`] to `v`, returning the previous value.
    pub fn set(&self, v: f64) -> f64 {
        f64::from_bits(self.value.swap(v.to_bits(), Ordering::Relaxed))
    }

    /// Get the current value of the [`Gauge`].
    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }
}

impl TypedMetric for Gauge {
    const TYPE: MetricType = MetricType::Gauge;
}

impl EncodeMetric for Gauge {
    fn encode(&self, mut encoder: MetricEncoder) -> Result<(), std::fmt::Error> {
        encoder.encode_gauge(self.get())
    }

    fn metric_type(&self) -> MetricType {
        Self::TYPE
    }
}
