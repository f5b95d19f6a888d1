//! Module implementing a Prometheus counter.
//!
//! See [`Counter`] for details.

use crate::encoding::{EncodeMetric, MetricEncoder};

use super::{MetricType, TypedMetric};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prometheus [`Counter`] to measure discrete events.
///
/// Single monotonically increasing value metric. Clones share the same
/// underlying value, so a counter can be handed to any number of workers and
/// incremented concurrently.
///
/// ```
/// # use xer::metrics::counter::Counter;
/// let counter = Counter::default();
/// counter.inc();
/// assert_eq!(1, counter.get());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Increase the [`Counter`] by 1, returning the previous value.
    pub fn inc(&self) -> u64 {
        self.inc_by(1)
    }

    /// Increase the [`Counter`] by `v`, returning the previous value.
    pub fn inc_by(&self, v: u64) -> u64 {
        self.value.fetch_add(v, Ordering::Relaxed)
    }

    /// Get the current value of the [`Counter`].
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

impl TypedMetric for Counter {
    const TYPE: MetricType = MetricType::Counter;
}

impl EncodeMetric for Counter {
    fn encode(&self, mut encoder: MetricEncoder) -> Result<(), std::fmt::Error> {
        encoder.encode_counter(self.get())
    }

    fn metric_type(&self) -> MetricType {
        Self::TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inc_and_get() {
        let counter = Counter::default();
        assert_eq!(0, counter.inc());
        assert_eq!(1, counter.get());
        assert_eq!(1, counter.inc_by(41));
        assert_eq!(42, counter.get());
    }

    #[test]
    fn clones_share_state() {
        let counter = Counter::default();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.inc();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(4000, counter.get());
    }
}
