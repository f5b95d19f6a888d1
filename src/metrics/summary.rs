//! Module implementing a Prometheus summary.
//!
//! See [`Summary`] for details.

use crate::encoding::{EncodeMetric, MetricEncoder};

use super::{MetricType, TypedMetric};
use parking_lot::RwLock;
use quantiles::ckms::CKMS;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Quantiles reported by [`Summary::default`].
pub const DEFAULT_QUANTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// Sliding window reported by [`Summary::default`].
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10 * 60);

/// Number of streams the window of [`Summary::default`] is split into.
pub const DEFAULT_AGE_BUCKETS: usize = 5;

/// Allowed rank error of the quantile estimates of [`Summary::default`].
pub const DEFAULT_ERROR: f64 = 0.01;

/// Prometheus [`Summary`] to measure distributions of discrete events, e.g.
/// durations.
///
/// Sum and count cover every observation since creation. Quantiles only cover
/// the sliding window given by `max_age`: observations are fed into
/// `age_buckets` CKMS streams, the oldest of which answers queries and is
/// reset every `max_age / age_buckets`.
///
/// ```
/// # use xer::metrics::summary::Summary;
/// let summary = Summary::default();
/// summary.observe(0.25);
/// assert_eq!(1, summary.count());
/// ```
#[derive(Clone)]
pub struct Summary {
    quantiles: Arc<[f64]>,
    error: f64,
    stream_duration: Duration,
    inner: Arc<RwLock<Inner>>,
}

struct Inner {
    sum: f64,
    count: u64,
    streams: Vec<CKMS<f64>>,
    // Index of the oldest stream, the one answering quantile queries.
    head: usize,
    last_rotated: Instant,
}

impl Summary {
    /// Create a new [`Summary`].
    ///
    /// Quantiles outside of `[0, 1]` are dropped.
    pub fn new(quantiles: &[f64], max_age: Duration, age_buckets: usize, error: f64) -> Self {
        let age_buckets = bucket_count(age_buckets);
        let quantiles: Vec<f64> = quantiles
            .iter()
            .copied()
            .filter(|q| (0.0..=1.0).contains(q))
            .collect();

        Summary {
            quantiles: quantiles.into(),
            error,
            stream_duration: max_age / age_buckets,
            inner: Arc::new(RwLock::new(Inner {
                sum: 0.0,
                count: 0,
                streams: (0..age_buckets).map(|_| CKMS::new(error)).collect(),
                head: 0,
                last_rotated: Instant::now(),
            })),
        }
    }

    /// Observe the given value.
    pub fn observe(&self, v: f64) {
        let mut inner = self.inner.write();
        self.rotate(&mut inner);

        inner.sum += v;
        inner.count += 1;
        for stream in inner.streams.iter_mut() {
            stream.insert(v);
        }
    }

    /// Number of observations so far.
    pub fn count(&self) -> u64 {
        self.inner.read().count
    }

    /// Sum of all observations so far.
    pub fn sum(&self) -> f64 {
        self.inner.read().sum
    }

    /// Retrieve sum, count and the `(quantile, value)` pairs of the summary.
    ///
    /// A quantile over an empty window is reported as `NaN`.
    pub fn get(&self) -> (f64, u64, Vec<(f64, f64)>) {
        let mut inner = self.inner.write();
        self.rotate(&mut inner);

        let head = &inner.streams[inner.head];
        let quantiles = self
            .quantiles
            .iter()
            .map(|q| match head.query(*q) {
                Some((_, v)) => (*q, v),
                None => (*q, f64::NAN),
            })
            .collect();

        (inner.sum, inner.count, quantiles)
    }

    fn rotate(&self, inner: &mut Inner) {
        if self.stream_duration.is_zero() {
            return;
        }

        let buckets = inner.streams.len();
        let elapsed = inner.last_rotated.elapsed();
        let window = self
            .stream_duration
            .checked_mul(bucket_count(buckets));
        if window.is_some_and(|window| elapsed >= window) {
            // Idle for longer than the whole window.
            for stream in inner.streams.iter_mut() {
                *stream = CKMS::new(self.error);
            }
            inner.head = 0;
            inner.last_rotated = Instant::now();
            return;
        }

        while inner.last_rotated.elapsed() >= self.stream_duration {
            let head = inner.head;
            inner.streams[head] = CKMS::new(self.error);
            inner.head = (head + 1) % buckets;
            inner.last_rotated += self.stream_duration;
        }
    }
}

// Number of age buckets, at least one and small enough to divide a
// `Duration` by.
fn bucket_count(age_buckets: usize) -> u32 {
    u32::try_from(age_buckets).unwrap_or(u32::MAX).max(1)
}

impl Default for Summary {
    fn default() -> Self {
        Summary::new(
            &DEFAULT_QUANTILES,
            DEFAULT_MAX_AGE,
            DEFAULT_AGE_BUCKETS,
            DEFAULT_ERROR,
        )
    }
}

impl std::fmt::Debug for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Summary")
            .field("quantiles", &self.quantiles)
            .field("sum", &inner.sum)
            .field("count", &inner.count)
            .finish_non_exhaustive()
    }
}

impl TypedMetric for Summary {
    const TYPE: MetricType = MetricType::Summary;
}

impl EncodeMetric for Summary {
    fn encode(&self, mut encoder: MetricEncoder) -> Result<(), std::fmt::Error> {
        let (sum, count, quantiles) = self.get();
        encoder.encode_summary(sum, count, &quantiles)
    }

    fn metric_type(&self) -> MetricType {
        Self::TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary() {
        let summary = Summary::new(&[0.5, 0.9, 0.99], Duration::from_secs(10), 5, 0.01);
        summary.observe(1.0);
        summary.observe(5.0);
        summary.observe(10.0);

        let (s, c, q) = summary.get();
        assert_eq!(16.0, s);
        assert_eq!(3, c);
        assert_eq!(vec![(0.5, 5.0), (0.9, 10.0), (0.99, 10.0)], q);
    }

    #[test]
    fn empty_window_reports_nan() {
        let summary = Summary::default();
        let (s, c, q) = summary.get();
        assert_eq!(0.0, s);
        assert_eq!(0, c);
        assert_eq!(3, q.len());
        assert!(q.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn out_of_range_quantiles_are_dropped() {
        let summary = Summary::new(&[0.5, 1.5, -0.1], Duration::from_secs(10), 2, 0.01);
        summary.observe(3.0);
        let (_, _, q) = summary.get();
        assert_eq!(vec![(0.5, 3.0)], q);
    }

    #[test]
    fn bucket_count_never_truncates_to_zero() {
        assert_eq!(1, bucket_count(0));
        assert_eq!(5, bucket_count(5));
        assert_eq!(u32::MAX, bucket_count(u32::MAX as usize));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(u32::MAX, bucket_count(1usize << 32));
    }

    #[test]
    fn window_expires_but_totals_remain() {
        let summary = Summary::new(&[0.5], Duration::from_millis(20), 2, 0.01);
        summary.observe(7.0);
        std::thread::sleep(Duration::from_millis(50));

        let (s, c, q) = summary.get();
        assert_eq!(7.0, s);
        assert_eq!(1, c);
        assert!(q[0].1.is_nan());
    }
}
