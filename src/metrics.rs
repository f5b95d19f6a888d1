//! Metric type implementations.

pub mod counter;
pub mod family;
pub mod gauge;
pub mod summary;

/// A metric that is aware of its Prometheus metric type.
pub trait TypedMetric {
    /// The Prometheus metric type.
    const TYPE: MetricType = MetricType::Unknown;
}

/// Prometheus metric type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum MetricType {
    Counter,
    Gauge,
    Summary,
    Unknown,
}

impl MetricType {
    /// Returns the given metric type's str representation.
    pub fn as_str(&self) -> &str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Summary => "summary",
            MetricType::Unknown => "untyped",
        }
    }
}
