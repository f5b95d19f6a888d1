//! Exposition format implementations.

use crate::metrics::MetricType;
use std::ops::Deref;

pub mod text;

pub use text::{LabelSetEncoder, MetricEncoder};

/// Trait implemented by each metric type, e.g.
/// [`Counter`](crate::metrics::counter::Counter), to implement its encoding in
/// the Prometheus text format.
pub trait EncodeMetric: std::fmt::Debug + Send + Sync {
    /// Encode the given instance.
    fn encode(&self, encoder: MetricEncoder) -> Result<(), std::fmt::Error>;

    /// The Prometheus metric type of the instance.
    // One can not use [`TypedMetric`](crate::metrics::TypedMetric) directly,
    // as associated constants are not object safe.
    fn metric_type(&self) -> MetricType;
}

impl EncodeMetric for Box<dyn EncodeMetric> {
    fn encode(&self, encoder: MetricEncoder) -> Result<(), std::fmt::Error> {
        self.deref().encode(encoder)
    }

    fn metric_type(&self) -> MetricType {
        self.deref().metric_type()
    }
}

/// An encodable label set.
pub trait EncodeLabelSet {
    /// Encode oneself into the given encoder.
    fn encode(&self, encoder: &mut LabelSetEncoder) -> Result<(), std::fmt::Error>;
}

impl EncodeLabelSet for () {
    fn encode(&self, _encoder: &mut LabelSetEncoder) -> Result<(), std::fmt::Error> {
        Ok(())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> EncodeLabelSet for [(K, V)] {
    fn encode(&self, encoder: &mut LabelSetEncoder) -> Result<(), std::fmt::Error> {
        for (key, value) in self.iter() {
            encoder.encode_label(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }
}

impl<K: AsRef<str>, V: AsRef<str>> EncodeLabelSet for Vec<(K, V)> {
    fn encode(&self, encoder: &mut LabelSetEncoder) -> Result<(), std::fmt::Error> {
        self.as_slice().encode(encoder)
    }
}
