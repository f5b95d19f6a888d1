//! Module implementing a Prometheus metric family.
//!
//! See [`Family`] for details.

use crate::encoding::{EncodeLabelSet, EncodeMetric, MetricEncoder};

use super::{MetricType, TypedMetric};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// A set of metrics with the same name, help text and type, differentiated
/// by their label values.
///
/// Metrics are created lazily on first access of a label set. All metric
/// types of this crate are cheap handles around shared state, so
/// [`Family::get_or_create`] hands out a clone instead of holding the family
/// lock while the caller updates the metric.
///
/// ```
/// # use xer::metrics::counter::Counter;
/// # use xer::metrics::family::Family;
/// let family = Family::<Vec<(String, String)>, Counter>::default();
///
/// family.get_or_create(&vec![("set".to_owned(), "svc-a".to_owned())]).inc();
/// ```
#[derive(Debug)]
pub struct Family<S, M> {
    metrics: Arc<RwLock<HashMap<S, M>>>,
}

impl<S, M> Clone for Family<S, M> {
    fn clone(&self) -> Self {
        Family {
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: Clone + Hash + Eq, M: Default> Default for Family<S, M> {
    fn default() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<S: Clone + Hash + Eq, M: Clone + Default> Family<S, M> {
    /// Access the metric with the given label set, creating it if one does
    /// not yet exist.
    pub fn get_or_create(&self, label_set: &S) -> M {
        if let Some(metric) = self.metrics.read().get(label_set) {
            return metric.clone();
        }

        self.metrics
            .write()
            .entry(label_set.clone())
            .or_default()
            .clone()
    }

    /// Access the metric with the given label set without creating it.
    pub fn get(&self, label_set: &S) -> Option<M> {
        self.metrics.read().get(label_set).cloned()
    }

    /// Number of label sets in this family.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Whether no label set has been created yet.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

impl<S, M: TypedMetric> TypedMetric for Family<S, M> {
    const TYPE: MetricType = <M as TypedMetric>::TYPE;
}

impl<S, M> EncodeMetric for Family<S, M>
where
    S: EncodeLabelSet + Clone + Hash + Eq + std::fmt::Debug + Send + Sync,
    M: EncodeMetric + TypedMetric,
{
    fn encode(&self, mut encoder: MetricEncoder) -> Result<(), std::fmt::Error> {
        let guard = self.metrics.read();
        for (label_set, metric) in guard.iter() {
            let encoder = encoder.encode_family(label_set);
            metric.encode(encoder)?;
        }
        Ok(())
    }

    fn metric_type(&self) -> MetricType {
        M::TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::counter::Counter;
    use crate::metrics::gauge::Gauge;

    #[test]
    fn counter_family() {
        let family = Family::<Vec<(String, String)>, Counter>::default();
        let labels = vec![("set".to_string(), "svc-a".to_string())];

        family.get_or_create(&labels).inc();

        assert_eq!(1, family.get_or_create(&labels).get());
        assert_eq!(1, family.len());
    }

    #[test]
    fn get_does_not_create() {
        let family = Family::<Vec<(String, String)>, Gauge>::default();
        let labels = vec![("ep".to_string(), "temp".to_string())];

        assert!(family.get(&labels).is_none());
        assert!(family.is_empty());

        family.get_or_create(&labels).set(2.0);
        assert_eq!(Some(2.0), family.get(&labels).map(|g| g.get()));
    }

    #[test]
    fn clones_share_label_sets() {
        let family = Family::<Vec<(String, String)>, Counter>::default();
        let other = family.clone();
        let labels = vec![("set".to_string(), "svc-b".to_string())];

        other.get_or_create(&labels).inc_by(3);

        assert_eq!(Some(3), family.get(&labels).map(|c| c.get()));
    }
}
