//! Metric registry implementation.
//!
//! See [`Registry`] for details.

use crate::encoding::EncodeMetric;
use thiserror::Error;

/// Errors returned by [`Registry::register`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A metric with the same name was registered before.
    #[error("metric {0:?} is already registered")]
    AlreadyRegistered(String),
}

/// A metric registry.
///
/// Metrics are registered once via [`Registry::register`], after which the
/// registry only hands them to an encoder. Registering a name twice is an
/// error, so callers have to derive collision-free names up front.
///
/// Registration needs `&mut self`; once built, the registry is typically
/// wrapped in an [`Arc`](std::sync::Arc) and shared read-only, with updates
/// flowing through the metric handles themselves.
///
/// ```
/// # use xer::encoding::text::encode;
/// # use xer::metrics::counter::Counter;
/// # use xer::metrics::gauge::Gauge;
/// # use xer::registry::Registry;
/// #
/// let mut registry = Registry::default();
///
/// let counter = Counter::default();
/// let gauge = Gauge::default();
///
/// registry.register("my_counter", "This is my counter", counter.clone()).unwrap();
/// registry.register("my_gauge", "This is my gauge", gauge.clone()).unwrap();
/// assert!(registry.register("my_gauge", "Again", gauge).is_err());
///
/// let mut buffer = String::new();
/// encode(&mut buffer, &registry).unwrap();
///
/// let expected = "# HELP my_counter This is my counter\n".to_owned() +
///                "# TYPE my_counter counter\n" +
///                "my_counter 0\n" +
///                "# HELP my_gauge This is my gauge\n" +
///                "# TYPE my_gauge gauge\n" +
///                "my_gauge 0.0\n";
/// assert_eq!(expected, buffer);
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    metrics: Vec<(Descriptor, Box<dyn EncodeMetric>)>,
}

impl Registry {
    /// Register a metric with the [`Registry`].
    pub fn register<N: Into<String>, H: Into<String>>(
        &mut self,
        name: N,
        help: H,
        metric: impl EncodeMetric + 'static,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        let descriptor = Descriptor {
            name,
            help: help.into(),
        };
        self.metrics.push((descriptor, Box::new(metric)));
        Ok(())
    }

    /// Whether a metric with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.metrics.iter().any(|(d, _)| d.name == name)
    }

    /// Number of registered metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Whether no metric is registered.
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Iterate the registered metrics in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Descriptor, &dyn EncodeMetric)> {
        self.metrics
            .iter()
            .map(|(descriptor, metric)| (descriptor, metric.as_ref()))
    }
}

/// Metric descriptor: name and help text.
#[derive(Debug, Clone)]
pub struct Descriptor {
    name: String,
    help: String,
}

impl Descriptor {
    /// Returns the name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the help text of the metric.
    pub fn help(&self) -> &str {
        &self.help
    }
}
