//! Process-wide instrumentation of the collection sets.
//!
//! [`Instruments::register`] derives every metric from the configured sets
//! and registers it once. The returned handle is cloned into every worker;
//! clones share the underlying metrics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::encoding::{EncodeLabelSet, LabelSetEncoder};
use crate::metrics::counter::Counter;
use crate::metrics::family::Family;
use crate::metrics::gauge::Gauge;
use crate::metrics::summary::Summary;
use crate::registry::{Registry, RegistryError};
use crate::set::CollectionSet;

/// Name of the poll counter.
pub const POLLS: &str = "xer_total_ep_polls";
/// Name of the poll error counter.
pub const POLL_ERRORS: &str = "xer_total_set_ep_poll_errors";
/// Name of the send error counter.
pub const SEND_ERRORS: &str = "xer_total_send_poll_errors";
/// Name of the cycle counter.
pub const SET_RUNS: &str = "xer_total_set_runs";
/// Name of the polling duration summary.
pub const SCRAPE_TIME: &str = "xer_set_scrapetime";
/// Name of the forwarding duration summary.
pub const SEND_TIME: &str = "xer_set_sendtime";

const ENDPOINT_GAUGE_PREFIX: &str = "xer_ep_";
const SET_GAUGE_PREFIX: &str = "xer_set_";

/// `set="<name>"`
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SetLabels {
    /// Set name.
    pub set: String,
}

impl SetLabels {
    /// Labels of the named set.
    pub fn new(set: impl Into<String>) -> Self {
        SetLabels { set: set.into() }
    }
}

impl EncodeLabelSet for SetLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder) -> Result<(), std::fmt::Error> {
        encoder.encode_label("set", &self.set)
    }
}

/// `ep="<name>"`
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct EndpointLabels {
    /// Endpoint name.
    pub ep: String,
}

impl EndpointLabels {
    /// Labels of the named endpoint.
    pub fn new(ep: impl Into<String>) -> Self {
        EndpointLabels { ep: ep.into() }
    }
}

impl EncodeLabelSet for EndpointLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder) -> Result<(), std::fmt::Error> {
        encoder.encode_label("ep", &self.ep)
    }
}

/// Handles to every metric updated by the workers.
#[derive(Clone, Debug)]
pub struct Instruments {
    polls: Family<SetLabels, Counter>,
    poll_errors: Family<SetLabels, Counter>,
    send_errors: Family<SetLabels, Counter>,
    set_runs: Family<SetLabels, Counter>,
    scrape_time: Family<SetLabels, Summary>,
    send_time: Family<SetLabels, Summary>,
    // Keyed by endpoint name, shared by every set declaring that name.
    endpoint_gauges: Arc<HashMap<String, Family<SetLabels, Gauge>>>,
    // Keyed by set name.
    set_gauges: Arc<HashMap<String, Family<EndpointLabels, Gauge>>>,
}

impl Instruments {
    /// Create and register all metrics derived from `sets`.
    ///
    /// Fails if any derived name is already registered, which is the case
    /// when this is called twice on the same registry or when a set name
    /// collides with a fixed metric (e.g. a set named `scrapetime`).
    pub fn register(
        registry: &mut Registry,
        sets: &[CollectionSet],
    ) -> Result<Instruments, RegistryError> {
        let polls = Family::<SetLabels, Counter>::default();
        let poll_errors = Family::<SetLabels, Counter>::default();
        let send_errors = Family::<SetLabels, Counter>::default();
        let set_runs = Family::<SetLabels, Counter>::default();
        let scrape_time = Family::<SetLabels, Summary>::default();
        let send_time = Family::<SetLabels, Summary>::default();

        registry.register(POLLS, "Total endpoint polls.", polls.clone())?;
        registry.register(
            POLL_ERRORS,
            "Total endpoint poll errors.",
            poll_errors.clone(),
        )?;
        registry.register(SEND_ERRORS, "Total send errors.", send_errors.clone())?;
        registry.register(SET_RUNS, "Total set runs.", set_runs.clone())?;
        registry.register(
            SCRAPE_TIME,
            "Time in seconds spent polling the endpoints of a set.",
            scrape_time.clone(),
        )?;
        registry.register(
            SEND_TIME,
            "Time in seconds spent sending the results of a set.",
            send_time.clone(),
        )?;

        let mut endpoint_gauges = HashMap::new();
        for endpoint in sets.iter().flat_map(|s| &s.endpoints) {
            if !endpoint.is_number() || endpoint_gauges.contains_key(&endpoint.name) {
                continue;
            }

            let help = if endpoint.description.is_empty() {
                format!("Latest value of endpoint {}", endpoint.name)
            } else {
                endpoint.description.clone()
            };
            let family = Family::<SetLabels, Gauge>::default();
            registry.register(
                format!("{ENDPOINT_GAUGE_PREFIX}{}", endpoint.name),
                help,
                family.clone(),
            )?;
            endpoint_gauges.insert(endpoint.name.clone(), family);
        }

        let mut set_gauges = HashMap::new();
        for set in sets {
            let family = Family::<EndpointLabels, Gauge>::default();
            registry.register(
                format!("{SET_GAUGE_PREFIX}{}", set.name),
                format!("Latest numeric values of set {}", set.name),
                family.clone(),
            )?;
            set_gauges.insert(set.name.clone(), family);

            let labels = SetLabels::new(set.name.as_str());
            for counter in [&polls, &poll_errors, &send_errors, &set_runs] {
                counter.get_or_create(&labels);
            }
        }

        Ok(Instruments {
            polls,
            poll_errors,
            send_errors,
            set_runs,
            scrape_time,
            send_time,
            endpoint_gauges: Arc::new(endpoint_gauges),
            set_gauges: Arc::new(set_gauges),
        })
    }

    /// Count one endpoint poll attempt.
    pub fn inc_polls(&self, set: &str) {
        self.polls.get_or_create(&SetLabels::new(set)).inc();
    }

    /// Count one failed poll.
    pub fn inc_poll_errors(&self, set: &str) {
        self.poll_errors.get_or_create(&SetLabels::new(set)).inc();
    }

    /// Count one failed send.
    pub fn inc_send_errors(&self, set: &str) {
        self.send_errors.get_or_create(&SetLabels::new(set)).inc();
    }

    /// Count one started cycle.
    pub fn inc_set_runs(&self, set: &str) {
        self.set_runs.get_or_create(&SetLabels::new(set)).inc();
    }

    /// Record how long polling the endpoints of a set took.
    pub fn observe_scrape_time(&self, set: &str, elapsed: Duration) {
        self.scrape_time
            .get_or_create(&SetLabels::new(set))
            .observe(elapsed.as_secs_f64());
    }

    /// Record how long forwarding the results of a set took.
    pub fn observe_send_time(&self, set: &str, elapsed: Duration) {
        self.send_time
            .get_or_create(&SetLabels::new(set))
            .observe(elapsed.as_secs_f64());
    }

    /// Set both gauges of a successfully polled numeric endpoint.
    ///
    /// Names that were not known at registration are ignored.
    pub fn record_value(&self, set: &str, endpoint: &str, value: f64) {
        if let Some(family) = self.endpoint_gauges.get(endpoint) {
            family.get_or_create(&SetLabels::new(set)).set(value);
        }
        if let Some(family) = self.set_gauges.get(set) {
            family.get_or_create(&EndpointLabels::new(endpoint)).set(value);
        }
    }

    /// Polls counted for `set`.
    pub fn polls(&self, set: &str) -> u64 {
        counter_value(&self.polls, set)
    }

    /// Poll errors counted for `set`.
    pub fn poll_errors(&self, set: &str) -> u64 {
        counter_value(&self.poll_errors, set)
    }

    /// Send errors counted for `set`.
    pub fn send_errors(&self, set: &str) -> u64 {
        counter_value(&self.send_errors, set)
    }

    /// Cycles counted for `set`.
    pub fn set_runs(&self, set: &str) -> u64 {
        counter_value(&self.set_runs, set)
    }

    /// Number of scrape durations observed for `set`.
    pub fn scrape_count(&self, set: &str) -> u64 {
        self.scrape_time
            .get(&SetLabels::new(set))
            .map_or(0, |s| s.count())
    }

    /// Number of send durations observed for `set`.
    pub fn send_count(&self, set: &str) -> u64 {
        self.send_time
            .get(&SetLabels::new(set))
            .map_or(0, |s| s.count())
    }

    /// Value of `xer_ep_<endpoint>{set="<set>"}`, if it was ever set.
    pub fn endpoint_value(&self, endpoint: &str, set: &str) -> Option<f64> {
        self.endpoint_gauges
            .get(endpoint)?
            .get(&SetLabels::new(set))
            .map(|g| g.get())
    }

    /// Value of `xer_set_<set>{ep="<endpoint>"}`, if it was ever set.
    pub fn set_value(&self, set: &str, endpoint: &str) -> Option<f64> {
        self.set_gauges
            .get(set)?
            .get(&EndpointLabels::new(endpoint))
            .map(|g| g.get())
    }
}

fn counter_value(family: &Family<SetLabels, Counter>, set: &str) -> u64 {
    family.get(&SetLabels::new(set)).map_or(0, |c| c.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::text::encode;
    use crate::set::Endpoint;

    fn sets() -> Vec<CollectionSet> {
        vec![
            CollectionSet::new("svc-a", 5)
                .with_endpoint(
                    Endpoint::number("temp", "http://a/temp").with_description("Temperature"),
                )
                .with_endpoint(Endpoint::text("status", "http://a/status")),
            CollectionSet::new("svc-b", 5).with_endpoint(Endpoint::number("temp", "http://b/temp")),
        ]
    }

    #[test]
    fn registers_derived_names_once() {
        let mut registry = Registry::default();
        Instruments::register(&mut registry, &sets()).unwrap();

        for name in [
            POLLS,
            POLL_ERRORS,
            SEND_ERRORS,
            SET_RUNS,
            SCRAPE_TIME,
            SEND_TIME,
            "xer_ep_temp",
            "xer_set_svc-a",
            "xer_set_svc-b",
        ] {
            assert!(registry.contains(name), "{name} not registered");
        }
        assert!(!registry.contains("xer_ep_status"));
        assert_eq!(9, registry.len());
    }

    #[test]
    fn registering_twice_fails() {
        let mut registry = Registry::default();
        Instruments::register(&mut registry, &sets()).unwrap();

        assert_eq!(
            RegistryError::AlreadyRegistered(POLLS.to_string()),
            Instruments::register(&mut registry, &sets()).unwrap_err()
        );
    }

    #[test]
    fn set_name_colliding_with_fixed_metric_fails() {
        let mut registry = Registry::default();
        let err = Instruments::register(&mut registry, &[CollectionSet::new("scrapetime", 1)])
            .unwrap_err();
        assert_eq!(RegistryError::AlreadyRegistered(SCRAPE_TIME.to_string()), err);
    }

    #[test]
    fn endpoint_gauge_is_shared_across_sets() {
        let mut registry = Registry::default();
        let instruments = Instruments::register(&mut registry, &sets()).unwrap();

        instruments.record_value("svc-a", "temp", 21.5);
        instruments.record_value("svc-b", "temp", 3.0);

        assert_eq!(Some(21.5), instruments.endpoint_value("temp", "svc-a"));
        assert_eq!(Some(3.0), instruments.endpoint_value("temp", "svc-b"));
        assert_eq!(Some(21.5), instruments.set_value("svc-a", "temp"));
        assert_eq!(Some(3.0), instruments.set_value("svc-b", "temp"));
        assert_eq!(None, instruments.set_value("svc-a", "status"));
    }

    #[test]
    fn counters_exist_before_first_cycle() {
        let mut registry = Registry::default();
        let instruments = Instruments::register(&mut registry, &sets()).unwrap();

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("xer_total_set_runs{set=\"svc-a\"} 0\n"));
        assert!(buffer.contains("xer_total_ep_polls{set=\"svc-b\"} 0\n"));

        instruments.inc_set_runs("svc-a");
        let clone = instruments.clone();
        clone.inc_set_runs("svc-a");
        assert_eq!(2, instruments.set_runs("svc-a"));
    }

    #[test]
    fn help_text_falls_back_to_endpoint_name() {
        let mut registry = Registry::default();
        Instruments::register(
            &mut registry,
            &[CollectionSet::new("svc-c", 1).with_endpoint(Endpoint::number("load", "http://c"))],
        )
        .unwrap();

        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("# HELP xer_ep_load Latest value of endpoint load\n"));
    }

    #[test]
    fn durations_are_observed_in_seconds() {
        let mut registry = Registry::default();
        let instruments = Instruments::register(&mut registry, &sets()).unwrap();

        instruments.observe_scrape_time("svc-a", Duration::from_millis(250));
        assert_eq!(1, instruments.scrape_count("svc-a"));
        assert_eq!(0, instruments.send_count("svc-a"));
    }
}
