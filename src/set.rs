//! Collection set model.
//!
//! A [`CollectionSet`] names a group of [`Endpoint`]s that are polled together
//! every `frequency` seconds and forwarded as one [`ResultBundle`] to its
//! [`Destination`]. Sets are loaded once and never mutated afterwards.

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// How an endpoint's response body is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    /// Raw body, forwarded as a JSON string.
    #[default]
    Text,
    /// Body parsed as a float, forwarded as a JSON number and exposed as
    /// gauges.
    Number,
}

/// One data source within a set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Key in the result bundle and fragment of the `xer_ep_<name>` metric.
    pub name: String,
    /// Help text of the endpoint's gauge family.
    #[serde(default)]
    pub description: String,
    /// URL to GET.
    pub url: String,
    /// Body interpretation.
    #[serde(default, rename = "type")]
    pub kind: EndpointType,
}

impl Endpoint {
    /// Create a text endpoint.
    pub fn text(name: impl Into<String>, url: impl Into<String>) -> Self {
        Endpoint {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            kind: EndpointType::Text,
        }
    }

    /// Create a numeric endpoint.
    pub fn number(name: impl Into<String>, url: impl Into<String>) -> Self {
        Endpoint {
            kind: EndpointType::Number,
            ..Endpoint::text(name, url)
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether the endpoint is numeric.
    pub fn is_number(&self) -> bool {
        self.kind == EndpointType::Number
    }
}

/// Where a set's results are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Target URL.
    #[serde(default)]
    pub url: String,
    /// HTTP method, e.g. `POST` or `PUT`.
    #[serde(default)]
    pub method: String,
}

impl Destination {
    /// Create a destination.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Destination {
            url: url.into(),
            method: method.into(),
        }
    }

    /// Forwarding only happens when both URL and method are set.
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.method.is_empty()
    }
}

/// One named, independently scheduled collection task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSet {
    /// Unique set name, used as the `set` label and in `xer_set_<name>`.
    pub name: String,
    /// Seconds to wait between two polling cycles.
    #[serde(default, rename = "frequency")]
    pub frequency_seconds: u64,
    /// Endpoints, polled in this order.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// Forwarding target.
    #[serde(default, rename = "dest")]
    pub destination: Destination,
}

impl CollectionSet {
    /// Create a set without endpoints or destination.
    pub fn new(name: impl Into<String>, frequency_seconds: u64) -> Self {
        CollectionSet {
            name: name.into(),
            frequency_seconds,
            endpoints: Vec::new(),
            destination: Destination::default(),
        }
    }

    /// Append an endpoint.
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Set the destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Pause between two cycles.
    pub fn frequency(&self) -> Duration {
        Duration::from_secs(self.frequency_seconds)
    }

    /// Check the invariants a set must hold before any metric is derived
    /// from it.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("set name cannot be empty".to_string());
        }
        if !is_set_name(&self.name) {
            return Err(format!(
                "set name '{}' may only contain ASCII letters, digits, '_', ':' and '-'",
                self.name
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.name.is_empty() {
                return Err(format!("set '{}': endpoint name cannot be empty", self.name));
            }
            if !is_metric_name_fragment(&endpoint.name) {
                return Err(format!(
                    "set '{}': endpoint name '{}' may only contain ASCII letters, digits, '_' and ':'",
                    self.name, endpoint.name
                ));
            }
            if !seen.insert(endpoint.name.as_str()) {
                return Err(format!(
                    "set '{}': duplicate endpoint name '{}'",
                    self.name, endpoint.name
                ));
            }
        }

        Ok(())
    }
}

/// Whether `s` can name a set. Like a metric name fragment, plus `-`, which
/// ends up verbatim in `xer_set_<name>`.
pub fn is_set_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '-')
}

/// Whether `s` can be appended to a metric name prefix.
pub fn is_metric_name_fragment(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Value of one endpoint in a [`ResultBundle`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EndpointValue {
    /// Parsed body of a numeric endpoint.
    Number(f64),
    /// Raw body of a text endpoint.
    Text(String),
}

// JSON has no representation for NaN and infinities; refuse them instead of
// silently sending `null`.
impl Serialize for EndpointValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EndpointValue::Number(n) if !n.is_finite() => Err(S::Error::custom(format!(
                "unsupported value {n}: not a finite number"
            ))),
            EndpointValue::Number(n) => serializer.serialize_f64(*n),
            EndpointValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl From<f64> for EndpointValue {
    fn from(v: f64) -> Self {
        EndpointValue::Number(v)
    }
}

impl From<String> for EndpointValue {
    fn from(v: String) -> Self {
        EndpointValue::Text(v)
    }
}

impl From<&str> for EndpointValue {
    fn from(v: &str) -> Self {
        EndpointValue::Text(v.to_string())
    }
}

/// Latest value of every endpoint of a set, as forwarded to the destination.
///
/// The bundle lives as long as its worker: values survive failed polls of
/// later cycles until a successful poll overwrites them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    /// Owning set.
    pub name: String,
    /// Endpoint name to latest value.
    pub results: BTreeMap<String, EndpointValue>,
}

impl ResultBundle {
    /// Create an empty bundle for the named set.
    pub fn new(name: impl Into<String>) -> Self {
        ResultBundle {
            name: name.into(),
            results: BTreeMap::new(),
        }
    }

    /// Store the latest value of an endpoint.
    pub fn record(&mut self, endpoint: &str, value: EndpointValue) {
        self.results.insert(endpoint.to_string(), value);
    }

    /// Drop the value of an endpoint, e.g. one that cannot be encoded.
    pub fn remove(&mut self, endpoint: &str) -> Option<EndpointValue> {
        self.results.remove(endpoint)
    }

    /// Latest value of an endpoint, if it was ever polled successfully.
    pub fn get(&self, endpoint: &str) -> Option<&EndpointValue> {
        self.results.get(endpoint)
    }

    /// Encode the bundle as the JSON payload sent to destinations.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
