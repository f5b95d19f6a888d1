//! Error types.
//!
//! Runtime errors ([`PollError`], [`SendError`], serialization failures) never
//! stop a worker. They are counted under the owning set and emitted as an
//! [`XerError`] on the runner's error stream. Startup errors ([`ConfigError`],
//! [`RegistryError`]) are returned from [`Runner::new`](crate::Runner::new).

use thiserror::Error;

use crate::config::ConfigError;
use crate::registry::RegistryError;

/// Boxed error used for transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to poll one endpoint.
#[derive(Debug, Error)]
pub enum PollError {
    /// Connection failure, invalid URL, timeout or body read failure.
    #[error("GET {url} failed: {source}")]
    Transport {
        /// Endpoint URL.
        url: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Body of a numeric endpoint is not a float.
    #[error("cannot parse {body:?} from {url} as a number: {source}")]
    Parse {
        /// Endpoint URL.
        url: String,
        /// Offending body.
        body: String,
        /// Underlying failure.
        #[source]
        source: std::num::ParseFloatError,
    },

    /// Failure releasing the response body.
    #[error("closing response body of {url} failed: {source}")]
    BodyClose {
        /// Endpoint URL.
        url: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

impl PollError {
    /// Whether the remaining endpoints of the cycle are skipped after this
    /// error.
    pub fn aborts_cycle(&self) -> bool {
        matches!(self, PollError::Parse { .. })
    }
}

/// Failure to forward a result bundle.
#[derive(Debug, Error)]
pub enum SendError {
    /// Connection failure, invalid method or URL, or timeout.
    #[error("{method} {url} failed: {source}")]
    Transport {
        /// Request method.
        method: String,
        /// Destination URL.
        url: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },

    /// Destination answered with a status other than 200.
    #[error("non-200 response from {url}, got {status}")]
    BadStatus {
        /// Destination URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Failure releasing the response body.
    #[error("closing response body of {url} failed: {source}")]
    BodyClose {
        /// Destination URL.
        url: String,
        /// Underlying failure.
        #[source]
        source: BoxError,
    },
}

/// Errors reported by the runner.
#[derive(Debug, Error)]
pub enum XerError {
    /// Polling an endpoint failed.
    #[error("set {set}: endpoint {endpoint}: {source}")]
    Poll {
        /// Owning set.
        set: String,
        /// Endpoint name.
        endpoint: String,
        /// Underlying failure.
        #[source]
        source: PollError,
    },

    /// Forwarding the bundle failed.
    #[error("set {set}: {source}")]
    Send {
        /// Owning set.
        set: String,
        /// Underlying failure.
        #[source]
        source: SendError,
    },

    /// The result bundle could not be encoded; forwarding was skipped.
    #[error("set {set}: encoding results failed: {source}")]
    Serialization {
        /// Owning set.
        set: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Conflicting metric names.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl XerError {
    /// Name of the set the error belongs to, if any.
    pub fn set(&self) -> Option<&str> {
        match self {
            XerError::Poll { set, .. }
            | XerError::Send { set, .. }
            | XerError::Serialization { set, .. } => Some(set),
            XerError::Config(_) | XerError::Registry(_) => None,
        }
    }
}
