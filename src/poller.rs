//! Endpoint poller: one GET per endpoint per cycle.

use std::time::Duration;

use crate::error::PollError;
use crate::http::HttpClient;
use crate::set::{Endpoint, EndpointType, EndpointValue};

/// Default timeout of a poll, covering connect, request and body.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// Fetches and interprets endpoint values.
#[derive(Debug, Clone)]
pub struct Poller {
    client: HttpClient,
    timeout: Duration,
}

impl Poller {
    /// Create a poller using [`DEFAULT_POLL_TIMEOUT`].
    pub fn new(client: HttpClient) -> Self {
        Poller {
            client,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// Set the per-poll timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// GET the endpoint and interpret its body according to its type.
    ///
    /// The response status is not inspected: whatever body comes back is the
    /// endpoint's value. Numeric bodies are trimmed before parsing.
    pub async fn poll(&self, endpoint: &Endpoint) -> Result<EndpointValue, PollError> {
        let response = self
            .client
            .get(&endpoint.url, self.timeout)
            .await
            .map_err(|source| PollError::Transport {
                url: endpoint.url.clone(),
                source,
            })?;

        let body = String::from_utf8_lossy(&response.body);
        tracing::trace!(
            endpoint = %endpoint.name,
            status = %response.status,
            bytes = response.body.len(),
            "Polled endpoint"
        );

        parse_body(endpoint, &body)
    }
}

/// Interpret a response body according to the endpoint type.
pub fn parse_body(endpoint: &Endpoint, body: &str) -> Result<EndpointValue, PollError> {
    match endpoint.kind {
        EndpointType::Text => Ok(EndpointValue::Text(body.to_string())),
        EndpointType::Number => {
            body.trim()
                .parse::<f64>()
                .map(EndpointValue::Number)
                .map_err(|source| PollError::Parse {
                    url: endpoint.url.clone(),
                    body: body.to_string(),
                    source,
                })
        }
    }
}
