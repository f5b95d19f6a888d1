//! Forwarder: sends an encoded result bundle to a destination.

use std::time::Duration;

use reqwest::{Method, StatusCode};

use crate::error::{BoxError, SendError};
use crate::http::HttpClient;

/// Default timeout of a send, covering connect, request and response body.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(1);

const JSON_CONTENT_TYPE: &str = "application/json";

/// Delivers result bundles. One attempt per call, no retry.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: HttpClient,
    timeout: Duration,
}

impl Forwarder {
    /// Create a forwarder using [`DEFAULT_SEND_TIMEOUT`].
    pub fn new(client: HttpClient) -> Self {
        Forwarder {
            client,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// Set the per-send timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `body` as JSON with the given method. Anything but `200 OK` is a
    /// failure.
    pub async fn send(&self, method: &str, url: &str, body: Vec<u8>) -> Result<(), SendError> {
        let transport = |source: BoxError| SendError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source,
        };

        let parsed = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| transport(e.into()))?;

        let response = self
            .client
            .execute(
                parsed,
                url,
                Some(JSON_CONTENT_TYPE),
                body,
                self.timeout,
            )
            .await
            .map_err(transport)?;

        if response.status != StatusCode::OK {
            return Err(SendError::BadStatus {
                url: url.to_string(),
                status: response.status.as_u16(),
            });
        }

        Ok(())
    }
}
