//! HTTP client shared by the poller and the forwarder.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};

use crate::error::BoxError;

/// Pooled HTTP/1.1 and HTTPS client.
///
/// Cloning is cheap and clones share the connection pool, so one client is
/// built per runner and handed to every worker.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
}

/// Status and fully read body of a response.
#[derive(Debug)]
pub struct HttpResponse {
    /// Response status.
    pub status: StatusCode,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpClient {
    /// Create a client.
    pub fn new() -> Self {
        HttpClient {
            inner: Client::new(),
        }
    }

    /// Send one request and read the whole response body, all within
    /// `timeout`.
    ///
    /// The response body is consumed on every path, so the connection goes
    /// back to the pool or is closed before this returns.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        content_type: Option<&str>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<HttpResponse, BoxError> {
        let mut request = self.inner.request(method, url).timeout(timeout);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, body })
    }

    /// GET `url`.
    pub async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, BoxError> {
        self.execute(Method::GET, url, None, Vec::new(), timeout)
            .await
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}
