//! HTTP server exposing the registry for scraping.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::encoding::text::{self, encode};
use crate::registry::Registry;

/// Router serving `GET /metrics`, with every request logged.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(registry)
        .layer(middleware::from_fn(log_request))
}

/// Serve [`router`] on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn metrics_handler(State(registry): State<Arc<Registry>>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &registry) {
        tracing::error!(error = %e, "Encoding metrics failed");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    ([(CONTENT_TYPE, text::CONTENT_TYPE)], Body::from(buffer)).into_response()
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_us = started.elapsed().as_micros() as u64,
        "Request"
    );
    response
}
