//! Local HTTP server standing in for sensors and sinks.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode};
use axum::routing::{any, get};
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// A request received by the sink.
#[derive(Clone, Debug)]
pub struct Received {
    pub method: Method,
    pub body: Bytes,
}

#[derive(Debug, Default)]
pub struct Hits {
    pub status: AtomicUsize,
    pub flaky: AtomicUsize,
    pub sink: Mutex<Vec<Received>>,
}

/// Running fake server.
#[derive(Debug)]
pub struct Fake {
    pub addr: SocketAddr,
    pub hits: Arc<Hits>,
}

impl Fake {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn received(&self) -> Vec<Received> {
        self.hits.sink.lock().clone()
    }

    pub fn status_hits(&self) -> usize {
        self.hits.status.load(Ordering::SeqCst)
    }
}

/// Start a server with the routes:
///
/// - `GET /temp`: `21.5`
/// - `GET /spaced`: ` 7\n`
/// - `GET /bad`: `not-a-number`
/// - `GET /nan`: `NaN`
/// - `GET /status`: `ok`
/// - `GET /flaky`: `1` on the first request, `oops` afterwards
/// - `/sink`: records method and body, answers 200
/// - `/fail`: answers 503
pub async fn start() -> Fake {
    let hits = Arc::new(Hits::default());

    let app = Router::new()
        .route("/temp", get(|| async { "21.5" }))
        .route("/spaced", get(|| async { " 7\n" }))
        .route("/bad", get(|| async { "not-a-number" }))
        .route("/nan", get(|| async { "NaN" }))
        .route("/status", get(status))
        .route("/flaky", get(flaky))
        .route("/sink", any(sink))
        .route("/fail", any(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .with_state(hits.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Fake { addr, hits }
}

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn status(State(hits): State<Arc<Hits>>) -> &'static str {
    hits.status.fetch_add(1, Ordering::SeqCst);
    "ok"
}

async fn flaky(State(hits): State<Arc<Hits>>) -> &'static str {
    if hits.flaky.fetch_add(1, Ordering::SeqCst) == 0 {
        "1"
    } else {
        "oops"
    }
}

async fn sink(State(hits): State<Arc<Hits>>, method: Method, body: Bytes) -> StatusCode {
    hits.sink.lock().push(Received { method, body });
    StatusCode::OK
}
