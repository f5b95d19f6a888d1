//! Set worker: the polling loop of one collection set.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

use crate::error::XerError;
use crate::forwarder::Forwarder;
use crate::http::HttpClient;
use crate::instrumentation::Instruments;
use crate::poller::Poller;
use crate::set::{CollectionSet, EndpointValue, ResultBundle};

/// The worker observed a shutdown request before finishing its cycle.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("worker cancelled")]
pub struct Cancelled;

/// Event streams and shutdown signal shared by all workers of a runner.
#[derive(Debug, Clone)]
pub struct WorkerChannels {
    /// Status messages.
    pub messages: mpsc::Sender<String>,
    /// Runtime errors.
    pub errors: mpsc::Sender<XerError>,
    /// Flips to `true` when the workers should stop.
    pub shutdown: watch::Receiver<bool>,
}

/// Polls the endpoints of one set, updates the instrumentation and forwards
/// the results, forever or until shutdown.
#[derive(Debug)]
pub struct SetWorker {
    set: Arc<CollectionSet>,
    instruments: Instruments,
    poller: Poller,
    forwarder: Forwarder,
    channels: WorkerChannels,
    bundle: ResultBundle,
}

impl SetWorker {
    /// Create a worker whose poller and forwarder share `client`.
    pub fn new(
        set: Arc<CollectionSet>,
        instruments: Instruments,
        client: HttpClient,
        channels: WorkerChannels,
    ) -> Self {
        let bundle = ResultBundle::new(set.name.as_str());
        SetWorker {
            set,
            instruments,
            poller: Poller::new(client.clone()),
            forwarder: Forwarder::new(client),
            channels,
            bundle,
        }
    }

    /// Replace the poller, e.g. to change its timeout.
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Replace the forwarder, e.g. to change its timeout.
    pub fn with_forwarder(mut self, forwarder: Forwarder) -> Self {
        self.forwarder = forwarder;
        self
    }

    /// Latest results, carried over between cycles.
    pub fn bundle(&self) -> &ResultBundle {
        &self.bundle
    }

    /// Run cycles until shutdown is requested.
    ///
    /// Runtime errors never end the loop. With a frequency of zero the next
    /// cycle starts right away, after yielding to the scheduler.
    pub async fn run(mut self) {
        info!(set = %self.set.name, frequency = self.set.frequency_seconds, "Starting worker");

        loop {
            if *self.channels.shutdown.borrow() {
                break;
            }

            if self.run_cycle().await.is_err() {
                break;
            }

            let frequency = self.set.frequency();
            if frequency.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(frequency) => {}
                _ = wait_for_shutdown(&mut self.channels.shutdown) => break,
            }
        }

        debug!(set = %self.set.name, "Worker stopped");
    }

    /// Run one polling cycle: poll every endpoint, forward the bundle and
    /// report.
    ///
    /// Returns [`Cancelled`] if shutdown was requested while an event was
    /// waiting for channel capacity.
    pub async fn run_cycle(&mut self) -> Result<(), Cancelled> {
        let set = Arc::clone(&self.set);
        let started = Instant::now();

        self.message(format!("Running {}", set.name)).await?;
        self.instruments.inc_set_runs(&set.name);

        for endpoint in &set.endpoints {
            self.instruments.inc_polls(&set.name);

            match self.poller.poll(endpoint).await {
                Ok(EndpointValue::Number(v)) if !v.is_finite() => {
                    // Exposed as a gauge, but JSON cannot carry it.
                    self.instruments.record_value(&set.name, &endpoint.name, v);
                    self.bundle.remove(&endpoint.name);
                    debug!(set = %set.name, endpoint = %endpoint.name, value = v, "Not forwarding non-finite value");
                }
                Ok(value) => {
                    if let EndpointValue::Number(v) = value {
                        self.instruments.record_value(&set.name, &endpoint.name, v);
                    }
                    self.bundle.record(&endpoint.name, value);
                }
                Err(source) => {
                    self.instruments.inc_poll_errors(&set.name);
                    let aborts = source.aborts_cycle();
                    self.error(XerError::Poll {
                        set: set.name.clone(),
                        endpoint: endpoint.name.clone(),
                        source,
                    })
                    .await?;

                    if aborts {
                        debug!(set = %set.name, endpoint = %endpoint.name, "Skipping remaining endpoints");
                        break;
                    }
                }
            }
        }

        self.instruments
            .observe_scrape_time(&set.name, started.elapsed());

        match self.bundle.to_json() {
            Ok(body) => {
                let dest = &set.destination;
                if dest.is_configured() {
                    let sent = Instant::now();
                    let result = self.forwarder.send(&dest.method, &dest.url, body).await;
                    self.instruments.observe_send_time(&set.name, sent.elapsed());

                    if let Err(source) = result {
                        self.instruments.inc_send_errors(&set.name);
                        self.error(XerError::Send {
                            set: set.name.clone(),
                            source,
                        })
                        .await?;
                    }
                } else {
                    trace!(set = %set.name, "No destination, not forwarding");
                }
            }
            Err(source) => {
                self.error(XerError::Serialization {
                    set: set.name.clone(),
                    source,
                })
                .await?;
            }
        }

        self.message(format!(
            "Ran {} and now waiting {} seconds.",
            set.name, set.frequency_seconds
        ))
        .await
    }

    async fn message(&mut self, message: String) -> Result<(), Cancelled> {
        emit(
            &self.channels.messages,
            &mut self.channels.shutdown,
            message,
        )
        .await
    }

    async fn error(&mut self, error: XerError) -> Result<(), Cancelled> {
        emit(&self.channels.errors, &mut self.channels.shutdown, error).await
    }
}

// Waits for channel capacity unless shutdown is requested first. A dropped
// receiver discards the event.
pub(crate) async fn emit<T>(
    sender: &mpsc::Sender<T>,
    shutdown: &mut watch::Receiver<bool>,
    event: T,
) -> Result<(), Cancelled> {
    tokio::select! {
        result = sender.send(event) => {
            if result.is_err() {
                trace!("Event receiver dropped");
            }
            Ok(())
        }
        _ = wait_for_shutdown(shutdown) => Err(Cancelled),
    }
}

/// Resolves once the signal is `true`. Never resolves if the sender is gone
/// without having signalled.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::set::Endpoint;
    use std::time::Duration;

    fn channels(
        capacity: usize,
    ) -> (
        WorkerChannels,
        mpsc::Receiver<String>,
        mpsc::Receiver<XerError>,
        watch::Sender<bool>,
    ) {
        let (messages, messages_rx) = mpsc::channel(capacity);
        let (errors, errors_rx) = mpsc::channel(capacity);
        let (shutdown_tx, shutdown) = watch::channel(false);
        (
            WorkerChannels {
                messages,
                errors,
                shutdown,
            },
            messages_rx,
            errors_rx,
            shutdown_tx,
        )
    }

    fn worker(set: CollectionSet, channels: WorkerChannels) -> (SetWorker, Instruments) {
        let mut registry = Registry::default();
        let instruments = Instruments::register(&mut registry, &[set.clone()]).unwrap();
        let client = HttpClient::new();
        let worker = SetWorker::new(Arc::new(set), instruments.clone(), client.clone(), channels)
            .with_poller(Poller::new(client).with_timeout(Duration::from_millis(500)));
        (worker, instruments)
    }

    #[tokio::test]
    async fn cycle_without_endpoints() {
        let (channels, mut messages, _errors, _shutdown) = channels(8);
        let (mut worker, instruments) = worker(CollectionSet::new("empty", 3), channels);

        worker.run_cycle().await.unwrap();

        assert_eq!(Some("Running empty".to_string()), messages.recv().await);
        assert_eq!(
            Some("Ran empty and now waiting 3 seconds.".to_string()),
            messages.recv().await
        );
        assert_eq!(1, instruments.set_runs("empty"));
        assert_eq!(1, instruments.scrape_count("empty"));
        assert_eq!(0, instruments.send_count("empty"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_counted_and_reported() {
        let (channels, _messages, mut errors, _shutdown) = channels(8);
        let set = CollectionSet::new("down", 0)
            .with_endpoint(Endpoint::number("temp", "http://127.0.0.1:1/temp"))
            .with_endpoint(Endpoint::text("status", "http://127.0.0.1:1/status"));
        let (mut worker, instruments) = worker(set, channels);

        worker.run_cycle().await.unwrap();

        // Transport errors do not abort the cycle.
        assert_eq!(2, instruments.polls("down"));
        assert_eq!(2, instruments.poll_errors("down"));
        assert!(worker.bundle().results.is_empty());

        let err = errors.recv().await.unwrap();
        assert!(matches!(err, XerError::Poll { ref endpoint, .. } if endpoint == "temp"));
        assert_eq!(Some("down"), err.set());
    }

    #[tokio::test]
    async fn shutdown_releases_blocked_emission() {
        // Nobody reads the messages, so the second emission blocks.
        let (channels, _messages, _errors, shutdown) = channels(1);
        let (worker, instruments) = worker(CollectionSet::new("stuck", 0), channels);

        let handle = tokio::spawn(worker.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(1, instruments.set_runs("stuck"));
    }

    #[tokio::test]
    async fn shutdown_interrupts_sleep() {
        let (channels, mut messages, _errors, shutdown) = channels(8);
        let (worker, instruments) = worker(CollectionSet::new("slow", 3600), channels);

        let handle = tokio::spawn(worker.run());
        assert_eq!(Some("Running slow".to_string()), messages.recv().await);
        assert_eq!(
            Some("Ran slow and now waiting 3600 seconds.".to_string()),
            messages.recv().await
        );
        shutdown.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(1, instruments.set_runs("slow"));
    }
}
