//! Runner: launches one worker per collection set.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{validate_sets, Config};
use crate::error::XerError;
use crate::forwarder::{Forwarder, DEFAULT_SEND_TIMEOUT};
use crate::http::HttpClient;
use crate::instrumentation::Instruments;
use crate::poller::{Poller, DEFAULT_POLL_TIMEOUT};
use crate::registry::Registry;
use crate::set::CollectionSet;
use crate::worker::{emit, SetWorker, WorkerChannels};

/// Default capacity of the message and error streams.
///
/// Workers wait for capacity before continuing, so a consumer that falls
/// behind slows every worker down.
pub const DEFAULT_EVENT_CAPACITY: usize = 1;

/// Owns the collection sets and their instrumentation.
///
/// ```no_run
/// # async fn run() -> Result<(), xer::XerError> {
/// use xer::{CollectionSet, Endpoint, Runner};
///
/// let set = CollectionSet::new("svc-a", 5)
///     .with_endpoint(Endpoint::number("temp", "http://sensor/temp"));
/// let runner = Runner::new(vec![set])?;
/// let registry = runner.registry();
///
/// let mut handle = runner.run();
/// while let Some(message) = handle.messages.recv().await {
///     println!("{message}");
/// }
/// # drop(registry);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Runner {
    sets: Vec<Arc<CollectionSet>>,
    registry: Arc<Registry>,
    instruments: Instruments,
    event_capacity: usize,
    poll_timeout: Duration,
    send_timeout: Duration,
}

impl Runner {
    /// Validate `sets` and register their instrumentation in a fresh
    /// registry.
    pub fn new(sets: Vec<CollectionSet>) -> Result<Runner, XerError> {
        validate_sets(&sets)?;

        let mut registry = Registry::default();
        let instruments = Instruments::register(&mut registry, &sets)?;

        Ok(Runner {
            sets: sets.into_iter().map(Arc::new).collect(),
            registry: Arc::new(registry),
            instruments,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        })
    }

    /// Build a runner from a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Runner, XerError> {
        Self::new(config.sets.clone())
    }

    /// Capacity of the message and error streams. Zero is raised to one.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Timeout of each endpoint poll.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Timeout of each send.
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Registry holding the instrumentation, for exposition.
    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Handle to the instrumentation updated by the workers.
    pub fn instruments(&self) -> Instruments {
        self.instruments.clone()
    }

    /// Launch one worker per set.
    ///
    /// Reports `Run: <set>` for every launched set and `Done...` once all are
    /// launched. The streams of the returned handle close when every worker
    /// has exited: right after `Done...` without sets, after
    /// [`RunHandle::shutdown`] otherwise.
    pub fn run(self) -> RunHandle {
        let (messages_tx, messages) = mpsc::channel(self.event_capacity);
        let (errors_tx, errors) = mpsc::channel(self.event_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client = HttpClient::new();
        let channels = WorkerChannels {
            messages: messages_tx,
            errors: errors_tx,
            shutdown: shutdown_rx,
        };

        let supervisor = tokio::spawn(supervise(
            self.sets,
            self.instruments,
            client,
            self.poll_timeout,
            self.send_timeout,
            channels,
        ));

        RunHandle {
            messages,
            errors,
            shutdown: Shutdown {
                signal: shutdown_tx,
                supervisor: Some(supervisor),
            },
        }
    }
}

// Spawns the workers, reports progress and waits for all of them. The
// channel senders held here are dropped as soon as reporting is done, so the
// streams close with the last worker.
async fn supervise(
    sets: Vec<Arc<CollectionSet>>,
    instruments: Instruments,
    client: HttpClient,
    poll_timeout: Duration,
    send_timeout: Duration,
    mut channels: WorkerChannels,
) {
    let mut workers = Vec::with_capacity(sets.len());

    for set in sets {
        let name = set.name.clone();
        let worker = SetWorker::new(set, instruments.clone(), client.clone(), channels.clone())
            .with_poller(Poller::new(client.clone()).with_timeout(poll_timeout))
            .with_forwarder(Forwarder::new(client.clone()).with_timeout(send_timeout));
        workers.push(tokio::spawn(worker.run()));

        info!(set = %name, "Launched worker");
        let run = format!("Run: {name}");
        if emit(&channels.messages, &mut channels.shutdown, run).await.is_err() {
            break;
        }
    }

    let done = "Done...".to_string();
    let _ = emit(&channels.messages, &mut channels.shutdown, done).await;
    drop(channels);

    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker task failed");
        }
    }
}

/// Event streams and control of a running [`Runner`].
#[derive(Debug)]
pub struct RunHandle {
    /// Status messages of the runner and its workers.
    pub messages: mpsc::Receiver<String>,
    /// Runtime errors of the workers.
    pub errors: mpsc::Receiver<XerError>,
    shutdown: Shutdown,
}

impl RunHandle {
    /// Ask every worker to stop without waiting for them.
    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Stop every worker and wait until all have exited.
    ///
    /// Events queued before the workers stopped can still be drained from
    /// the streams, which are closed once this returns.
    pub async fn shutdown(&mut self) {
        self.shutdown.shutdown().await;
    }

    /// Split into the two streams and the shutdown control, e.g. to consume
    /// the streams on another task.
    pub fn into_parts(self) -> (mpsc::Receiver<String>, mpsc::Receiver<XerError>, Shutdown) {
        (self.messages, self.errors, self.shutdown)
    }
}

/// Stops the workers of a running [`Runner`].
#[derive(Debug)]
pub struct Shutdown {
    signal: watch::Sender<bool>,
    supervisor: Option<JoinHandle<()>>,
}

impl Shutdown {
    /// Ask every worker to stop without waiting for them.
    pub fn trigger(&self) {
        self.signal.send_replace(true);
    }

    /// Stop every worker and wait until all have exited.
    pub async fn shutdown(&mut self) {
        self.trigger();

        if let Some(supervisor) = self.supervisor.take() {
            if let Err(e) = supervisor.await {
                warn!(error = %e, "Runner task failed");
            }
            info!("All workers stopped");
        }
    }
}
