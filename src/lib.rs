#![deny(dead_code)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

//! Continuous collection of HTTP endpoint values.
//!
//! A [`CollectionSet`] names a group of endpoints that are polled every
//! `frequency` seconds. Each numeric value is exposed as Prometheus gauges and
//! the latest values of a set are forwarded as one JSON document to the set's
//! destination. Every set runs in its own worker; the [`Runner`] launches
//! them and reports their status and errors on two event streams.
//!
//! # Examples
//!
//! ```no_run
//! use xer::encoding::text::encode;
//! use xer::{CollectionSet, Destination, Endpoint, Runner};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let set = CollectionSet::new("svc-a", 5)
//!     .with_endpoint(Endpoint::number("temp", "http://sensor/temp"))
//!     .with_destination(Destination::new("POST", "http://sink/x"));
//!
//! let runner = Runner::new(vec![set])?;
//! let registry = runner.registry();
//! let mut handle = runner.run();
//!
//! // Consume both streams, otherwise the workers stall.
//! tokio::spawn(async move {
//!     loop {
//!         tokio::select! {
//!             Some(message) = handle.messages.recv() => println!("{message}"),
//!             Some(error) = handle.errors.recv() => eprintln!("{error}"),
//!             else => break,
//!         }
//!     }
//! });
//!
//! let mut buffer = String::new();
//! encode(&mut buffer, &registry)?;
//! println!("{buffer}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod forwarder;
pub mod http;
pub mod instrumentation;
pub mod metrics;
pub mod poller;
pub mod registry;
pub mod runner;
pub mod server;
pub mod set;
pub mod worker;

pub use config::{Config, ConfigError};
pub use error::{PollError, SendError, XerError};
pub use instrumentation::Instruments;
pub use registry::{Registry, RegistryError};
pub use runner::{RunHandle, Runner, Shutdown, DEFAULT_EVENT_CAPACITY};
pub use set::{CollectionSet, Destination, Endpoint, EndpointType, EndpointValue, ResultBundle};
