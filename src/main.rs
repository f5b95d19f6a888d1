use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use xer::{server, Config, Runner, XerError};

/// Polls HTTP endpoints in named sets, exposes their values as Prometheus
/// metrics and forwards them as JSON.
#[derive(Debug, Parser)]
#[command(name = "xn2", version, about)]
struct Cli {
    /// Port of the metrics server.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Enable debug logging.
    #[arg(long, env = "DEBUG", default_value_t = false)]
    debug: bool,

    /// Path to the YAML list of collection sets. Empty means no sets.
    #[arg(long, env = "CONFIG", default_value = "")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = if cli.config.is_empty() {
        tracing::warn!("No config file given, running without collection sets");
        Config::default()
    } else {
        Config::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config))?
    };

    let runner = Runner::from_config(&config).context("creating runner")?;
    let registry = runner.registry();
    let (messages, errors, mut workers) = runner.run().into_parts();
    let consumer = tokio::spawn(log_events(messages, errors));

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, sets = config.sets.len(), "Serving metrics on /metrics");

    server::serve(listener, registry, shutdown_signal())
        .await
        .context("metrics server")?;

    tracing::info!("Shutting down workers");
    workers.shutdown().await;
    if let Err(e) = consumer.await {
        tracing::warn!(error = %e, "Event consumer failed");
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn log_events(mut messages: mpsc::Receiver<String>, mut errors: mpsc::Receiver<XerError>) {
    loop {
        tokio::select! {
            Some(message) = messages.recv() => tracing::info!("{message}"),
            Some(error) = errors.recv() => tracing::error!(set = error.set().unwrap_or_default(), "{error}"),
            else => break,
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Listening for Ctrl+C failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Listening for SIGTERM failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
