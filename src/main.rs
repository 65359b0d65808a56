//! tron-events daemon.
//!
//! # Usage
//!
//! ```bash
//! # Start with defaults (node on localhost, redis on localhost)
//! tron-events
//!
//! # Start with a config file and environment overrides
//! TRON_EVENTS__REDIS__ADDR=redis:6379 tron-events --config config.yaml
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tron_events::config::Config;
use tron_events::service::Service;

/// TRON block ingestion daemon.
#[derive(Parser, Debug)]
#[command(name = "tron-events")]
#[command(about = "Ingests TRON blocks and publishes normalized transaction events")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, short = 'c', env = "TRON_EVENTS_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (debug, info, error).
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let log_level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    init_tracing(&log_level);

    if let Some(addr) = &config.metrics_addr {
        init_metrics(addr);
    }

    info!(
        node_url = %config.tron.node_url,
        redis_addr = %config.redis.addr,
        prefix = %config.redis.prefix,
        workers = config.queue.max_workers,
        "Starting tron-events daemon"
    );

    let service = Service::connect(&config)
        .await
        .context("Startup failed")?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    service.run(cancel).await;

    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber; `RUST_LOG` wins over the configured
/// level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Prometheus exporter; failures don't crash the daemon.
fn init_metrics(addr: &str) {
    match addr.parse::<std::net::SocketAddr>() {
        Ok(addr) => match PrometheusBuilder::new().with_http_listener(addr).install() {
            Ok(()) => info!(%addr, "Metrics exporter listening"),
            Err(e) => warn!(error = %e, "Failed to start metrics exporter, continuing without"),
        },
        Err(e) => warn!(error = %e, "Invalid metrics address, continuing without metrics"),
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
