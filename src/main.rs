use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use tollgate::config::TollgateConfig;
use tollgate::http::{AppState, HttpServer, MemoryDirectory};
use tollgate::throttle::ThrottleGate;

#[derive(Parser, Debug)]
#[command(name = "tollgate", about = "Request throttling service", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured listen address
    #[arg(short, long)]
    listen: Option<std::net::SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    info!("Starting Tollgate Request Throttling Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = match args.config.as_deref() {
        Some(path) => TollgateConfig::from_file(path)?,
        None => TollgateConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen_addr = listen;
    }
    info!(listen_addr = %config.server.listen_addr, "Configuration loaded");

    let gate = Arc::new(ThrottleGate::new(&config));
    info!(
        max_requests = config.rate_limit.max_requests,
        window_ms = config.rate_limit.window_ms,
        max_attempts = config.tracker.max_attempts,
        base_block_ms = config.tracker.base_block_ms,
        "Throttle gate initialized"
    );

    if config.server.sweep_interval_secs > 0 {
        spawn_sweeper(
            gate.clone(),
            Duration::from_secs(config.server.sweep_interval_secs),
        );
    }

    let state = AppState {
        gate,
        directory: Arc::new(MemoryDirectory::new()),
        lookup_timeout: config.lookup.timeout(),
    };

    let server = HttpServer::new(config.server.listen_addr, state);
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Tollgate Request Throttling Service stopped");
    Ok(())
}

/// Periodically evict stale throttle records so an attacker rotating IPs
/// cannot grow the maps without bound.
fn spawn_sweeper(gate: Arc<ThrottleGate>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = gate.sweep();
            if evicted > 0 {
                debug!(evicted, "Swept stale throttle records");
            }
        }
    });
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
