//! vecstat - vector aggregate server
//!
//! A TCP server computing max, min, median and mode over integer vectors.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use vecstat_server::metrics::run_metrics_server;
use vecstat_server::{Config, Metrics, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if VECSTAT_CONFIG is set, then env overrides)
    let config_path = std::env::var("VECSTAT_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            tracing::warn!("Invalid configuration ({}), using defaults", e);
            Config::default()
        }
    };

    tracing::info!("Starting vecstat server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Idle timeout: {}s", config.network.idle_timeout_secs);
    tracing::info!("  Max connections: {}", config.network.max_connections);
    tracing::info!("  Max vector length: {}", config.limits.max_vector_len);

    let mut server_config = ServerConfig::from(&config);

    let (metrics_shutdown_tx, _) = broadcast::channel::<()>(1);
    let metrics_handle = if config.metrics.enabled {
        let metrics = Arc::new(Metrics::new()?);
        server_config = server_config.with_metrics(metrics.clone());

        let addr = config.metrics.bind_addr;
        let shutdown_rx = metrics_shutdown_tx.subscribe();
        tracing::info!("  Metrics: enabled ({})", addr);
        Some(tokio::spawn(async move {
            if let Err(e) = run_metrics_server(addr, metrics, shutdown_rx).await {
                tracing::error!("Metrics server error: {}", e);
            }
        }))
    } else {
        tracing::info!("  Metrics: disabled");
        None
    };

    let server = Arc::new(Server::new(server_config));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    let shutdown_metrics = metrics_shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
        let _ = shutdown_metrics.send(());
    });

    // Run server (blocks until shutdown or a fatal accept error)
    let result = server.run().await;

    let _ = metrics_shutdown_tx.send(());
    if let Some(handle) = metrics_handle {
        let _ = handle.await;
    }

    let stats = server.stats();
    tracing::info!(
        "Server stopped ({} connection(s), {} request(s) served)",
        stats
            .connections_total
            .load(std::sync::atomic::Ordering::Relaxed),
        stats.requests_total.load(std::sync::atomic::Ordering::Relaxed)
    );

    result.map_err(Into::into)
}
