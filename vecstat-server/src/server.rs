//! TCP server implementation.

use crate::config::Config;
use crate::connection::{ConnectionHandler, HandlerConfig};
use crate::error::ServerError;
use crate::metrics::Metrics;
use crate::session::Session;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Per-read idle timeout.
    pub idle_timeout: Duration,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest accepted declared vector length.
    pub max_vector_len: usize,
    /// How long shutdown waits for live connections.
    pub shutdown_grace: Duration,
    /// Metrics instance (if metrics are enabled).
    pub metrics: Option<Arc<Metrics>>,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_connections", &self.max_connections)
            .field("max_vector_len", &self.max_vector_len)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("metrics_enabled", &self.metrics.is_some())
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            bind_addr: config.network.bind_addr,
            idle_timeout: config.network.idle_timeout(),
            max_connections: config.network.max_connections,
            max_vector_len: config.limits.max_vector_len,
            shutdown_grace: config.network.shutdown_grace(),
            metrics: None,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the connection limit.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the largest accepted vector length.
    pub fn with_max_vector_len(mut self, max: usize) -> Self {
        self.max_vector_len = max;
        self
    }

    /// Sets the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Sets the metrics instance.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns whether metrics are enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics.is_some()
    }

    fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            max_vector_len: self.max_vector_len,
            idle_timeout: self.idle_timeout,
        }
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub requests_total: AtomicU64,
    pub errors_total: AtomicU64,
}

/// TCP server for vecstat.
pub struct Server {
    config: ServerConfig,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    running: AtomicBool,
}

impl Server {
    /// Creates a new server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            running: AtomicBool::new(false),
        }
    }

    /// Binds the configured address and runs the server.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Runs the server on an already bound listener.
    ///
    /// Returns when [`Server::shutdown`] is called, or with
    /// [`ServerError::Accept`] if accepting a connection fails. Live
    /// connections get `shutdown_grace` to finish before being aborted.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut handlers = JoinSet::new();
        let mut next_id: u64 = 0;

        let result = loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((tcp_stream, addr)) => {
                            if self.stats.connections_active.load(Ordering::Relaxed)
                                >= self.config.max_connections as u64
                            {
                                tracing::warn!("Connection limit reached, rejecting {}", addr);
                                self.stats.connections_rejected.fetch_add(1, Ordering::Relaxed);
                                continue;
                            }

                            let id = next_id;
                            next_id += 1;
                            self.spawn_handler(&mut handlers, tcp_stream, id, addr);
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                            break Err(ServerError::Accept(e));
                        }
                    }
                }
                // Reap finished handlers so the set does not grow unbounded.
                Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break Ok(());
                }
            }
        };

        drop(listener);
        self.drain(&mut handlers).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    fn spawn_handler(
        &self,
        handlers: &mut JoinSet<()>,
        tcp_stream: TcpStream,
        id: u64,
        addr: SocketAddr,
    ) {
        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);
        if let Some(ref metrics) = self.config.metrics {
            metrics.connections_total.inc();
            metrics.connections_active.inc();
        }

        if let Err(e) = tcp_stream.set_nodelay(true) {
            tracing::debug!("[{}] Failed to set TCP_NODELAY: {}", addr, e);
        }

        let stats = self.stats.clone();
        let metrics = self.config.metrics.clone();
        let handler_config = self.config.handler_config();
        let mut conn_shutdown = self.shutdown.subscribe();

        handlers.spawn(async move {
            tracing::info!("Client connected: {} (conn={})", addr, id);

            let session = Session::new(id, addr);
            let mut handler = ConnectionHandler::new(tcp_stream, session, handler_config)
                .with_metrics(metrics.clone());
            let result = handler.run(&mut conn_shutdown).await;

            let session = handler.session();
            stats
                .requests_total
                .fetch_add(session.request_count(), Ordering::Relaxed);

            match result {
                Ok(()) => {}
                Err(e) if e.is_benign() => {
                    tracing::debug!("Connection {} ended: {}", addr, e);
                }
                Err(e) => {
                    tracing::debug!("Connection {} error: {}", addr, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            if let Some(ref metrics) = metrics {
                metrics.connections_active.dec();
            }

            tracing::info!("Client disconnected: {} (conn={})", addr, id);
        });
    }

    /// Waits up to `shutdown_grace` for live handlers, then aborts the rest.
    async fn drain(&self, handlers: &mut JoinSet<()>) {
        if handlers.is_empty() {
            return;
        }

        tracing::info!("Waiting for {} connection(s) to close", handlers.len());
        let wait_all = async { while handlers.join_next().await.is_some() {} };
        if tokio::time::timeout(self.config.shutdown_grace, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "Shutdown grace period elapsed, aborting {} connection(s)",
                handlers.len()
            );
            handlers.shutdown().await;
        }
    }

    /// Initiates server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Returns whether the server is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
