//! Connection management.

use crate::error::ClientError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use vecstat_protocol::{Encoder, Response, RESPONSE_SIZE};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout, covering both the write and the response read.
    pub request_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// A connection to a vecstat server.
///
/// The protocol has no request ids, so requests are strictly sequential:
/// the stream lock is held from the write of a request until its response
/// has been read.
pub struct Connection {
    config: ConnectionConfig,
    stream: Mutex<Option<TcpStream>>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Returns the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let tcp_stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        tcp_stream.set_nodelay(true).ok();

        *self.stream.lock().await = Some(tcp_stream);
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("Connected to {}", self.config.addr);

        Ok(())
    }

    /// Sends a request and waits for its response.
    ///
    /// An error status is returned as a normal [`Response`]; only transport
    /// and codec failures are errors here. After a timeout or I/O failure the
    /// stream position is unknown, so the connection is dropped.
    pub async fn request(&self, command: i64, values: &[i64]) -> Result<Response, ClientError> {
        if !self.connected.load(Ordering::SeqCst) {
            tracing::debug!("request() called but not connected");
            return Err(ClientError::NotConnected);
        }

        let encoded = Encoder::encode_request(command, values)?;

        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(ClientError::NotConnected)?;

        tracing::debug!(
            "Sending command={} with {} value(s) ({} bytes)",
            command,
            values.len(),
            encoded.len()
        );

        let exchange = async {
            stream.write_all(&encoded).await?;
            let mut buf = [0u8; RESPONSE_SIZE];
            stream.read_exact(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        let raw = match tokio::time::timeout(self.config.request_timeout, exchange).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::debug!("Request failed: {}", e);
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                return Err(if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    ClientError::ConnectionClosed
                } else {
                    ClientError::Io(e)
                });
            }
            Err(_) => {
                tracing::debug!("Request timed out");
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                return Err(ClientError::Timeout);
            }
        };

        let response = Response::decode(&raw)?;
        tracing::debug!(
            "Response: status={} result={}",
            response.status_code(),
            response.result()
        );
        Ok(response)
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        tracing::debug!("Closing connection...");
        self.connected.store(false, Ordering::SeqCst);

        if let Some(mut stream) = self.stream.lock().await.take() {
            let _ = stream.shutdown().await;
        }

        tracing::debug!("Connection closed");
        Ok(())
    }
}
