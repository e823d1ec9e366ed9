//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use std::sync::Arc;
use vecstat_core::Aggregate;

/// High-level client for vecstat.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Largest value.
    pub async fn max(&self, values: &[i64]) -> Result<i64, ClientError> {
        self.aggregate(Aggregate::Max, values).await
    }

    /// Smallest value.
    pub async fn min(&self, values: &[i64]) -> Result<i64, ClientError> {
        self.aggregate(Aggregate::Min, values).await
    }

    /// Upper-middle element of the sorted values.
    pub async fn median(&self, values: &[i64]) -> Result<i64, ClientError> {
        self.aggregate(Aggregate::Median, values).await
    }

    /// Most frequent value, smallest on ties.
    pub async fn mode(&self, values: &[i64]) -> Result<i64, ClientError> {
        self.aggregate(Aggregate::Mode, values).await
    }

    pub async fn aggregate(&self, aggregate: Aggregate, values: &[i64]) -> Result<i64, ClientError> {
        self.raw(aggregate.code(), values).await
    }

    /// Sends an arbitrary command code.
    ///
    /// Useful for exercising the server with codes outside the known set;
    /// an error status comes back as [`ClientError::ServerError`].
    pub async fn raw(&self, command: i64, values: &[i64]) -> Result<i64, ClientError> {
        let response = self.conn.request(command, values).await?;

        if response.is_error() {
            return Err(ClientError::ServerError {
                status: response.status_code(),
            });
        }

        Ok(response.result())
    }
}
