//! # vecstat-server
//!
//! TCP server for vecstat.
//!
//! This crate provides:
//! - A connection acceptor spawning one task per client
//! - The per-connection read/decode/compute/respond loop
//! - Configuration loading (YAML file and environment)
//! - Optional Prometheus metrics over HTTP

pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod server;
pub mod session;

pub use config::{Config, LimitsConfig, MetricsConfig, NetworkConfig, MAX_VECTOR_LEN_CEILING};
pub use connection::{ConnectionHandler, HandlerConfig};
pub use error::ServerError;
pub use metrics::Metrics;
pub use server::{Server, ServerConfig, ServerStats};
pub use session::{Session, SessionState};
