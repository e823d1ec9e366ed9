//! # vecstat-client
//!
//! Client library for vecstat.
//!
//! This crate provides:
//! - Async TCP connection with connect and request timeouts
//! - High-level API for the four aggregates

pub mod client;
pub mod connection;
pub mod error;

pub use client::Client;
pub use connection::{Connection, ConnectionConfig};
pub use error::ClientError;
