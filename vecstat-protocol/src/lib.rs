//! # vecstat-protocol
//!
//! Wire protocol implementation for vecstat.
//!
//! This crate provides:
//! - Signed varints stored in fixed 8-byte slots
//! - Request and response frame layouts
//! - Stateless encoder/decoder entry points
//! - Protocol error types and status codes

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod slot;

pub use codec::{Decoder, Encoder};
pub use error::ProtocolError;
pub use frame::{RequestHeader, REQUEST_HEADER_SIZE, RESPONSE_SIZE};
pub use message::{Request, Response, ResponseStatus};
pub use slot::{decode_slot, encode_slot, SLOT_MAX, SLOT_MIN, SLOT_SIZE};

/// Default port for the vecstat server.
pub const DEFAULT_PORT: u16 = 4545;

/// Default upper bound on the declared vector length of a request (1 Mi elements).
pub const MAX_VECTOR_LEN: usize = 1024 * 1024;
