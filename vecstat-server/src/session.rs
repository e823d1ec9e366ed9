//! Per-connection session state.

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Position of a connection in its request loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for (the rest of) a request frame.
    Reading,
    /// A complete frame is being decoded.
    Decoding,
    /// The aggregate engine is running.
    Computing,
    /// The response is being written.
    Responding,
    /// Terminal: the connection has been released.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Reading => "reading",
            SessionState::Decoding => "decoding",
            SessionState::Computing => "computing",
            SessionState::Responding => "responding",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A client session.
///
/// Owned by exactly one connection handler for the connection's whole life,
/// so none of its fields need synchronization.
#[derive(Debug)]
pub struct Session {
    /// Connection number assigned by the acceptor. Diagnostics only.
    pub id: u64,

    /// Remote address.
    pub remote_addr: SocketAddr,

    state: SessionState,
    request_count: u64,
    error_count: u64,
    created_at: Instant,
}

impl Session {
    /// Creates a new session in the `Reading` state.
    pub fn new(id: u64, remote_addr: SocketAddr) -> Self {
        Self {
            id,
            remote_addr,
            state: SessionState::Reading,
            request_count: 0,
            error_count: 0,
            created_at: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `state`. A closed session stays closed.
    pub fn set_state(&mut self, state: SessionState) {
        if self.state != SessionState::Closed {
            self.state = state;
        }
    }

    /// Records an answered request and whether it was answered with an error.
    pub fn record_request(&mut self, is_error: bool) {
        self.request_count += 1;
        if is_error {
            self.error_count += 1;
        }
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    /// Returns the session age.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}
