//! # Session Error Types
//!
//! Failures that end a unit of work. Everything else the server does
//! (silence, partial frames, garbage) is absorbed into capture results.

use std::io;
use thiserror::Error;

/// Errors surfaced by a protocol session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The transport could not be established (DNS, TCP, connect timeout).
    #[error("cannot connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint as `host:port`.
        endpoint: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// An established stream failed on write or read.
    #[error("connection lost: {0}")]
    ConnectionLost(#[source] io::Error),

    /// The session was closed, locally or by the peer.
    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Returns true if the failure happened before the stream was established.
    #[inline]
    #[must_use]
    pub const fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
