//! # Engine Error Types
//!
//! Only connection failures, the two run limits and cancellation reach
//! the caller as errors. Timeouts, malformed responses and stalls are folded into the
//! returned reports.

use giftwire_protocol::SessionError;
use giftwire_stats::StatsError;
use thiserror::Error;

/// Errors that can end an engine operation.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The connection could not be established or was lost.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Disposal hit its hard pass cap before the inventory emptied.
    #[error("disposal stopped after {limit} passes with {deleted} items deleted")]
    IterationLimitExceeded {
        /// Configured cap.
        limit: u32,
        /// Items deleted before the cap was hit.
        deleted: usize,
    },

    /// Containers nested deeper than the configured bound.
    #[error("container {container_id} is nested {depth} levels deep")]
    RecursionLimitExceeded {
        /// Depth at which the container was found.
        depth: u32,
        /// Identifier of the container that was not opened.
        container_id: String,
    },

    /// A supervisor cancelled the run between protocol operations.
    #[error("run cancelled")]
    Cancelled,

    /// Configuration could not be loaded or is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Allow-list store failure.
    #[error("allow-list store: {0}")]
    Store(String),

    /// Drop statistics failure.
    #[error(transparent)]
    Stats(#[from] StatsError),

    /// An export could not be serialized.
    #[error("cannot export: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Returns true if the server could not be reached or dropped us.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
