//! # Statistics Error Types
//!
//! All errors that can occur while recording or reading drop history.

use std::io;
use thiserror::Error;

/// Errors that can occur in the statistics store.
#[derive(Error, Debug)]
pub enum StatsError {
    /// The log file could not be read or written.
    #[error("drop log I/O failed: {0}")]
    Io(#[from] io::Error),

    /// The log header is not one we wrote.
    #[error("drop log is corrupt: {0}")]
    Corrupt(String),

    /// A session could not be encoded.
    #[error("cannot encode drop session: {0}")]
    Encoding(String),

    /// An export could not be serialized.
    #[error("cannot export drop statistics: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for statistics operations.
pub type StatsResult<T> = Result<T, StatsError>;
