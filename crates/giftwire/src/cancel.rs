//! # Cancellation
//!
//! A shared flag a supervisor sets to stop a farming or disposal run.
//! Runs check it between protocol operations, never during a read, then
//! close their session and return [`EngineError::Cancelled`].
//!
//! ```text
//!  supervisor thread            engine thread
//!  ─────────────────            ─────────────────────────────
//!  token.cancel()  ──flag──►    before next USE / DROP: stop
//! ```
//!
//! The flag is sticky: once set, every run using the token stops at its
//! first check until [`CancelToken::reset`] is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{EngineError, EngineResult};

/// Cloneable handle to one cancellation flag. Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every run holding this token to stop.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clears the flag so new runs proceed.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Returns true once [`cancel`](Self::cancel) was called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` if the flag is set.
    ///
    /// # Errors
    ///
    /// [`EngineError::Cancelled`] after [`cancel`](Self::cancel).
    #[inline]
    pub fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}
