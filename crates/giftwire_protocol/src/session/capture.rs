//! Read plans and the captures they produce.

use std::borrow::Cow;
use std::time::Duration;

/// Default bytes requested per read attempt.
pub const DEFAULT_CHUNK_SIZE: usize = 65_536;

/// How to capture one response: an attempt budget, a per-attempt timeout
/// and, optionally, the closing tag that ends this response type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadPlan {
    /// Substring that ends the capture once it appears.
    pub terminator: Option<&'static str>,
    /// Maximum number of read attempts.
    pub attempts: u32,
    /// Timeout of each read attempt.
    pub attempt_timeout: Duration,
    /// Bytes requested per attempt.
    pub chunk_size: usize,
}

impl ReadPlan {
    /// Creates a plan without a terminator.
    #[must_use]
    pub const fn new(attempts: u32, attempt_timeout: Duration, chunk_size: usize) -> Self {
        Self {
            terminator: None,
            attempts,
            attempt_timeout,
            chunk_size,
        }
    }

    /// Single attempt, for opportunistic diagnostic reads.
    #[must_use]
    pub const fn once(attempt_timeout: Duration, chunk_size: usize) -> Self {
        Self::new(1, attempt_timeout, chunk_size)
    }

    /// Sets the terminator.
    #[must_use]
    pub const fn until(mut self, terminator: &'static str) -> Self {
        self.terminator = Some(terminator);
        self
    }
}

/// Why a capture stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureEnd {
    /// The terminator appeared.
    Terminator,
    /// An attempt timed out: no more data right now.
    TimedOut,
    /// Every attempt returned data but the terminator never appeared.
    BudgetExhausted,
    /// The peer closed the stream.
    Closed,
}

/// Bytes captured for one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capture {
    /// Raw bytes, NUL separators included.
    pub bytes: Vec<u8>,
    /// Why the capture stopped.
    pub end: CaptureEnd,
    /// Read attempts consumed.
    pub attempts_used: u32,
}

impl Capture {
    /// Lossy UTF-8 view of the captured bytes.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Returns true if no bytes arrived.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of bytes captured.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the response ended on its terminator.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.end == CaptureEnd::Terminator
    }
}

/// Returns true if `needle` occurs in `haystack`.
pub(crate) fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
