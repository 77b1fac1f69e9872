//! # Progress Events
//!
//! Non-blocking progress reporting for long runs.
//!
//! ```text
//! ┌──────────────┐  try_send   ┌─────────────┐   drain   ┌─────────────┐
//! │ resolver /   │────────────>│   bounded   │──────────>│  front-end  │
//! │ disposal /   │             │   channel   │           │  (progress) │
//! │ sender       │             └─────────────┘           └─────────────┘
//! └──────────────┘
//! ```
//!
//! The engine never waits on a slow consumer: a full channel drops the
//! event.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Default channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Something worth showing while a run is in progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    // =========================================================================
    // Resolution
    // =========================================================================
    /// A resolution pass found containers to open.
    ResolutionPass {
        /// 1-based pass number.
        pass: u32,
        /// Containers selected in this pass.
        pending: usize,
        /// Containers opened so far, nested ones included.
        opened_so_far: u64,
    },

    /// A container was opened.
    ContainerOpened {
        /// Container identifier.
        id: String,
        /// Nesting depth, 0 for top-level containers.
        depth: u32,
        /// Elements found in the response.
        yielded: usize,
    },

    // =========================================================================
    // Disposal
    // =========================================================================
    /// A disposal pass is about to delete items.
    DisposalPass {
        /// 1-based pass number.
        pass: u32,
        /// Player-partition items visible in the snapshot.
        visible: usize,
        /// Items this pass will delete.
        pending: usize,
    },

    /// A delete command was sent.
    ItemDeleted {
        /// Item identifier.
        id: String,
        /// Display name.
        name: String,
        /// Quantity sent with the delete.
        quantity: u32,
    },

    /// A pass made no progress.
    StallDetected {
        /// 1-based pass number.
        pass: u32,
        /// Items still visible.
        visible: usize,
        /// Consecutive stalled passes so far.
        stalled: u32,
    },

    // =========================================================================
    // Sending
    // =========================================================================
    /// One purchase/send completed.
    GiftSent {
        /// 1-based index of the unit.
        index: u32,
        /// Units requested in total.
        total: u32,
        /// Whether the server confirmed it.
        succeeded: bool,
    },
}

/// Optional producer end of the progress channel.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    sender: Option<Sender<EngineEvent>>,
}

impl EventSink {
    /// A sink that discards everything.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Wraps an existing sender.
    #[must_use]
    pub const fn new(sender: Sender<EngineEvent>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Creates a bounded channel and returns both ends.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<EngineEvent>) {
        let (sender, receiver) = bounded(capacity);
        (Self::new(sender), receiver)
    }

    /// Emits an event without blocking.
    ///
    /// Returns `false` if the event was dropped.
    #[inline]
    pub fn emit(&self, event: EngineEvent) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::debug!("progress channel full, event dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Returns true if events go anywhere.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }
}

/// Receives every pending event (non-blocking).
#[must_use]
pub fn drain(receiver: &Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::with_capacity(64);
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(index: u32) -> EngineEvent {
        EngineEvent::GiftSent {
            index,
            total: 3,
            succeeded: true,
        }
    }

    #[test]
    fn test_disabled_sink_drops() {
        let sink = EventSink::disabled();
        assert!(!sink.is_enabled());
        assert!(!sink.emit(sample(1)));
    }

    #[test]
    fn test_channel_roundtrip() {
        let (sink, receiver) = EventSink::channel(8);
        assert!(sink.emit(sample(1)));
        assert!(sink.emit(sample(2)));
        assert_eq!(drain(&receiver), vec![sample(1), sample(2)]);
        assert!(drain(&receiver).is_empty());
    }

    #[test]
    fn test_full_channel_never_blocks() {
        let (sink, receiver) = EventSink::channel(1);
        assert!(sink.emit(sample(1)));
        assert!(!sink.emit(sample(2)));
        assert_eq!(receiver.len(), 1);
    }

    #[test]
    fn test_disconnected_receiver() {
        let (sink, receiver) = EventSink::channel(4);
        drop(receiver);
        assert!(!sink.emit(sample(1)));
    }
}
