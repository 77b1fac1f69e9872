//! # Bulk Disposal
//!
//! Deletes everything in the player partitions, re-snapshotting until the
//! server reports nothing left.
//!
//! ```text
//! ┌──► snapshot (player partitions)
//! │       │ empty ───────────────────────────────► Emptied
//! │       │ pass cap reached ────────────────────► IterationLimitExceeded
//! │       │ no progress since last pass ─┬─ > tolerance ─► Stalled
//! │       │                              └─ warn + back off
//! │       ▼
//! │    DROP every item not yet deleted this run
//! └───────┘
//! ```
//!
//! Deletes are fire-and-forget: the only proof of a delete is the item
//! missing from a later snapshot. A pass counts as stalled when the visible
//! count did not drop and none of the items deleted in the previous pass
//! disappeared.

use std::collections::HashSet;

use giftwire_protocol::{Command, Session, Transport};

use crate::cancel::CancelToken;
use crate::config::{pause, Tuning};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventSink};
use crate::inventory::{take_snapshot, PartitionScope};

/// How a disposal run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposalOutcome {
    /// The player partitions are empty.
    Emptied,
    /// The server stopped removing items.
    Stalled,
}

/// Result of a disposal run that did not hit the pass cap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisposalReport {
    /// How the run ended.
    pub outcome: DisposalOutcome,
    /// Delete commands sent.
    pub deleted: usize,
    /// Passes that saw a non-empty inventory.
    pub passes: u32,
    /// Consecutive stalled passes at the end of the run.
    pub stalled_passes: u32,
    /// Player-partition items still visible at the end.
    pub remaining: usize,
}

/// One disposal run.
pub struct InventoryCleaner<'a> {
    tuning: &'a Tuning,
    events: &'a EventSink,
    cancel: CancelToken,
}

impl<'a> InventoryCleaner<'a> {
    /// Creates a cleaner.
    #[must_use]
    pub fn new(tuning: &'a Tuning, events: &'a EventSink) -> Self {
        Self {
            tuning,
            events,
            cancel: CancelToken::new(),
        }
    }

    /// Stops the run before the next snapshot or delete once `cancel` is set.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deletes every player-partition item, at most `max_passes` passes.
    ///
    /// # Errors
    ///
    /// [`EngineError::Session`] if the connection fails,
    /// [`EngineError::IterationLimitExceeded`] if `max_passes` passes did
    /// not empty the inventory, and [`EngineError::Cancelled`] if the token
    /// was set.
    pub fn dispose_all<T: Transport>(
        &self,
        session: &mut Session<T>,
        max_passes: u32,
    ) -> EngineResult<DisposalReport> {
        let mut deleted_ids: HashSet<String> = HashSet::new();
        let mut last_pass_ids: Vec<String> = Vec::new();
        let mut previous_visible: Option<usize> = None;
        let mut deleted = 0usize;
        let mut passes = 0u32;
        let mut stalled = 0u32;
        let mut deletes_sent = 0u64;

        loop {
            self.cancel.check()?;
            let snapshot = take_snapshot(session, self.tuning, PartitionScope::Player)?;
            let visible = snapshot.len();

            if snapshot.is_empty() {
                tracing::info!(deleted, passes, "inventory emptied");
                return Ok(DisposalReport {
                    outcome: DisposalOutcome::Emptied,
                    deleted,
                    passes,
                    stalled_passes: stalled,
                    remaining: 0,
                });
            }
            if passes >= max_passes {
                tracing::warn!(limit = max_passes, deleted, remaining = visible, "disposal pass cap reached");
                return Err(EngineError::IterationLimitExceeded {
                    limit: max_passes,
                    deleted,
                });
            }
            passes += 1;

            let present = snapshot.ids();
            let count_dropped = previous_visible.map_or(true, |previous| visible < previous);
            let deletes_landed = last_pass_ids.iter().any(|id| !present.contains(id.as_str()));
            if !count_dropped && !deletes_landed {
                stalled += 1;
                if stalled > self.tuning.stall_tolerance {
                    tracing::warn!(pass = passes, visible, stalled, deleted, "disposal stalled, giving up");
                    return Ok(DisposalReport {
                        outcome: DisposalOutcome::Stalled,
                        deleted,
                        passes,
                        stalled_passes: stalled,
                        remaining: visible,
                    });
                }
                tracing::warn!(pass = passes, visible, stalled, "items are not being removed");
                self.events.emit(EngineEvent::StallDetected {
                    pass: passes,
                    visible,
                    stalled,
                });
                pause(self.tuning.stall_backoff_ms);
            } else {
                stalled = 0;
            }
            previous_visible = Some(visible);

            let pending: Vec<_> = snapshot
                .items
                .into_iter()
                .filter(|item| !deleted_ids.contains(&item.id))
                .collect();
            tracing::info!(pass = passes, visible, pending = pending.len(), "disposal pass");
            self.events.emit(EngineEvent::DisposalPass {
                pass: passes,
                visible,
                pending: pending.len(),
            });

            last_pass_ids.clear();
            for item in pending {
                if self.cancel.is_cancelled() {
                    tracing::info!(pass = passes, deleted, "disposal cancelled");
                    return Err(EngineError::Cancelled);
                }
                if deletes_sent > 0 {
                    pause(self.tuning.delete_pacing_ms);
                }
                let capture = session
                    .send(&Command::Delete {
                        id: item.id.clone(),
                        count: item.quantity,
                    })?
                    .receive_until(&self.tuning.delete.plan())?;
                deletes_sent += 1;
                if !capture.is_empty() {
                    tracing::debug!(id = %item.id, response = %capture.text(), "delete acknowledged");
                }

                self.events.emit(EngineEvent::ItemDeleted {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                });
                deleted += 1;
                deleted_ids.insert(item.id.clone());
                last_pass_ids.push(item.id);
            }
        }
    }
}
