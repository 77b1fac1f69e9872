//! # Recursive Gift Resolver
//!
//! Opens every container in the inventory, and every container that falls
//! out of one, until nothing openable is left.
//!
//! ```text
//!  snapshot ──► containers not yet opened ──► open A
//!     ▲                                         │ yields
//!     │                                         ├─ plain item ──► aggregate
//!     │                                         └─ container B ─► open B (depth+1)
//!     └──────────── until a snapshot has nothing new ◄──────────┘
//! ```
//!
//! Every identifier is opened at most once per run. A snapshot taken
//! before the server has caught up may still list a container that was
//! already opened; it is skipped.

use std::collections::HashSet;

use giftwire_protocol::{elements, Command, Session, Transport, ITEM_TAG, OPEN_TERMINATOR};
use giftwire_stats::LootAggregate;

use crate::cancel::CancelToken;
use crate::config::{pause, Tuning};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventSink};
use crate::inventory::{quantity_of, take_snapshot, PartitionScope};
use crate::store::AllowList;

/// What one resolution run produced.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Items obtained, containers excluded.
    pub loot: LootAggregate,
    /// Containers opened, nested ones included.
    pub total_opened: u64,
    /// Containers picked from snapshots (top level).
    pub top_level: u64,
    /// Snapshot passes that found something to open.
    pub passes: u32,
}

/// One resolution run. Holds the run's processed-identifier set and what
/// has been obtained so far.
pub struct GiftResolver<'a> {
    tuning: &'a Tuning,
    events: &'a EventSink,
    cancel: CancelToken,
    processed: HashSet<String>,
    resolution: Resolution,
}

impl<'a> GiftResolver<'a> {
    /// Starts a fresh run.
    #[must_use]
    pub fn new(tuning: &'a Tuning, events: &'a EventSink) -> Self {
        Self {
            tuning,
            events,
            cancel: CancelToken::new(),
            processed: HashSet::new(),
            resolution: Resolution::default(),
        }
    }

    /// Stops the run before the next open once `cancel` is set.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// What the run has obtained so far. After an error this is everything
    /// consumed before the run stopped: containers already opened are gone
    /// from the server either way.
    #[must_use]
    pub const fn partial(&self) -> &Resolution {
        &self.resolution
    }

    /// Opens every container reachable from the player's inventory.
    ///
    /// # Errors
    ///
    /// [`EngineError::Session`] if the connection fails,
    /// [`EngineError::RecursionLimitExceeded`] if nesting goes deeper than
    /// `max_gift_depth`, and [`EngineError::Cancelled`] if the token was
    /// set. [`partial`](Self::partial) keeps what was obtained before.
    pub fn resolve_all<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        allowed: &AllowList,
    ) -> EngineResult<Resolution> {
        loop {
            self.cancel.check()?;
            let snapshot = take_snapshot(session, self.tuning, PartitionScope::Player)?;
            let pending: Vec<String> = snapshot
                .items
                .into_iter()
                .filter(|item| allowed.contains(&item.name) && !self.processed.contains(&item.id))
                .map(|item| item.id)
                .collect();

            if pending.is_empty() {
                break;
            }
            self.resolution.passes += 1;
            tracing::info!(pass = self.resolution.passes, pending = pending.len(), "resolution pass");
            self.events.emit(EngineEvent::ResolutionPass {
                pass: self.resolution.passes,
                pending: pending.len(),
                opened_so_far: self.resolution.total_opened,
            });

            for id in pending {
                // May have been opened as a nested container earlier in this pass.
                if self.processed.contains(&id) {
                    continue;
                }
                self.resolution.top_level += 1;
                self.open(session, &id, 0, allowed)?;
            }
        }

        tracing::info!(
            opened = self.resolution.total_opened,
            items = self.resolution.loot.len(),
            passes = self.resolution.passes,
            "resolution finished"
        );
        Ok(self.resolution.clone())
    }

    /// Opens one container and, depth-first, every listed container it
    /// yields. Each open is counted as soon as the server accepted it.
    fn open<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        id: &str,
        depth: u32,
        allowed: &AllowList,
    ) -> EngineResult<()> {
        if depth > self.tuning.max_gift_depth {
            return Err(EngineError::RecursionLimitExceeded {
                depth,
                container_id: id.to_string(),
            });
        }
        self.cancel.check()?;

        if self.resolution.total_opened > 0 {
            pause(self.tuning.open_pacing_ms);
        }
        self.processed.insert(id.to_string());

        let outstanding = session.send(&Command::Open {
            gift: id.to_string(),
        })?;
        self.resolution.total_opened += 1;
        pause(self.tuning.open_settle_ms);
        let capture = outstanding.receive_until(&self.tuning.open.plan().until(OPEN_TERMINATOR))?;

        let yielded: Vec<_> = elements(&capture.text())
            .filter(|e| e.name == ITEM_TAG)
            .collect();
        tracing::debug!(id, depth, yielded = yielded.len(), end = ?capture.end, "container opened");
        self.events.emit(EngineEvent::ContainerOpened {
            id: id.to_string(),
            depth,
            yielded: yielded.len(),
        });

        for element in &yielded {
            let Some(name) = element.attr("txt").filter(|n| !n.is_empty()) else {
                continue;
            };
            let nested_id = element.attr("id").filter(|v| !v.is_empty());

            match nested_id {
                Some(nested) if allowed.contains(name) => {
                    if !self.processed.contains(nested) {
                        self.open(session, nested, depth + 1, allowed)?;
                    }
                }
                _ => self.resolution.loot.add(name, u64::from(quantity_of(element))),
            }
        }

        Ok(())
    }
}
