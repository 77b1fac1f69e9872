//! # Drop Records
//!
//! What one resolution run produced: how many containers were opened and
//! the item totals that fell out of them.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Item totals keyed by item name.
///
/// Keys are ordered so that every rendering of an aggregate is stable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LootAggregate(BTreeMap<String, u64>);

impl LootAggregate {
    /// Creates an empty aggregate.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Adds `quantity` units of `name`.
    pub fn add(&mut self, name: &str, quantity: u64) {
        if let Some(total) = self.0.get_mut(name) {
            *total = total.saturating_add(quantity);
        } else {
            self.0.insert(name.to_string(), quantity);
        }
    }

    /// Adds every entry of `other` into `self`.
    pub fn merge(&mut self, other: &Self) {
        for (name, quantity) in &other.0 {
            self.add(name, *quantity);
        }
    }

    /// Units recorded for `name` (0 if never seen).
    #[must_use]
    pub fn get(&self, name: &str) -> u64 {
        self.0.get(name).copied().unwrap_or(0)
    }

    /// Iterates `(name, quantity)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(name, quantity)| (name.as_str(), *quantity))
    }

    /// Number of distinct item names.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing was recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all quantities.
    #[must_use]
    pub fn total_units(&self) -> u64 {
        self.0.values().fold(0u64, |acc, q| acc.saturating_add(*q))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for LootAggregate {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut aggregate = Self::new();
        for (name, quantity) in iter {
            let name: String = name.into();
            aggregate.add(&name, quantity);
        }
        aggregate
    }
}

/// One recorded resolution run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropSession {
    /// Unix seconds at which the run was recorded.
    pub timestamp: u64,
    /// Containers opened during the run, nested ones included.
    pub total_opened: u64,
    /// Items obtained.
    pub loot: LootAggregate,
}

impl DropSession {
    /// Creates a session stamped with the current wall-clock time.
    #[must_use]
    pub fn now(total_opened: u64, loot: LootAggregate) -> Self {
        Self {
            timestamp: unix_now(),
            total_opened,
            loot,
        }
    }

    /// Units of `name` per container opened in this session, in percent.
    #[must_use]
    pub fn probability_percent(&self, name: &str) -> f64 {
        if self.total_opened == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.loot.get(name) as f64 / self.total_opened as f64;
        rate * 100.0
    }
}

/// Current Unix time in seconds (0 if the clock is before the epoch).
#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
