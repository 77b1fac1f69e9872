//! Inventory inspection: what disposal would touch, and what it never will.

use std::collections::BTreeMap;

use giftwire_protocol::{Session, SessionResult, Transport};

use crate::config::Tuning;
use crate::inventory::{is_player_partition, take_snapshot, InventoryItem, InventorySnapshot, PartitionScope};

/// Every partition of an inventory, grouped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventoryReport {
    /// Items per partition, in partition order.
    pub by_partition: BTreeMap<u32, Vec<InventoryItem>>,
    /// Items in the player partitions.
    pub player_items: usize,
    /// Items in every other partition.
    pub other_items: usize,
}

impl InventoryReport {
    /// Groups an all-partition snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        let mut report = Self::default();
        for item in snapshot.items {
            if is_player_partition(item.partition) {
                report.player_items += 1;
            } else {
                report.other_items += 1;
            }
            report.by_partition.entry(item.partition).or_default().push(item);
        }
        report
    }

    /// Total items across partitions.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.player_items + self.other_items
    }
}

/// Takes an all-partition snapshot and groups it.
///
/// # Errors
///
/// Only connection failures.
pub fn inspect<T: Transport>(session: &mut Session<T>, tuning: &Tuning) -> SessionResult<InventoryReport> {
    let snapshot = take_snapshot(session, tuning, PartitionScope::All)?;
    let report = InventoryReport::from_snapshot(snapshot);
    tracing::info!(
        player = report.player_items,
        other = report.other_items,
        partitions = report.by_partition.len(),
        "inventory inspected"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grouping() {
        let snapshot = InventorySnapshot::parse(
            r#"<O id="1" txt="A" section="0"/><O id="2" txt="B" section="0"/><O id="3" txt="C" section="9"/>"#,
            PartitionScope::All,
        );
        let report = InventoryReport::from_snapshot(snapshot);
        assert_eq!(report.player_items, 2);
        assert_eq!(report.other_items, 1);
        assert_eq!(report.by_partition[&0].len(), 2);
        assert_eq!(report.by_partition[&9][0].name, "C");
        assert_eq!(report.total(), 3);
    }
}
