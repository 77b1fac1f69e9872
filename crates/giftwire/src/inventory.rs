//! # Inventory Snapshots
//!
//! One `GETME` round trip, decoded into typed items.
//!
//! ```text
//! <MYPARAM ...>
//!   <O id="17" txt="Halloween box" section="0" count="3" max_count="99"/>
//!   <O id="18" txt="Trophy" section="7"/>
//! </MYPARAM>
//! ```
//!
//! Partitions 0-3 are the player's own inventory. Everything else lives
//! elsewhere server-side and is only reported for diagnostics.

use std::collections::{BTreeMap, HashSet};

use giftwire_protocol::{
    elements, CaptureEnd, Command, Element, Session, SessionResult, Transport, INVENTORY_TERMINATOR,
    ITEM_TAG,
};

use crate::config::Tuning;

/// Partitions that make up the player's inventory.
pub const PLAYER_PARTITIONS: [u32; 4] = [0, 1, 2, 3];

/// Returns true for the fixed player-inventory partitions.
#[inline]
#[must_use]
pub fn is_player_partition(partition: u32) -> bool {
    PLAYER_PARTITIONS.contains(&partition)
}

/// Which partitions a snapshot keeps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PartitionScope {
    /// Player inventory only.
    #[default]
    Player,
    /// Every partition.
    All,
}

impl PartitionScope {
    /// Returns true if items in `partition` are kept.
    #[inline]
    #[must_use]
    pub fn includes(self, partition: u32) -> bool {
        match self {
            Self::Player => is_player_partition(partition),
            Self::All => true,
        }
    }
}

/// A server-reported inventory object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InventoryItem {
    /// Server-assigned identifier, stable within one session.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Partition (`section`).
    pub partition: u32,
    /// Quantity; 1 when absent.
    pub quantity: u32,
}

impl InventoryItem {
    /// Decodes an item element. Elements without `id` or a numeric
    /// `section` are not inventory items.
    #[must_use]
    pub fn from_element(element: &Element) -> Option<Self> {
        let id = element.attr("id").filter(|id| !id.is_empty())?;
        let partition = element.parse_attr::<u32>("section")?;
        Some(Self {
            id: id.to_string(),
            name: element.attr("txt").unwrap_or_default().to_string(),
            partition,
            quantity: quantity_of(element),
        })
    }
}

/// `count` as a positive quantity. Missing, zero or garbage reads as 1.
#[must_use]
pub fn quantity_of(element: &Element) -> u32 {
    element
        .parse_attr::<u32>("count")
        .filter(|&count| count > 0)
        .unwrap_or(1)
}

/// One decoded inventory response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InventorySnapshot {
    /// Items in scope, in response order, one per identifier.
    pub items: Vec<InventoryItem>,
    /// Item count per partition, over every partition seen.
    pub partitions: BTreeMap<u32, usize>,
    /// Whether the closing tag was seen.
    pub complete: bool,
}

impl InventorySnapshot {
    /// Decodes a response body.
    ///
    /// Truncated or malformed input yields fewer items, never an error.
    #[must_use]
    pub fn parse(text: &str, scope: PartitionScope) -> Self {
        let mut seen = HashSet::new();
        let mut snapshot = Self {
            complete: text.contains(INVENTORY_TERMINATOR),
            ..Self::default()
        };

        for element in elements(text).filter(|e| e.name == ITEM_TAG) {
            let Some(item) = InventoryItem::from_element(&element) else {
                continue;
            };
            if !seen.insert(item.id.clone()) {
                continue;
            }
            *snapshot.partitions.entry(item.partition).or_insert(0) += 1;
            if scope.includes(item.partition) {
                snapshot.items.push(item);
            }
        }

        snapshot
    }

    /// Number of items in scope.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if no item is in scope.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Identifiers in scope.
    #[must_use]
    pub fn ids(&self) -> HashSet<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }
}

/// Queries the inventory.
///
/// # Errors
///
/// Only connection failures; a short or garbled response is an emptier
/// snapshot.
pub fn take_snapshot<T: Transport>(
    session: &mut Session<T>,
    tuning: &Tuning,
    scope: PartitionScope,
) -> SessionResult<InventorySnapshot> {
    let plan = tuning.inventory.plan().until(INVENTORY_TERMINATOR);
    let capture = session.send(&Command::InventoryQuery)?.receive_until(&plan)?;
    let snapshot = InventorySnapshot::parse(&capture.text(), scope);

    if !snapshot.partitions.is_empty() {
        tracing::info!(partitions = ?snapshot.partitions, "inventory partitions");
    }
    if capture.end != CaptureEnd::Terminator {
        tracing::debug!(end = ?capture.end, items = snapshot.len(), "inventory response incomplete");
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(text: &str) -> InventorySnapshot {
        InventorySnapshot::parse(text, PartitionScope::All)
    }

    #[test]
    fn test_item_fields() {
        let snap = parse_all(r#"<O id="x" txt="y" section="2" count="5"/>"#);
        assert_eq!(
            snap.items,
            vec![InventoryItem {
                id: "x".to_string(),
                name: "y".to_string(),
                partition: 2,
                quantity: 5,
            }]
        );
    }

    #[test]
    fn test_missing_count_is_one() {
        let snap = parse_all(r#"<O id="x" txt="y" section="2"/>"#);
        assert_eq!(snap.items[0].quantity, 1);
    }

    #[test]
    fn test_max_count_never_populates_quantity() {
        let snap = parse_all(r#"<O id="x" txt="y" section="2" max_count="99"/>"#);
        assert_eq!(snap.items[0].quantity, 1);

        let snap = parse_all(r#"<O max_count="99" id="x" txt="y" section="2" count="4"/>"#);
        assert_eq!(snap.items[0].quantity, 4);
    }

    #[test]
    fn test_zero_or_garbage_count_is_one() {
        let snap = parse_all(
            r#"<O id="a" txt="A" section="0" count="0"/><O id="b" txt="B" section="0" count="lots"/>"#,
        );
        assert_eq!(snap.items[0].quantity, 1);
        assert_eq!(snap.items[1].quantity, 1);
    }

    #[test]
    fn test_player_scope_filters_partitions() {
        let text = r#"<MYPARAM><O id="1" txt="A" section="0"/><O id="2" txt="B" section="3"/><O id="3" txt="C" section="7"/></MYPARAM>"#;
        let snap = InventorySnapshot::parse(text, PartitionScope::Player);
        assert_eq!(snap.len(), 2);
        assert!(snap.complete);
        assert_eq!(snap.partitions.get(&7), Some(&1));
        assert_eq!(snap.partitions.values().sum::<usize>(), 3);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let snap = parse_all(r#"<O id="1" txt="First" section="0"/><O id="1" txt="Second" section="1"/>"#);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.items[0].name, "First");
    }

    #[test]
    fn test_truncated_response_yields_fewer_items() {
        let snap = parse_all(r#"<MYPARAM><O id="1" txt="A" section="0"/><O id="2" txt="B" sec"#);
        assert_eq!(snap.len(), 1);
        assert!(!snap.complete);
    }

    #[test]
    fn test_elements_without_id_or_section_skipped() {
        let snap = parse_all(r#"<O txt="A" section="0"/><O id="2" txt="B"/><O id="3" section="x"/><P id="4" section="0"/>"#);
        assert!(snap.is_empty());
    }

    #[test]
    fn test_escaped_names() {
        let snap = parse_all(r#"<O id="1" txt="Tom &amp; Jerry" section="0"/>"#);
        assert_eq!(snap.items[0].name, "Tom & Jerry");
    }
}
