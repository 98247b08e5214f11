//! The avatar situation snapshot served to the controlling agent.
//!
//! A [`StateSnapshot`] is a lossy, radius-bounded, time-delayed view. It is
//! recomputed wholesale by the refresh routine in `blockbot-core` and read
//! freely by everyone else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::chat::ChatRecord;
use crate::enums::{ActionKind, EntityKind};
use crate::geometry::{BlockPos, Vec3};

/// Remaining and maximum durability of a damageable item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Durability {
    /// Uses left.
    pub current: u32,
    /// Uses when new.
    pub max: u32,
}

/// One occupied inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct InventoryItem {
    /// Catalog name of the item.
    pub name: String,
    /// Stack size.
    pub count: u32,
    /// Inventory slot index.
    pub slot: u32,
    /// Present only for damageable items.
    pub durability: Option<Durability>,
}

/// An entity within the scan radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NearbyEntity {
    /// Best available name (entity name, username or display name).
    pub name: String,
    /// Entity classification.
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Distance from the avatar.
    pub distance: f64,
    /// Entity position.
    pub position: Vec3,
}

/// A non-empty block within the scan radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NearbyBlock {
    /// Catalog name of the block.
    pub name: String,
    /// Cell coordinates.
    pub position: BlockPos,
    /// Distance from the avatar's cell.
    pub distance: f64,
}

/// Cached view of the avatar's situation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StateSnapshot {
    /// Avatar position, `None` until the first successful refresh.
    pub position: Option<Vec3>,
    /// Health points (0-20).
    pub health: f32,
    /// Food points (0-20).
    pub food: u32,
    /// Occupied inventory slots in slot order.
    pub inventory: Vec<InventoryItem>,
    /// Physical entities within the entity radius.
    pub nearby_entities: Vec<NearbyEntity>,
    /// Closest non-empty blocks, nearest first.
    pub nearby_blocks: Vec<NearbyBlock>,
    /// Most recent chat lines, newest first.
    pub recent_chats: Vec<ChatRecord>,
    /// The last action dispatched.
    pub last_action: Option<ActionKind>,
    /// Short outcome of the last action (`success`, `error: ...`, `died`).
    pub action_result: Option<String>,
    /// When the snapshot was last recomputed.
    pub refreshed_at: Option<DateTime<Utc>>,
}

/// The subset of a snapshot returned alongside an action result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrimmedSnapshot {
    /// Avatar position.
    pub position: Option<Vec3>,
    /// Health points.
    pub health: f32,
    /// Food points.
    pub food: u32,
    /// The first inventory entries.
    pub inventory: Vec<InventoryItem>,
}

impl StateSnapshot {
    /// Project the snapshot down to position, vitals and the first
    /// `max_items` inventory entries.
    pub fn trimmed(&self, max_items: usize) -> TrimmedSnapshot {
        TrimmedSnapshot {
            position: self.position,
            health: self.health,
            food: self.food,
            inventory: self.inventory.iter().take(max_items).cloned().collect(),
        }
    }

    /// Total count of the named item across all slots.
    pub fn count_of(&self, item: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|i| i.name == item)
            .fold(0_u32, |acc, i| acc.saturating_add(i.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, count: u32, slot: u32) -> InventoryItem {
        InventoryItem {
            name: name.to_owned(),
            count,
            slot,
            durability: None,
        }
    }

    #[test]
    fn trimmed_keeps_first_items() {
        let snapshot = StateSnapshot {
            inventory: (0..15).map(|i| item("dirt", 1, i)).collect(),
            ..StateSnapshot::default()
        };
        let trimmed = snapshot.trimmed(10);
        assert_eq!(trimmed.inventory.len(), 10);
        assert_eq!(trimmed.inventory.first().map(|i| i.slot), Some(0));
    }

    #[test]
    fn count_sums_stacks() {
        let snapshot = StateSnapshot {
            inventory: vec![item("oak_log", 64, 9), item("oak_log", 3, 10), item("dirt", 5, 11)],
            ..StateSnapshot::default()
        };
        assert_eq!(snapshot.count_of("oak_log"), 67);
        assert_eq!(snapshot.count_of("stone"), 0);
    }

    #[test]
    fn entity_kind_serializes_as_type() {
        let entity = NearbyEntity {
            name: "cow".to_owned(),
            kind: EntityKind::Mob,
            distance: 2.0,
            position: Vec3::default(),
        };
        let json = serde_json::to_value(&entity).unwrap_or_default();
        assert_eq!(json["type"], "mob");
    }
}
