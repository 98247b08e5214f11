//! Knowledge records accumulated across sessions.
//!
//! [`KnowledgeData`] is the plain data behind the durable knowledge file.
//! Keyed categories (crafting, building, exploration) overwrite on write;
//! list categories (resources, behaviors) only ever append, so history is
//! preserved across merges.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::KnowledgeCategory;
use crate::geometry::BlockPos;

/// One outcome observed for a situation fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BehaviorEntry {
    /// The action taken (the request as sent).
    pub action: serde_json::Value,
    /// What happened.
    pub outcome: serde_json::Value,
    /// Unix time in milliseconds.
    pub timestamp: i64,
}

/// One place a resource block was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ResourceSighting {
    /// Cell where the block was seen.
    pub pos: BlockPos,
    /// Unix time in milliseconds.
    pub timestamp: i64,
}

/// Descriptor of a visited area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ExplorationRecord {
    /// Free-form area details (blocks seen, biome, notes).
    pub details: serde_json::Value,
    /// Unix time in milliseconds of the last visit.
    pub last_visited: i64,
}

/// The full knowledge store contents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct KnowledgeData {
    /// Item name to recipe.
    #[serde(default)]
    pub crafting: BTreeMap<String, serde_json::Value>,
    /// Pattern name to block layout.
    #[serde(default)]
    pub building: BTreeMap<String, serde_json::Value>,
    /// Area key (`"cx,cz"`) to area descriptor.
    #[serde(default)]
    pub exploration: BTreeMap<String, ExplorationRecord>,
    /// Block type to sightings, oldest first.
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<ResourceSighting>>,
    /// Situation fingerprint to outcomes, oldest first.
    #[serde(default)]
    pub behaviors: BTreeMap<String, Vec<BehaviorEntry>>,
}

impl KnowledgeData {
    /// Merge `other` into `self`.
    ///
    /// Keyed categories take `other`'s value on conflict; list categories
    /// append `other`'s entries after the existing ones.
    pub fn merge(&mut self, other: Self) {
        self.crafting.extend(other.crafting);
        self.building.extend(other.building);
        self.exploration.extend(other.exploration);
        for (key, mut entries) in other.resources {
            self.resources.entry(key).or_default().append(&mut entries);
        }
        for (key, mut entries) in other.behaviors {
            self.behaviors.entry(key).or_default().append(&mut entries);
        }
    }

    /// Number of keys held in a category.
    pub fn key_count(&self, category: KnowledgeCategory) -> usize {
        match category {
            KnowledgeCategory::Crafting => self.crafting.len(),
            KnowledgeCategory::Building => self.building.len(),
            KnowledgeCategory::Exploration => self.exploration.len(),
            KnowledgeCategory::Resources => self.resources.len(),
            KnowledgeCategory::Behaviors => self.behaviors.len(),
        }
    }

    /// Whether every category is empty.
    pub fn is_empty(&self) -> bool {
        self.crafting.is_empty()
            && self.building.is_empty()
            && self.exploration.is_empty()
            && self.resources.is_empty()
            && self.behaviors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(action: &str, ts: i64) -> BehaviorEntry {
        BehaviorEntry {
            action: json!({"type": action}),
            outcome: json!({"success": true}),
            timestamp: ts,
        }
    }

    #[test]
    fn merge_appends_behaviors_and_overwrites_recipes() {
        let mut left = KnowledgeData::default();
        left.crafting.insert("stick".to_owned(), json!({"from": "planks"}));
        left.behaviors.insert("s1".to_owned(), vec![entry("dig", 1)]);

        let mut right = KnowledgeData::default();
        right.crafting.insert("stick".to_owned(), json!({"from": "bamboo"}));
        right.behaviors.insert("s1".to_owned(), vec![entry("move", 2)]);
        right.behaviors.insert("s2".to_owned(), vec![entry("chat", 3)]);

        left.merge(right);

        assert_eq!(left.crafting.get("stick"), Some(&json!({"from": "bamboo"})));
        let s1 = left.behaviors.get("s1").map(Vec::len);
        assert_eq!(s1, Some(2));
        assert_eq!(left.key_count(KnowledgeCategory::Behaviors), 2);
    }

    #[test]
    fn missing_categories_default_to_empty() {
        let parsed: Result<KnowledgeData, _> =
            serde_json::from_str(r#"{"crafting": {"torch": {"count": 4}}}"#);
        assert!(parsed.is_ok());
        let parsed = parsed.unwrap_or_default();
        assert_eq!(parsed.crafting.len(), 1);
        assert!(parsed.behaviors.is_empty());
        assert!(!parsed.is_empty());
    }
}
