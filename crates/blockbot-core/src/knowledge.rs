//! Durable, write-through knowledge store.
//!
//! The store is a single JSON document holding every
//! [`KnowledgeCategory`]. It is read once at startup and rewritten in full
//! after every mutation: the document is written to a sibling temp file
//! and renamed over the original, so a crash mid-write leaves the previous
//! version intact.
//!
//! A missing or unreadable file is never fatal. The store starts empty and
//! the problem is logged.

use std::path::{Path, PathBuf};

use blockbot_types::{
    BehaviorEntry, BlockPos, ExplorationRecord, KnowledgeCategory, KnowledgeData,
    ResourceSighting,
};
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors from knowledge store operations.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// Reading or writing the knowledge file failed.
    #[error("knowledge file I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Serializing the store failed.
    #[error("knowledge serialization failed: {source}")]
    Json {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// `learn` was called for a category that only accepts appends.
    #[error("{category:?} records are append-only, use record")]
    AppendOnly {
        /// The category.
        category: KnowledgeCategory,
    },

    /// `record` was called for a category that only accepts overwrites.
    #[error("{category:?} records are keyed, use learn")]
    Keyed {
        /// The category.
        category: KnowledgeCategory,
    },

    /// An entry did not have the shape its category requires.
    #[error("invalid {category:?} entry: {reason}")]
    InvalidEntry {
        /// The category.
        category: KnowledgeCategory,
        /// Parser diagnostic.
        reason: String,
    },
}

/// The durable knowledge store.
#[derive(Debug)]
pub struct KnowledgeStore {
    path: PathBuf,
    data: Mutex<KnowledgeData>,
}

impl KnowledgeStore {
    /// Create an empty store that persists to `path` without reading it.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: Mutex::new(KnowledgeData::default()),
        }
    }

    /// Load the store from `path`.
    ///
    /// A missing file yields an empty store. A file that cannot be read or
    /// parsed also yields an empty store, with a warning.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str::<KnowledgeData>(&contents) {
                Ok(data) => {
                    info!(
                        path = %path.display(),
                        crafting = data.crafting.len(),
                        behaviors = data.behaviors.len(),
                        "knowledge loaded"
                    );
                    data
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "knowledge file is corrupt, starting empty");
                    KnowledgeData::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no knowledge file, starting empty");
                KnowledgeData::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read knowledge file, starting empty");
                KnowledgeData::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    /// Where the store persists.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A copy of the full store.
    pub async fn snapshot(&self) -> KnowledgeData {
        self.data.lock().await.clone()
    }

    /// Overwrite `key` in a keyed category and persist.
    ///
    /// For [`KnowledgeCategory::Exploration`] the value becomes the area
    /// details and the visit time is stamped now.
    pub async fn learn(
        &self,
        category: KnowledgeCategory,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), KnowledgeError> {
        let mut data = self.data.lock().await;
        match category {
            KnowledgeCategory::Crafting => {
                data.crafting.insert(key.to_owned(), value);
            }
            KnowledgeCategory::Building => {
                data.building.insert(key.to_owned(), value);
            }
            KnowledgeCategory::Exploration => {
                data.exploration.insert(
                    key.to_owned(),
                    ExplorationRecord {
                        details: value,
                        last_visited: now_millis(),
                    },
                );
            }
            KnowledgeCategory::Resources | KnowledgeCategory::Behaviors => {
                return Err(KnowledgeError::AppendOnly { category });
            }
        }
        debug!(?category, key, "knowledge learned");
        self.persist(&data).await
    }

    /// Append an entry to a list category and persist.
    ///
    /// The entry is parsed into the category's record shape; a missing
    /// `timestamp` is stamped now.
    pub async fn record(
        &self,
        category: KnowledgeCategory,
        key: &str,
        entry: serde_json::Value,
    ) -> Result<(), KnowledgeError> {
        let entry = with_timestamp(entry);
        let invalid = |e: serde_json::Error| KnowledgeError::InvalidEntry {
            category,
            reason: e.to_string(),
        };
        let mut data = self.data.lock().await;
        match category {
            KnowledgeCategory::Behaviors => {
                let entry: BehaviorEntry = serde_json::from_value(entry).map_err(invalid)?;
                data.behaviors.entry(key.to_owned()).or_default().push(entry);
            }
            KnowledgeCategory::Resources => {
                let entry: ResourceSighting = serde_json::from_value(entry).map_err(invalid)?;
                data.resources.entry(key.to_owned()).or_default().push(entry);
            }
            KnowledgeCategory::Crafting
            | KnowledgeCategory::Building
            | KnowledgeCategory::Exploration => {
                return Err(KnowledgeError::Keyed { category });
            }
        }
        debug!(?category, key, "knowledge recorded");
        self.persist(&data).await
    }

    /// Append a behavior outcome under `fingerprint` and persist.
    pub async fn record_behavior(
        &self,
        fingerprint: &str,
        entry: BehaviorEntry,
    ) -> Result<(), KnowledgeError> {
        let mut data = self.data.lock().await;
        data.behaviors
            .entry(fingerprint.to_owned())
            .or_default()
            .push(entry);
        self.persist(&data).await
    }

    /// Append a sighting of `block` at `pos` unless that position is
    /// already recorded. Returns whether a sighting was added.
    pub async fn record_resource(&self, block: &str, pos: BlockPos) -> Result<bool, KnowledgeError> {
        let mut data = self.data.lock().await;
        let sightings = data.resources.entry(block.to_owned()).or_default();
        if sightings.iter().any(|s| s.pos == pos) {
            return Ok(false);
        }
        sightings.push(ResourceSighting {
            pos,
            timestamp: now_millis(),
        });
        debug!(block, %pos, "resource sighted");
        self.persist(&data).await?;
        Ok(true)
    }

    /// Merge `other` into the store and persist.
    pub async fn merge(&self, other: KnowledgeData) -> Result<(), KnowledgeError> {
        let mut data = self.data.lock().await;
        data.merge(other);
        self.persist(&data).await
    }

    /// Write the whole store to a temp file and rename it into place.
    async fn persist(&self, data: &KnowledgeData) -> Result<(), KnowledgeError> {
        let json = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Insert `timestamp: now` into an object that lacks one.
fn with_timestamp(mut entry: serde_json::Value) -> serde_json::Value {
    if let serde_json::Value::Object(fields) = &mut entry {
        fields
            .entry("timestamp")
            .or_insert_with(|| serde_json::Value::from(now_millis()));
    }
    entry
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("blockbot-knowledge-{}.json", uuid::Uuid::new_v4()))
    }

    fn behavior(action: &str, ts: i64) -> BehaviorEntry {
        BehaviorEntry {
            action: json!({"type": action}),
            outcome: json!({"success": true}),
            timestamp: ts,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let store = KnowledgeStore::load(temp_path()).await;
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let path = temp_path();
        let _ = tokio::fs::write(&path, "{not json").await;
        let store = KnowledgeStore::load(&path).await;
        assert!(store.snapshot().await.is_empty());
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn persisted_merge_reloads_identically() {
        let path = temp_path();
        let store = KnowledgeStore::load(&path).await;

        let mut first = KnowledgeData::default();
        first.crafting.insert("stick".to_owned(), json!({"oak_planks": 2}));
        first.behaviors.insert("fp".to_owned(), vec![behavior("dig", 1)]);
        let mut second = KnowledgeData::default();
        second.building.insert("hut".to_owned(), json!([[0, 0, 0]]));
        second.behaviors.insert("fp".to_owned(), vec![behavior("move", 2)]);

        assert!(store.merge(first.clone()).await.is_ok());
        assert!(store.merge(second.clone()).await.is_ok());

        let mut expected = first;
        expected.merge(second);
        assert_eq!(store.snapshot().await, expected);

        let reloaded = KnowledgeStore::load(&path).await;
        assert_eq!(reloaded.snapshot().await, expected);
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn learn_rejects_append_only_categories() {
        let path = temp_path();
        let store = KnowledgeStore::empty(&path);
        let result = store
            .learn(KnowledgeCategory::Behaviors, "fp", json!({}))
            .await;
        assert!(matches!(result, Err(KnowledgeError::AppendOnly { .. })));
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn record_stamps_missing_timestamp_and_validates_shape() {
        let path = temp_path();
        let store = KnowledgeStore::empty(&path);

        let ok = store
            .record(
                KnowledgeCategory::Behaviors,
                "fp",
                json!({"action": {"type": "look"}, "outcome": {"success": true}}),
            )
            .await;
        assert!(ok.is_ok());
        let data = store.snapshot().await;
        let stamped = data
            .behaviors
            .get("fp")
            .and_then(|entries| entries.first())
            .map(|e| e.timestamp);
        assert!(stamped.is_some_and(|ts| ts > 0));

        let bad = store
            .record(KnowledgeCategory::Resources, "iron_ore", json!({"pos": "here"}))
            .await;
        assert!(matches!(bad, Err(KnowledgeError::InvalidEntry { .. })));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn resource_sightings_are_deduplicated_by_position() {
        let path = temp_path();
        let store = KnowledgeStore::empty(&path);
        let pos = BlockPos::new(4, 12, -9);
        assert!(store.record_resource("iron_ore", pos).await.unwrap_or(false));
        assert!(!store.record_resource("iron_ore", pos).await.unwrap_or(true));
        let count = store
            .snapshot()
            .await
            .resources
            .get("iron_ore")
            .map(Vec::len);
        assert_eq!(count, Some(1));
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn exploration_learn_stamps_visit_time() {
        let path = temp_path();
        let store = KnowledgeStore::empty(&path);
        let learned = store
            .learn(KnowledgeCategory::Exploration, "0,-1", json!({"blocks": {"stone": 4}}))
            .await;
        assert!(learned.is_ok());
        let data = store.snapshot().await;
        let visited = data.exploration.get("0,-1").map(|r| r.last_visited);
        assert!(visited.is_some_and(|ts| ts > 0));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
