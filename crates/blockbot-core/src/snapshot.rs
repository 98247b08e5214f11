//! The cached avatar situation snapshot.
//!
//! [`SnapshotCache::refresh`] is the only routine that recomputes the
//! snapshot. It is called on a timer, after every dispatched action and on
//! relevant world events, and does nothing while the avatar is not spawned.

use blockbot_types::{
    ActionKind, BlockPos, NearbyBlock, NearbyEntity, StateSnapshot, TrimmedSnapshot, Vec3,
};
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::trace;

use crate::chat::ChatLog;
use crate::config::SnapshotConfig;
use crate::connection::AvatarConnection;
use crate::session::{AvatarSession, EntityObservation};

/// Chat lines copied into each snapshot.
const SNAPSHOT_CHAT_LINES: usize = 10;

/// Process-wide snapshot, refreshed in place.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    inner: RwLock<StateSnapshot>,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the current snapshot.
    pub async fn get(&self) -> StateSnapshot {
        self.inner.read().await.clone()
    }

    /// Position, vitals and the first `max_items` inventory entries.
    pub async fn trimmed(&self, max_items: usize) -> TrimmedSnapshot {
        self.inner.read().await.trimmed(max_items)
    }

    /// Record the last dispatched action and its short outcome.
    pub async fn record_action(&self, action: ActionKind, result: impl Into<String>) {
        let mut snapshot = self.inner.write().await;
        snapshot.last_action = Some(action);
        snapshot.action_result = Some(result.into());
    }

    /// Overwrite the short outcome without changing the last action.
    pub async fn record_result(&self, result: impl Into<String>) {
        self.inner.write().await.action_result = Some(result.into());
    }

    /// Recompute the snapshot from the connection's world view.
    ///
    /// The world is read while the write lock is held, so concurrent
    /// refreshes land in the order they observed the world and a slow one
    /// cannot overwrite newer state. Returns `false` without touching the
    /// snapshot when the avatar has not spawned.
    pub async fn refresh(
        &self,
        connection: &AvatarConnection,
        chat: &ChatLog,
        config: &SnapshotConfig,
    ) -> bool {
        let recent_chats = chat.recent(SNAPSHOT_CHAT_LINES).await;
        let mut snapshot = self.inner.write().await;

        let session = connection.session();
        let Some(status) = session.status() else {
            trace!("skipping snapshot refresh, avatar not spawned");
            return false;
        };
        snapshot.nearby_blocks = scan_blocks(
            session,
            status.position.block(),
            config.block_radius,
            config.max_blocks,
        );
        snapshot.nearby_entities = nearby_entities(
            session.entities(),
            status.position,
            session.username(),
            config.entity_radius,
        );
        snapshot.position = Some(status.position);
        snapshot.health = status.health;
        snapshot.food = status.food;
        snapshot.inventory = status.inventory;
        snapshot.recent_chats = recent_chats;
        snapshot.refreshed_at = Some(Utc::now());
        true
    }
}

/// Non-empty blocks in the cube of half-width `radius` around `center`,
/// nearest first, at most `max`.
pub fn scan_blocks(
    session: &dyn AvatarSession,
    center: BlockPos,
    radius: i32,
    max: usize,
) -> Vec<NearbyBlock> {
    let radius = radius.max(0);
    let low = radius.saturating_neg();
    let mut blocks = Vec::new();
    for dx in low..=radius {
        for dy in low..=radius {
            for dz in low..=radius {
                let pos = center.offset(dx, dy, dz);
                let Some(block) = session.block_at(pos) else {
                    continue;
                };
                if block.is_empty() {
                    continue;
                }
                blocks.push(NearbyBlock {
                    name: block.name,
                    position: pos,
                    distance: pos.distance_to(&center),
                });
            }
        }
    }
    blocks.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    blocks.truncate(max);
    blocks
}

/// Physical entities within `radius` of `origin`, excluding the avatar.
pub fn nearby_entities(
    entities: Vec<EntityObservation>,
    origin: Vec3,
    own_username: &str,
    radius: f64,
) -> Vec<NearbyEntity> {
    entities
        .into_iter()
        .filter(|e| e.kind.is_physical())
        .filter(|e| e.username.as_deref() != Some(own_username))
        .filter_map(|e| {
            let distance = e.position.distance_to(&origin);
            (distance <= radius).then(|| NearbyEntity {
                name: e.label().to_owned(),
                kind: e.kind,
                distance,
                position: e.position,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use blockbot_types::{CapabilityKind, EntityKind};
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::session::{
        AvatarStatus, BlockCollector, BlockObservation, CapabilityError, FrameRenderer,
        MovementPlanner, Recipe, SessionError, ToolSelector,
    };

    /// A session whose avatar stands wherever the test puts it, in a void.
    #[derive(Debug)]
    struct StandingSession {
        position: Mutex<Vec3>,
    }

    impl StandingSession {
        fn move_to(&self, position: Vec3) {
            if let Ok(mut current) = self.position.lock() {
                *current = position;
            }
        }
    }

    fn unavailable(capability: CapabilityKind) -> CapabilityError {
        CapabilityError::Unavailable { capability }
    }

    #[async_trait]
    impl AvatarSession for StandingSession {
        fn username(&self) -> &str {
            "AI"
        }

        fn version(&self) -> &str {
            "1.20.1"
        }

        fn status(&self) -> Option<AvatarStatus> {
            let position = self.position.lock().ok().map(|p| *p)?;
            Some(AvatarStatus {
                position,
                health: 20.0,
                food: 20,
                inventory: Vec::new(),
                held_item: None,
            })
        }

        fn block_at(&self, _pos: BlockPos) -> Option<BlockObservation> {
            None
        }

        fn entities(&self) -> Vec<EntityObservation> {
            Vec::new()
        }

        fn find_blocks(&self, _block: &str, _radius: f64, _max: usize) -> Vec<BlockPos> {
            Vec::new()
        }

        fn is_known_block(&self, _name: &str) -> bool {
            false
        }

        fn is_known_item(&self, _name: &str) -> bool {
            false
        }

        fn recipes_for(&self, _item: &str) -> Vec<Recipe> {
            Vec::new()
        }

        async fn set_view_distance(&self, _chunks: u8) -> Result<(), SessionError> {
            Ok(())
        }

        async fn look_at(&self, _point: Vec3) -> Result<(), SessionError> {
            Ok(())
        }

        async fn equip(&self, _item: &str) -> Result<(), SessionError> {
            Err(SessionError::rejected("empty handed"))
        }

        async fn place_on(&self, _support: BlockPos) -> Result<(), SessionError> {
            Err(SessionError::rejected("nothing to place"))
        }

        async fn dig(
            &self,
            _pos: BlockPos,
            _cancel: &CancellationToken,
        ) -> Result<(), SessionError> {
            Err(SessionError::rejected("nothing to dig"))
        }

        async fn craft(
            &self,
            _recipe: &Recipe,
            _count: u32,
            _station: Option<BlockPos>,
        ) -> Result<(), SessionError> {
            Err(SessionError::rejected("no ingredients"))
        }

        async fn attack(&self, _entity_id: u32) -> Result<(), SessionError> {
            Err(SessionError::rejected("no target"))
        }

        async fn chat(&self, _message: &str) -> Result<(), SessionError> {
            Ok(())
        }

        async fn toss(&self, _item: &str, _count: u32) -> Result<(), SessionError> {
            Err(SessionError::rejected("empty handed"))
        }

        async fn load_movement(&self) -> Result<Arc<dyn MovementPlanner>, CapabilityError> {
            Err(unavailable(CapabilityKind::Movement))
        }

        async fn load_collector(&self) -> Result<Arc<dyn BlockCollector>, CapabilityError> {
            Err(unavailable(CapabilityKind::Collection))
        }

        async fn load_tool_selector(&self) -> Result<Arc<dyn ToolSelector>, CapabilityError> {
            Err(unavailable(CapabilityKind::ToolSelection))
        }

        async fn load_renderer(&self) -> Result<Arc<dyn FrameRenderer>, CapabilityError> {
            Err(unavailable(CapabilityKind::Rendering))
        }
    }

    fn observed(id: u32, name: &str, kind: EntityKind, x: f64) -> EntityObservation {
        EntityObservation {
            id,
            name: Some(name.to_owned()),
            username: (kind == EntityKind::Player).then(|| name.to_owned()),
            display_name: None,
            kind,
            position: Vec3::new(x, 64.0, 0.0),
            height: 1.8,
        }
    }

    #[test]
    fn nearby_entities_excludes_self_objects_and_far_entities() {
        let entities = vec![
            observed(1, "AI", EntityKind::Player, 0.0),
            observed(2, "item", EntityKind::Object, 1.0),
            observed(3, "cow", EntityKind::Mob, 4.0),
            observed(4, "zombie", EntityKind::Mob, 40.0),
            observed(5, "Steve", EntityKind::Player, 10.0),
        ];
        let nearby = nearby_entities(entities, Vec3::new(0.0, 64.0, 0.0), "AI", 16.0);
        let names: Vec<&str> = nearby.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["cow", "Steve"]);
    }

    #[tokio::test]
    async fn record_action_sets_last_action_and_result() {
        let cache = SnapshotCache::new();
        cache.record_action(ActionKind::Dig, "success").await;
        let snapshot = cache.get().await;
        assert_eq!(snapshot.last_action, Some(ActionKind::Dig));
        assert_eq!(snapshot.action_result.as_deref(), Some("success"));

        cache.record_result("died").await;
        let snapshot = cache.get().await;
        assert_eq!(snapshot.last_action, Some(ActionKind::Dig));
        assert_eq!(snapshot.action_result.as_deref(), Some("died"));
    }

    #[tokio::test]
    async fn refresh_blocked_on_the_lock_reads_the_world_once_it_holds_it() {
        let before = Vec3::new(0.5, 64.0, 0.5);
        let after = Vec3::new(8.5, 64.0, 0.5);
        let session = Arc::new(StandingSession {
            position: Mutex::new(before),
        });
        let connection = AvatarConnection::establish(session.clone(), 8).await;
        let cache = SnapshotCache::new();
        let chat = ChatLog::new(10);
        let config = SnapshotConfig::default();

        let held = cache.inner.write().await;
        let pending = cache.refresh(&connection, &chat, &config);
        tokio::pin!(pending);
        let blocked = tokio::time::timeout(Duration::from_millis(20), pending.as_mut()).await;
        assert!(blocked.is_err());

        // A newer refresh's world state lands while the first one waits.
        session.move_to(after);
        drop(held);

        assert!(pending.await);
        assert_eq!(cache.get().await.position, Some(after));
    }
}
