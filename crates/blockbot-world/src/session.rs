//! One avatar session on a [`SimServer`](crate::SimServer).

use std::sync::Arc;

use async_trait::async_trait;
use blockbot_core::session::{
    AvatarSession, AvatarStatus, BlockCollector, BlockObservation, CapabilityError,
    EntityObservation, FrameRenderer, MovementPlanner, Recipe, SessionError, SessionEvent,
    ToolSelector, is_empty_block,
};
use blockbot_types::{BlockPos, CapabilityKind, Vec3};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::capabilities::{SimCollector, SimMovement, SimRenderer, SimToolSelector};
use crate::catalog;
use crate::error::WorldError;
use crate::grid::World;
use crate::server::{Link, Shared};

/// A session opened by [`SimServer`](crate::SimServer).
#[derive(Debug)]
pub struct SimSession {
    shared: Arc<Shared>,
    link: Arc<Link>,
    username: String,
    version: String,
}

impl SimSession {
    pub(crate) const fn new(
        shared: Arc<Shared>,
        link: Arc<Link>,
        username: String,
        version: String,
    ) -> Self {
        Self {
            shared,
            link,
            username,
            version,
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.link.is_closed() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Run a world mutation on behalf of this session.
    fn apply<T>(&self, f: impl FnOnce(&mut World) -> Result<T, WorldError>) -> Result<T, SessionError> {
        self.ensure_open()?;
        let mut world = self.shared.world();
        Ok(f(&mut world)?)
    }

    /// Run a world mutation and forward the events it caused.
    fn apply_events(
        &self,
        f: impl FnOnce(&mut World) -> Result<Vec<SessionEvent>, WorldError>,
    ) -> Result<(), SessionError> {
        let events = self.apply(f)?;
        self.link.emit(events);
        Ok(())
    }

    fn check_capability(&self, capability: CapabilityKind) -> Result<(), CapabilityError> {
        if self.shared.options().disabled.contains(&capability) {
            return Err(CapabilityError::LoadFailed {
                capability,
                message: "disabled on this server".to_owned(),
            });
        }
        if self.link.is_closed() {
            return Err(CapabilityError::LoadFailed {
                capability,
                message: SessionError::Closed.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AvatarSession for SimSession {
    fn username(&self) -> &str {
        &self.username
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn status(&self) -> Option<AvatarStatus> {
        if self.link.is_closed() {
            return None;
        }
        self.shared.world().status()
    }

    fn block_at(&self, pos: BlockPos) -> Option<BlockObservation> {
        self.shared.world().block_at(pos).map(|name| BlockObservation {
            pos,
            name: name.to_owned(),
        })
    }

    fn entities(&self) -> Vec<EntityObservation> {
        self.shared.world().entities()
    }

    fn find_blocks(&self, block: &str, radius: f64, max: usize) -> Vec<BlockPos> {
        let world = self.shared.world();
        let Some(origin) = world.avatar().map(|a| a.position) else {
            return Vec::new();
        };
        world.find_blocks(block, origin, radius, max)
    }

    fn is_known_block(&self, name: &str) -> bool {
        catalog::is_block(name)
    }

    fn is_known_item(&self, name: &str) -> bool {
        catalog::is_item(name)
    }

    fn recipes_for(&self, item: &str) -> Vec<Recipe> {
        catalog::recipes_for(item)
    }

    async fn set_view_distance(&self, chunks: u8) -> Result<(), SessionError> {
        self.apply(|world| {
            world.set_view_distance(chunks);
            Ok(())
        })
    }

    async fn look_at(&self, point: Vec3) -> Result<(), SessionError> {
        self.apply(|world| world.look_at(point))
    }

    async fn equip(&self, item: &str) -> Result<(), SessionError> {
        self.apply(|world| world.equip(item))
    }

    async fn place_on(&self, support: BlockPos) -> Result<(), SessionError> {
        self.apply_events(|world| world.place_on(support))
    }

    async fn dig(&self, pos: BlockPos, cancel: &CancellationToken) -> Result<(), SessionError> {
        let name = self
            .block_at(pos)
            .ok_or_else(|| SessionError::from(WorldError::NotLoaded(pos)))?
            .name;
        if is_empty_block(&name) {
            return Err(WorldError::EmptyCell(pos).into());
        }
        debug!(%pos, block = %name, "digging");
        tokio::select! {
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            () = tokio::time::sleep(self.shared.options().step_delay) => {}
        }
        self.apply_events(|world| world.dig(pos))
    }

    async fn craft(
        &self,
        recipe: &Recipe,
        count: u32,
        station: Option<BlockPos>,
    ) -> Result<(), SessionError> {
        self.apply_events(|world| world.craft(recipe, count, station))
    }

    async fn attack(&self, entity_id: u32) -> Result<(), SessionError> {
        self.apply_events(|world| world.attack(entity_id))
    }

    async fn chat(&self, message: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.link.emit([SessionEvent::Chat {
            sender: self.username.clone(),
            message: message.to_owned(),
        }]);
        Ok(())
    }

    async fn toss(&self, item: &str, count: u32) -> Result<(), SessionError> {
        self.apply_events(|world| world.toss(item, count))
    }

    async fn load_movement(&self) -> Result<Arc<dyn MovementPlanner>, CapabilityError> {
        self.check_capability(CapabilityKind::Movement)?;
        Ok(Arc::new(SimMovement::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.link),
        )))
    }

    async fn load_collector(&self) -> Result<Arc<dyn BlockCollector>, CapabilityError> {
        self.check_capability(CapabilityKind::Collection)?;
        Ok(Arc::new(SimCollector::new(
            Arc::clone(&self.shared),
            Arc::clone(&self.link),
        )))
    }

    async fn load_tool_selector(&self) -> Result<Arc<dyn ToolSelector>, CapabilityError> {
        self.check_capability(CapabilityKind::ToolSelection)?;
        Ok(Arc::new(SimToolSelector::new(Arc::clone(&self.shared))))
    }

    async fn load_renderer(&self) -> Result<Arc<dyn FrameRenderer>, CapabilityError> {
        self.check_capability(CapabilityKind::Rendering)?;
        Ok(Arc::new(SimRenderer::new(Arc::clone(&self.shared))))
    }
}
