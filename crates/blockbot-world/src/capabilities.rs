//! Capabilities loaded from a [`SimSession`](crate::SimSession).
//!
//! Movement is straight-line: the avatar advances one block per step delay
//! toward its goal, ignoring terrain. Background goals run in a spawned task
//! that [`MovementPlanner::stop`] cancels.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blockbot_core::session::{
    BlockCollector, Frame, FrameRenderer, Goal, MovementOptions, MovementPlanner, SessionError,
    ToolSelector,
};
use blockbot_types::{BlockPos, Vec3};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog;
use crate::grid::World;
use crate::server::{Link, Shared, lock};

/// Blocks advanced per step.
const STEP_LENGTH: f64 = 1.0;

/// How close the collector walks to a block before breaking it.
const COLLECT_RADIUS: f64 = 2.0;

/// Half-width of the rendered top-down map.
const RENDER_RADIUS: i32 = 4;

/// Where a goal currently points.
fn resolve(world: &World, goal: Goal) -> Result<(Vec3, f64), SessionError> {
    match goal {
        Goal::Near { target, radius } => Ok((target, radius)),
        Goal::Follow { entity_id, radius } => world
            .entity_position(entity_id)
            .map(|position| (position, radius))
            .ok_or_else(|| SessionError::rejected(format!("entity {entity_id} is gone"))),
    }
}

/// Take one step toward `goal`. Returns `true` once the goal is satisfied.
fn advance(shared: &Shared, link: &Link, goal: Goal) -> Result<bool, SessionError> {
    if link.is_closed() {
        return Err(SessionError::Closed);
    }
    let step = {
        let mut world = shared.world();
        let (target, radius) = resolve(&world, goal)?;
        world.step_avatar(target, radius, STEP_LENGTH)?
    };
    match step {
        Some(event) => {
            link.emit([event]);
            Ok(false)
        }
        None => Ok(true),
    }
}

/// Walk until `goal` is satisfied or `cancel` fires.
async fn walk(
    shared: &Shared,
    link: &Link,
    goal: Goal,
    cancel: &CancellationToken,
) -> Result<(), SessionError> {
    loop {
        if advance(shared, link, goal)? {
            return Ok(());
        }
        tokio::select! {
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            () = tokio::time::sleep(shared.options().step_delay) => {}
        }
    }
}

/// Keep pursuing `goal` until cancelled or it becomes impossible.
async fn pursue(shared: Arc<Shared>, link: Arc<Link>, goal: Goal, cancel: CancellationToken) {
    loop {
        if let Err(e) = advance(&shared, &link, goal) {
            debug!(error = %e, "background goal abandoned");
            break;
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(shared.options().step_delay) => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Straight-line movement planner.
#[derive(Debug)]
pub struct SimMovement {
    shared: Arc<Shared>,
    link: Arc<Link>,
    background: Mutex<Option<CancellationToken>>,
}

impl SimMovement {
    pub(crate) const fn new(shared: Arc<Shared>, link: Arc<Link>) -> Self {
        Self {
            shared,
            link,
            background: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MovementPlanner for SimMovement {
    async fn goto(
        &self,
        goal: Goal,
        options: MovementOptions,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        debug!(?goal, ?options, "goto");
        walk(&self.shared, &self.link, goal, cancel).await
    }

    fn set_goal(&self, goal: Goal, options: MovementOptions) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no runtime to pursue background goal");
            return;
        };
        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.background).replace(token.clone()) {
            previous.cancel();
        }
        debug!(?goal, ?options, "background goal set");
        runtime.spawn(pursue(
            Arc::clone(&self.shared),
            Arc::clone(&self.link),
            goal,
            token,
        ));
    }

    fn stop(&self) {
        if let Some(token) = lock(&self.background).take() {
            token.cancel();
        }
    }
}

impl Drop for SimMovement {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// Walks to a block, breaks it with the best tool and picks up the drop.
#[derive(Debug)]
pub struct SimCollector {
    shared: Arc<Shared>,
    link: Arc<Link>,
}

impl SimCollector {
    pub(crate) const fn new(shared: Arc<Shared>, link: Arc<Link>) -> Self {
        Self { shared, link }
    }
}

#[async_trait]
impl BlockCollector for SimCollector {
    async fn collect(&self, pos: BlockPos, cancel: &CancellationToken) -> Result<(), SessionError> {
        let goal = Goal::Near {
            target: pos.center(),
            radius: COLLECT_RADIUS,
        };
        walk(&self.shared, &self.link, goal, cancel).await?;
        {
            let mut world = self.shared.world();
            equip_best_tool(&mut world, pos)?;
        }
        tokio::select! {
            () = cancel.cancelled() => return Err(SessionError::Cancelled),
            () = tokio::time::sleep(self.shared.options().step_delay) => {}
        }
        if self.link.is_closed() {
            return Err(SessionError::Closed);
        }
        let events = self.shared.world().dig(pos)?;
        self.link.emit(events);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tool selection
// ---------------------------------------------------------------------------

/// Equip the highest-tier held tool whose class suits the block at `pos`.
fn equip_best_tool(world: &mut World, pos: BlockPos) -> Result<Option<String>, SessionError> {
    let class = world
        .block_at(pos)
        .and_then(catalog::block_spec)
        .and_then(|spec| spec.tool);
    let Some(class) = class else {
        return Ok(None);
    };
    let best = world.avatar().and_then(|avatar| {
        avatar
            .inventory
            .names()
            .filter_map(catalog::tool_spec)
            .filter(|tool| tool.class == class)
            .max_by_key(|tool| tool.tier)
            .map(|tool| tool.name)
    });
    let Some(best) = best else {
        return Ok(None);
    };
    world.equip(best)?;
    Ok(Some(best.to_owned()))
}

/// Picks tools from the inventory catalog.
#[derive(Debug)]
pub struct SimToolSelector {
    shared: Arc<Shared>,
}

impl SimToolSelector {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

#[async_trait]
impl ToolSelector for SimToolSelector {
    async fn equip_best_tool(&self, pos: BlockPos) -> Result<Option<String>, SessionError> {
        let mut world = self.shared.world();
        equip_best_tool(&mut world, pos)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Renders a top-down text map around the avatar.
#[derive(Debug)]
pub struct SimRenderer {
    shared: Arc<Shared>,
}

impl SimRenderer {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

/// Map glyph for the top block of a column.
fn glyph(name: &str) -> char {
    match name {
        "grass_block" => '"',
        "dirt" => ':',
        "stone" | "cobblestone" => '#',
        "oak_log" => 'T',
        "oak_leaves" => '*',
        "oak_planks" => '=',
        "crafting_table" => '+',
        "coal_ore" | "iron_ore" => '%',
        "bedrock" => 'B',
        _ => '?',
    }
}

/// Top-down map of the columns around `center`, one row per z.
pub fn render_map(world: &World, center: BlockPos, radius: i32) -> String {
    let entities: Vec<BlockPos> = world
        .entities()
        .iter()
        .map(|e| e.position.block())
        .collect();
    let mut map = String::new();
    for z in center.z.saturating_sub(radius)..=center.z.saturating_add(radius) {
        for x in center.x.saturating_sub(radius)..=center.x.saturating_add(radius) {
            let cell = if x == center.x && z == center.z {
                '@'
            } else if entities.iter().any(|e| e.x == x && e.z == z) {
                'e'
            } else {
                top_block(world, x, z, center.y).map_or(' ', glyph)
            };
            map.push(cell);
        }
        map.push('\n');
    }
    map
}

/// Highest non-empty block in the column within 8 cells of `y`.
fn top_block(world: &World, x: i32, z: i32, y: i32) -> Option<&str> {
    (y.saturating_sub(8)..=y.saturating_add(8))
        .rev()
        .filter_map(|y| world.block_at(BlockPos::new(x, y, z)))
        .find(|name| !blockbot_core::session::is_empty_block(name))
}

#[async_trait]
impl FrameRenderer for SimRenderer {
    async fn render(&self) -> Result<Frame, SessionError> {
        let world = self.shared.world();
        let avatar = world.avatar().ok_or(SessionError::NotSpawned)?;
        let center = avatar.position.block();
        let mut data = String::new();
        let _ = writeln!(data, "facing {}", avatar.facing);
        data.push_str(&render_map(&world, center, RENDER_RADIUS));
        Ok(Frame {
            mime: "text/plain".to_owned(),
            data,
        })
    }
}
