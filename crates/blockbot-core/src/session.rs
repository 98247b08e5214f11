//! Narrow interfaces to the avatar session and its capabilities.
//!
//! The engine never speaks a game protocol itself. A [`Connector`] opens an
//! [`AvatarSession`], which exposes the avatar's observable world view and
//! its primitive actions. Movement planning, block collection, tool
//! selection and frame rendering are separate capabilities loaded from the
//! session after it connects; any of them may fail to load.
//!
//! Long-running calls take a [`CancellationToken`]. Implementations should
//! stop at the next safe point once it is cancelled; ones that cannot will
//! keep running after the dispatcher has given up on them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use blockbot_types::{BlockPos, CapabilityKind, EntityKind, InventoryItem, Vec3};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Block names that count as an empty cell.
pub const EMPTY_BLOCKS: [&str; 3] = ["air", "cave_air", "void_air"];

/// Whether `name` is an empty block.
pub fn is_empty_block(name: &str) -> bool {
    EMPTY_BLOCKS.contains(&name)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a connect attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectError {
    /// The server refused the connection.
    #[error("connection refused: {message}")]
    Refused {
        /// Transport detail.
        message: String,
    },

    /// The connection was reset during login.
    #[error("connection reset: {message}")]
    Reset {
        /// Transport detail.
        message: String,
    },

    /// The attempt did not finish within the connect timeout.
    #[error("connect attempt timed out")]
    Timeout,

    /// The server rejected the avatar's credentials.
    #[error("authentication rejected: {message}")]
    AuthRejected {
        /// Server detail.
        message: String,
    },

    /// The server does not speak the configured protocol version.
    #[error("protocol version {version} not supported by server")]
    VersionMismatch {
        /// The version that was offered.
        version: String,
    },
}

impl ConnectError {
    /// Whether a later attempt might succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. } | Self::Reset { .. } | Self::Timeout
        )
    }
}

/// A primitive session call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The avatar has not materialized in the world.
    #[error("avatar is not spawned")]
    NotSpawned,

    /// The call was cancelled before it finished.
    #[error("cancelled")]
    Cancelled,

    /// The session has ended.
    #[error("session closed")]
    Closed,

    /// The world refused the operation.
    #[error("{message}")]
    Rejected {
        /// Reason given by the world.
        message: String,
    },
}

impl SessionError {
    /// Shorthand for [`SessionError::Rejected`].
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }
}

/// A capability could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The capability did not load for the current connection.
    #[error("{capability} capability is unavailable")]
    Unavailable {
        /// Which capability.
        capability: CapabilityKind,
    },

    /// Loading the capability failed.
    #[error("failed to load {capability} capability: {message}")]
    LoadFailed {
        /// Which capability.
        capability: CapabilityKind,
        /// Loader detail.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// The avatar's own state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarStatus {
    /// Current position.
    pub position: Vec3,
    /// Health points (0-20).
    pub health: f32,
    /// Food points (0-20).
    pub food: u32,
    /// Occupied inventory slots in slot order.
    pub inventory: Vec<InventoryItem>,
    /// Item held in the main hand.
    pub held_item: Option<String>,
}

impl AvatarStatus {
    /// Total count of the named item across all slots.
    pub fn count_of(&self, item: &str) -> u32 {
        self.inventory
            .iter()
            .filter(|i| i.name == item)
            .fold(0_u32, |acc, i| acc.saturating_add(i.count))
    }
}

/// One entity the session can see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityObservation {
    /// Session-local entity ID.
    pub id: u32,
    /// Entity type name (`cow`, `zombie`, `player`).
    pub name: Option<String>,
    /// Username, for players.
    pub username: Option<String>,
    /// Custom or display name.
    pub display_name: Option<String>,
    /// Broad classification.
    pub kind: EntityKind,
    /// Feet position.
    pub position: Vec3,
    /// Height of the bounding box, used to aim at the head.
    pub height: f64,
}

impl EntityObservation {
    /// Best available label: username, then display name, then type name.
    pub fn label(&self) -> &str {
        self.username
            .as_deref()
            .or(self.display_name.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("unknown")
    }

    /// Whether `query` matches the entity's name, username or display name.
    pub fn matches(&self, query: &str) -> bool {
        [&self.name, &self.username, &self.display_name]
            .into_iter()
            .flatten()
            .any(|candidate| candidate.eq_ignore_ascii_case(query))
    }

    /// Point to look at when facing the entity.
    pub fn head(&self) -> Vec3 {
        self.position.offset(0.0, self.height, 0.0)
    }
}

/// A block cell as the session sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockObservation {
    /// Cell coordinates.
    pub pos: BlockPos,
    /// Catalog name (`air` for empty cells).
    pub name: String,
}

impl BlockObservation {
    /// Whether the cell holds nothing.
    pub fn is_empty(&self) -> bool {
        is_empty_block(&self.name)
    }
}

/// One way to craft an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    /// Item produced.
    pub item: String,
    /// Units produced per craft operation.
    pub count: u32,
    /// Item name to units consumed per craft operation.
    pub ingredients: BTreeMap<String, u32>,
    /// Whether the recipe needs a crafting station nearby.
    pub requires_station: bool,
}

/// A rendered first-person frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Media type of `data` (e.g. `image/png`).
    pub mime: String,
    /// Encoded frame payload, as produced by the renderer.
    pub data: String,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something the session observed or suffered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The avatar materialized (initially or after respawn).
    Spawned,
    /// The avatar moved.
    Moved {
        /// New position.
        position: Vec3,
    },
    /// A block cell changed.
    BlockChanged {
        /// The cell.
        pos: BlockPos,
        /// Previous block name.
        old: String,
        /// New block name.
        new: String,
    },
    /// An entity moved.
    EntityMoved {
        /// Session-local entity ID.
        id: u32,
        /// New position.
        position: Vec3,
    },
    /// Health or food changed.
    HealthChanged {
        /// Health points.
        health: f32,
        /// Food points.
        food: u32,
    },
    /// An item entered the inventory from the ground.
    ItemCollected {
        /// Item name.
        item: String,
        /// Units picked up.
        count: u32,
    },
    /// A player chat line.
    Chat {
        /// Sender username.
        sender: String,
        /// Message text.
        message: String,
    },
    /// A server notice.
    SystemMessage {
        /// Notice text.
        message: String,
    },
    /// A craft operation finished.
    CraftCompleted {
        /// Item produced.
        item: String,
        /// The recipe used.
        recipe: Recipe,
    },
    /// The avatar died.
    Death,
    /// The server removed the avatar.
    Kicked {
        /// Server-supplied reason.
        reason: String,
    },
    /// The session failed.
    Error {
        /// Failure detail.
        message: String,
        /// Whether reconnecting might help.
        transient: bool,
    },
    /// The session ended normally.
    Ended {
        /// End reason.
        reason: String,
    },
}

impl SessionEvent {
    /// Whether the event means the session is gone.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Kicked { .. } | Self::Error { .. } | Self::Ended { .. })
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Planner permissions applied to every movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MovementOptions {
    /// May break blocks in the way.
    pub allow_dig: bool,
    /// May pillar up with 1x1 towers.
    pub allow_towers: bool,
    /// May use free (parkour) motion.
    pub allow_free_motion: bool,
}

/// Where the movement planner should take the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Goal {
    /// Get within `radius` of a fixed point.
    Near {
        /// Target point.
        target: Vec3,
        /// Acceptable distance.
        radius: f64,
    },
    /// Stay within `radius` of a moving entity.
    Follow {
        /// Session-local entity ID.
        entity_id: u32,
        /// Acceptable distance.
        radius: f64,
    },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A freshly opened session and its event stream.
pub struct SessionHandle {
    /// The live session.
    pub session: Arc<dyn AvatarSession>,
    /// Events in the order the session observed them. The stream ends when
    /// the session is gone.
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl core::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("username", &self.session.username())
            .finish_non_exhaustive()
    }
}

/// Parameters for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Avatar username.
    pub username: String,
    /// Protocol version.
    pub version: String,
    /// Authentication mode.
    pub auth: String,
}

/// Opens avatar sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new session.
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionHandle, ConnectError>;
}

/// One live avatar session.
///
/// Observation methods read the session's local world view and never
/// block. Action methods are async and may take real time.
#[async_trait]
pub trait AvatarSession: Send + Sync {
    /// The avatar's username.
    fn username(&self) -> &str;

    /// The protocol version in use.
    fn version(&self) -> &str;

    /// The avatar's own state, or `None` before it has spawned.
    fn status(&self) -> Option<AvatarStatus>;

    /// The block at `pos`, or `None` when the cell is not loaded.
    fn block_at(&self, pos: BlockPos) -> Option<BlockObservation>;

    /// Entities other than the avatar itself.
    fn entities(&self) -> Vec<EntityObservation>;

    /// Up to `max` cells holding `block`, within `radius` of the avatar,
    /// nearest first.
    fn find_blocks(&self, block: &str, radius: f64, max: usize) -> Vec<BlockPos>;

    /// Whether `name` is a block in the world's catalog.
    fn is_known_block(&self, name: &str) -> bool;

    /// Whether `name` is an item in the world's catalog.
    fn is_known_item(&self, name: &str) -> bool;

    /// Recipes producing `item`, preferred first.
    fn recipes_for(&self, item: &str) -> Vec<Recipe>;

    /// Set the view distance in chunks.
    async fn set_view_distance(&self, chunks: u8) -> Result<(), SessionError>;

    /// Turn to face `point`.
    async fn look_at(&self, point: Vec3) -> Result<(), SessionError>;

    /// Hold `item` in the main hand.
    async fn equip(&self, item: &str) -> Result<(), SessionError>;

    /// Place the held item on the top face of `support`.
    async fn place_on(&self, support: BlockPos) -> Result<(), SessionError>;

    /// Break the block at `pos` with whatever is held.
    async fn dig(&self, pos: BlockPos, cancel: &CancellationToken) -> Result<(), SessionError>;

    /// Run `recipe` `count` times, at `station` when given.
    async fn craft(
        &self,
        recipe: &Recipe,
        count: u32,
        station: Option<BlockPos>,
    ) -> Result<(), SessionError>;

    /// Hit the entity with the given ID.
    async fn attack(&self, entity_id: u32) -> Result<(), SessionError>;

    /// Send a chat line.
    async fn chat(&self, message: &str) -> Result<(), SessionError>;

    /// Throw `count` of `item` out of the inventory.
    async fn toss(&self, item: &str, count: u32) -> Result<(), SessionError>;

    /// Load the movement planner.
    async fn load_movement(&self) -> Result<Arc<dyn MovementPlanner>, CapabilityError>;

    /// Load the block collection helper.
    async fn load_collector(&self) -> Result<Arc<dyn BlockCollector>, CapabilityError>;

    /// Load the tool selection helper.
    async fn load_tool_selector(&self) -> Result<Arc<dyn ToolSelector>, CapabilityError>;

    /// Load the frame renderer.
    async fn load_renderer(&self) -> Result<Arc<dyn FrameRenderer>, CapabilityError>;
}

/// Goal-driven movement.
#[async_trait]
pub trait MovementPlanner: Send + Sync {
    /// Move until `goal` is satisfied.
    async fn goto(
        &self,
        goal: Goal,
        options: MovementOptions,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError>;

    /// Start pursuing `goal` in the background, replacing any current goal.
    fn set_goal(&self, goal: Goal, options: MovementOptions);

    /// Abandon the current background goal.
    fn stop(&self);
}

/// Walks to a block and harvests it, picking up the drop.
#[async_trait]
pub trait BlockCollector: Send + Sync {
    /// Harvest the block at `pos`.
    async fn collect(&self, pos: BlockPos, cancel: &CancellationToken) -> Result<(), SessionError>;
}

/// Picks the best held tool for breaking a block.
#[async_trait]
pub trait ToolSelector: Send + Sync {
    /// Equip the best tool for `pos`. Returns the tool's name, or `None`
    /// when bare hands are best.
    async fn equip_best_tool(&self, pos: BlockPos) -> Result<Option<String>, SessionError>;
}

/// Renders first-person frames.
#[async_trait]
pub trait FrameRenderer: Send + Sync {
    /// Render one frame from the avatar's eyes.
    async fn render(&self) -> Result<Frame, SessionError>;
}
