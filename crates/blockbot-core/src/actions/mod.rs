//! Action handlers.
//!
//! Each handler runs one [`ActionRequest`] variant against the live
//! connection and either produces an [`ActionOutcome`] or fails with an
//! [`ActionError`]. Handlers know nothing about timeouts, busy gating,
//! snapshots or knowledge; the dispatcher wraps them with all of that.

mod build;
mod chat;
mod combat;
mod craft;
mod gather;
mod inventory;
mod movement;

use blockbot_types::{ActionRequest, BlockPos, CapabilityKind, MessageId, Vec3};
use tokio_util::sync::CancellationToken;

use crate::chat::ChatLog;
use crate::config::DispatchConfig;
use crate::connection::AvatarConnection;
use crate::session::{AvatarStatus, CapabilityError, Goal, MovementOptions, SessionError};

/// Why a handler could not complete its action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The request parameters are unusable.
    #[error("invalid parameters: {message}")]
    InvalidParameters {
        /// What was wrong.
        message: String,
    },

    /// The block name is not in the world's catalog.
    #[error("unknown block type: {name}")]
    UnknownBlock {
        /// The name given.
        name: String,
    },

    /// The item name is not in the world's catalog.
    #[error("unknown item: {name}")]
    UnknownItem {
        /// The name given.
        name: String,
    },

    /// The avatar does not hold the item.
    #[error("no {item} in inventory")]
    MissingItem {
        /// The item.
        item: String,
    },

    /// The movement planner could not reach the goal.
    #[error("no path: {message}")]
    NoPath {
        /// Planner detail.
        message: String,
    },

    /// No entity matched the name within the search radius.
    #[error("no entity named {name} nearby")]
    NoEntity {
        /// The name given.
        name: String,
    },

    /// The target entity disappeared while the avatar approached it.
    #[error("lost track of {name}")]
    TargetLost {
        /// The entity's name.
        name: String,
    },

    /// The target cell is empty or not loaded.
    #[error("no block at {pos}")]
    NoBlock {
        /// The cell.
        pos: BlockPos,
    },

    /// The cell under a placement target is empty or not loaded.
    #[error("nothing to place against below {pos}")]
    NoSupport {
        /// The placement target.
        pos: BlockPos,
    },

    /// The item has no recipe.
    #[error("no recipe for {item}")]
    NoRecipe {
        /// The item.
        item: String,
    },

    /// The recipe needs a crafting station and none is nearby.
    #[error("no crafting table nearby to craft {item}")]
    NoStation {
        /// The item.
        item: String,
    },

    /// A required capability did not load.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// A primitive session call failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Another action holds the dispatch slot.
    #[error("busy: another action is in progress")]
    Busy,

    /// There is no live connection.
    #[error("not connected")]
    NotConnected,

    /// The avatar has not spawned.
    #[error("avatar is not spawned")]
    NotSpawned,
}

/// What a handler achieved.
///
/// `success` can be `false` without an error when an action ran but fell
/// short, such as a `collect` that found fewer blocks than requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether the goal was achieved.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Blocks harvested, for `collect`.
    pub collected: Option<u32>,
    /// Chat history ID, for `chat`.
    pub message_id: Option<MessageId>,
}

impl ActionOutcome {
    /// A successful outcome with a message.
    pub fn done(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            collected: None,
            message_id: None,
        }
    }
}

/// Everything a handler may use.
#[derive(Debug)]
pub struct ActionContext<'a> {
    /// The live connection.
    pub connection: &'a AvatarConnection,
    /// Dispatch tuning in effect for this action.
    pub config: &'a DispatchConfig,
    /// Outbound chat length limit.
    pub chat_length_limit: usize,
    /// Chat history for outbound messages.
    pub chat: &'a ChatLog,
    /// Cancelled when the dispatcher gives up on the action.
    pub cancel: &'a CancellationToken,
}

impl ActionContext<'_> {
    /// Movement permissions derived from the dispatch config.
    pub const fn movement_options(&self) -> MovementOptions {
        MovementOptions {
            allow_dig: self.config.allow_dig,
            allow_towers: self.config.allow_towers,
            allow_free_motion: self.config.allow_free_motion,
        }
    }

    /// The avatar's current state.
    pub fn status(&self) -> Result<AvatarStatus, ActionError> {
        self.connection
            .session()
            .status()
            .ok_or(ActionError::NotSpawned)
    }

    /// Walk to within `radius` of `target`.
    pub async fn approach(&self, target: Vec3, radius: f64) -> Result<(), ActionError> {
        let planner = self.connection.movement()?;
        planner
            .goto(
                Goal::Near { target, radius },
                self.movement_options(),
                self.cancel,
            )
            .await
            .map_err(|e| match e {
                SessionError::Cancelled | SessionError::Closed | SessionError::NotSpawned => {
                    ActionError::Session(e)
                }
                SessionError::Rejected { message } => ActionError::NoPath { message },
            })
    }

    /// Fail unless `capability` loaded.
    pub fn require(&self, capability: CapabilityKind) -> Result<(), ActionError> {
        if self.connection.has(capability) {
            Ok(())
        } else {
            Err(CapabilityError::Unavailable { capability }.into())
        }
    }
}

/// Run one request to completion.
pub async fn execute(
    ctx: &ActionContext<'_>,
    request: &ActionRequest,
) -> Result<ActionOutcome, ActionError> {
    match request {
        ActionRequest::Move { x, y, z } => movement::move_to(ctx, Vec3::new(*x, *y, *z)).await,
        ActionRequest::Look { x, y, z } => movement::look(ctx, Vec3::new(*x, *y, *z)).await,
        ActionRequest::Collect {
            block_type,
            count,
            radius,
        } => gather::collect(ctx, block_type, *count, *radius).await,
        ActionRequest::Dig { x, y, z } => gather::dig(ctx, Vec3::new(*x, *y, *z).block()).await,
        ActionRequest::Place { item, x, y, z } => {
            build::place(ctx, item, Vec3::new(*x, *y, *z).block()).await
        }
        ActionRequest::Craft { item, count } => craft::craft(ctx, item, *count).await,
        ActionRequest::Attack { entity_name } => combat::attack(ctx, entity_name).await,
        ActionRequest::Chat { message } => chat::say(ctx, message).await,
        ActionRequest::Equip { item } => inventory::equip(ctx, item).await,
        ActionRequest::Drop { item, count } => inventory::drop_items(ctx, item, *count).await,
    }
}
