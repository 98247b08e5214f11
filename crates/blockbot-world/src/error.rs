//! Error types for the `blockbot-world` crate.
//!
//! World operations return [`WorldError`]; the session layer converts it
//! into a [`SessionError`] the engine understands.

use blockbot_core::session::SessionError;
use blockbot_types::BlockPos;

/// Errors that can occur during world operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// The avatar has not spawned.
    #[error("avatar is not spawned")]
    NotSpawned,

    /// The cell lies outside the loaded area.
    #[error("block at {0} is not loaded")]
    NotLoaded(BlockPos),

    /// The cell holds nothing to break.
    #[error("no block at {0}")]
    EmptyCell(BlockPos),

    /// The cell is already occupied.
    #[error("block at {0} is occupied")]
    Occupied(BlockPos),

    /// The block cannot be broken.
    #[error("{name} at {pos} cannot be broken")]
    Unbreakable {
        /// Block name.
        name: String,
        /// Cell.
        pos: BlockPos,
    },

    /// The cell is too far from the avatar.
    #[error("{0} is out of reach")]
    OutOfReach(BlockPos),

    /// The avatar does not hold enough of an item.
    #[error("not enough {item}: need {needed}, have {held}")]
    NotEnough {
        /// Item name.
        item: String,
        /// Units required.
        needed: u32,
        /// Units held.
        held: u32,
    },

    /// Nothing is held in the main hand.
    #[error("nothing held")]
    NothingHeld,

    /// The item is not a block.
    #[error("{0} cannot be placed")]
    NotPlaceable(String),

    /// The recipe needs a crafting table in reach.
    #[error("{0} requires a crafting table in reach")]
    StationRequired(String),

    /// No entity has the given ID.
    #[error("no entity with id {0}")]
    UnknownEntity(u32),

    /// The target point lies outside the loaded area.
    #[error("no path to {0}")]
    Unreachable(String),

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in world calculation")]
    ArithmeticOverflow,
}

impl From<WorldError> for SessionError {
    fn from(error: WorldError) -> Self {
        match error {
            WorldError::NotSpawned => Self::NotSpawned,
            other => Self::rejected(other.to_string()),
        }
    }
}
