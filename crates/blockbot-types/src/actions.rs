//! Action request and result types exchanged with the controlling agent.
//!
//! An [`ActionRequest`] is a tagged JSON object: the `type` field (or its
//! alias `action`) selects the variant and the remaining fields carry its
//! parameters. Parameter names are `snake_case`; the camelCase spellings
//! older clients send (`blockType`, `entityName`) are accepted as aliases.
//!
//! Tag resolution happens in [`ActionRequest::from_value`] before any
//! parameter parsing, so an unrecognized tag is always reported as
//! [`ActionParseError::UnknownType`] rather than a generic serde error.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ActionKind;
use crate::geometry::{BlockPos, Vec3};
use crate::ids::MessageId;

/// Default unit count for `collect`, `craft` and `drop`.
const fn default_count() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// ActionRequest
// ---------------------------------------------------------------------------

/// One discrete, parameterized command for the avatar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    /// Walk to within one block of the target point.
    Move {
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
        /// Target z.
        z: f64,
    },
    /// Harvest `count` blocks of `block_type` found near the avatar.
    Collect {
        /// Catalog name of the block to harvest (e.g. `oak_log`).
        #[serde(alias = "blockType")]
        block_type: String,
        /// Number of blocks to harvest.
        #[serde(default = "default_count")]
        count: u32,
        /// Search radius override in blocks.
        #[serde(default)]
        radius: Option<f64>,
    },
    /// Place `item` into the cell at the target coordinates.
    Place {
        /// Catalog name of the item to place.
        item: String,
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
        /// Target z.
        z: f64,
    },
    /// Break the block at the target coordinates.
    Dig {
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
        /// Target z.
        z: f64,
    },
    /// Craft `count` of `item`.
    Craft {
        /// Catalog name of the item to craft.
        item: String,
        /// Number of craft operations.
        #[serde(default = "default_count")]
        count: u32,
    },
    /// Approach and hit the named entity.
    Attack {
        /// Entity name, username or display name.
        #[serde(alias = "entityName")]
        entity_name: String,
    },
    /// Turn to face the target point.
    Look {
        /// Target x.
        x: f64,
        /// Target y.
        y: f64,
        /// Target z.
        z: f64,
    },
    /// Send a chat message.
    Chat {
        /// Message text.
        message: String,
    },
    /// Hold an inventory item in the main hand.
    Equip {
        /// Catalog name of the item.
        item: String,
    },
    /// Throw items out of the inventory.
    Drop {
        /// Catalog name of the item.
        item: String,
        /// How many to drop (capped at the amount held).
        #[serde(default = "default_count")]
        count: u32,
    },
}

/// Reasons a raw request could not become an [`ActionRequest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionParseError {
    /// The request body was not a JSON object.
    #[error("action request must be a JSON object")]
    NotAnObject,

    /// Neither `type` nor `action` was present as a string.
    #[error("action request is missing a `type` field")]
    MissingType,

    /// The tag does not name a known action.
    #[error("unknown action type: {0}")]
    UnknownType(String),

    /// The tag was known but its parameters did not parse.
    #[error("invalid parameters for {kind}: {reason}")]
    InvalidParameters {
        /// The action whose parameters were rejected.
        kind: ActionKind,
        /// Parser diagnostic.
        reason: String,
    },
}

impl ActionRequest {
    /// Parse a raw JSON request, resolving the tag before the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ActionParseError::UnknownType`] for unrecognized tags and
    /// [`ActionParseError::InvalidParameters`] when a known action's fields
    /// are missing or mistyped.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ActionParseError> {
        let serde_json::Value::Object(mut fields) = value else {
            return Err(ActionParseError::NotAnObject);
        };

        let tag = fields
            .get("type")
            .or_else(|| fields.get("action"))
            .and_then(serde_json::Value::as_str)
            .map(str::to_owned)
            .ok_or(ActionParseError::MissingType)?;

        let kind =
            ActionKind::from_tag(&tag).ok_or_else(|| ActionParseError::UnknownType(tag.clone()))?;

        fields.remove("action");
        fields.insert("type".to_owned(), serde_json::Value::String(tag));

        serde_json::from_value(serde_json::Value::Object(fields)).map_err(|e| {
            ActionParseError::InvalidParameters {
                kind,
                reason: e.to_string(),
            }
        })
    }

    /// The kind of this request.
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Move { .. } => ActionKind::Move,
            Self::Collect { .. } => ActionKind::Collect,
            Self::Place { .. } => ActionKind::Place,
            Self::Dig { .. } => ActionKind::Dig,
            Self::Craft { .. } => ActionKind::Craft,
            Self::Attack { .. } => ActionKind::Attack,
            Self::Look { .. } => ActionKind::Look,
            Self::Chat { .. } => ActionKind::Chat,
            Self::Equip { .. } => ActionKind::Equip,
            Self::Drop { .. } => ActionKind::Drop,
        }
    }

    /// The point the action travels to, when it has fixed coordinates.
    pub const fn target_point(&self) -> Option<Vec3> {
        match self {
            Self::Move { x, y, z }
            | Self::Place { x, y, z, .. }
            | Self::Dig { x, y, z }
            | Self::Look { x, y, z } => Some(Vec3::new(*x, *y, *z)),
            _ => None,
        }
    }

    /// The block cell the action targets, when it has fixed coordinates.
    pub fn target_block(&self) -> Option<BlockPos> {
        self.target_point().map(|p| p.block())
    }
}

// ---------------------------------------------------------------------------
// ActionResult
// ---------------------------------------------------------------------------

/// The normalized outcome of one dispatched action.
///
/// Exactly one result is produced per request. Every field is set on both
/// success and failure paths; the optional tails only appear for the
/// actions that produce them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActionResult {
    /// The action that ran, or `None` when the request never parsed.
    pub action: Option<ActionKind>,
    /// Whether the action achieved its goal.
    pub success: bool,
    /// Human-readable outcome or error detail.
    pub message: String,
    /// Avatar position after the action (last known position on failure).
    pub position: Option<Vec3>,
    /// Whether the action lost the race against its timeout.
    pub timed_out: bool,
    /// Wall-clock time spent executing, in milliseconds.
    pub elapsed_ms: u64,
    /// Blocks harvested by a `collect` action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected: Option<u32>,
    /// Chat history ID assigned to a `chat` action's message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

impl ActionResult {
    /// A failed result for a request that was refused before execution.
    pub fn rejected(action: Option<ActionKind>, message: impl Into<String>) -> Self {
        Self {
            action,
            success: false,
            message: message.into(),
            position: None,
            timed_out: false,
            elapsed_ms: 0,
            collected: None,
            message_id: None,
        }
    }

    /// A compact `{success, message}` view stored as a behavior outcome.
    pub fn outcome_value(&self) -> serde_json::Value {
        serde_json::json!({
            "success": self.success,
            "message": self.message,
            "timed_out": self.timed_out,
        })
    }
}
