//! Enumeration types shared across the workspace.
//!
//! Every enum serializes as a lowercase `snake_case` string so agent
//! clients can match on the same tags they send.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// The kind of a high-level avatar action.
///
/// Mirrors the variants of [`ActionRequest`](crate::ActionRequest) without
/// their parameters. Used in results, logs and behavior records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Walk to a point.
    Move,
    /// Find and harvest blocks of a given type.
    Collect,
    /// Place an inventory item as a block.
    Place,
    /// Break the block at a cell.
    Dig,
    /// Craft an item from inventory, optionally at a station.
    Craft,
    /// Approach and hit an entity.
    Attack,
    /// Turn to face a point.
    Look,
    /// Send a chat message.
    Chat,
    /// Hold an inventory item in the main hand.
    Equip,
    /// Throw items out of the inventory.
    Drop,
}

impl ActionKind {
    /// Every action kind, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Move,
        Self::Collect,
        Self::Place,
        Self::Dig,
        Self::Craft,
        Self::Attack,
        Self::Look,
        Self::Chat,
        Self::Equip,
        Self::Drop,
    ];

    /// The wire tag used in the `type` field of a request.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Collect => "collect",
            Self::Place => "place",
            Self::Dig => "dig",
            Self::Craft => "craft",
            Self::Attack => "attack",
            Self::Look => "look",
            Self::Chat => "chat",
            Self::Equip => "equip",
            Self::Drop => "drop",
        }
    }

    /// Resolve a wire tag to an action kind.
    ///
    /// Returns `None` for unrecognized tags.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Whether the action moves the avatar toward a target before acting.
    pub const fn travels(self) -> bool {
        matches!(
            self,
            Self::Move | Self::Collect | Self::Place | Self::Dig | Self::Craft | Self::Attack
        )
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// Lifecycle state of the avatar connection.
///
/// Transitions: `Disconnected -> Connecting -> Connected -> {Error, Kicked,
/// Disconnected}`, and back to `Connecting` when a reconnect is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session exists.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A session is live and its capabilities have been loaded.
    Connected,
    /// The session failed with an error.
    Error,
    /// The server removed the avatar from the session.
    Kicked,
}

/// An independently loaded capability the action handlers depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// Path planning and goal-driven movement.
    Movement,
    /// Walk-to-and-harvest helper for blocks.
    Collection,
    /// Best-tool selection for breaking a block.
    ToolSelection,
    /// First-person frame rendering.
    Rendering,
}

impl CapabilityKind {
    /// Load order applied when a connection is established.
    pub const LOAD_ORDER: [Self; 4] = [
        Self::Movement,
        Self::Collection,
        Self::ToolSelection,
        Self::Rendering,
    ];

    /// Human-readable name used in error messages.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Movement => "movement",
            Self::Collection => "collection",
            Self::ToolSelection => "tool_selection",
            Self::Rendering => "rendering",
        }
    }
}

impl core::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Broad classification of a world entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Another connected player.
    Player,
    /// A living creature (animal or monster).
    Mob,
    /// A non-physical object (dropped item, arrow, painting).
    Object,
    /// An experience orb.
    Orb,
    /// Anything else.
    Other,
}

impl EntityKind {
    /// Whether the entity is a physical being worth reporting nearby.
    pub const fn is_physical(self) -> bool {
        !matches!(self, Self::Object)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Who produced a chat record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum ChatOrigin {
    /// Sent by this avatar.
    Bot,
    /// Sent by another player.
    Player,
    /// Server or system notice.
    System,
}

// ---------------------------------------------------------------------------
// Knowledge
// ---------------------------------------------------------------------------

/// Category of a knowledge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeCategory {
    /// Item name to recipe (overwrite).
    Crafting,
    /// Pattern name to block layout (overwrite).
    Building,
    /// Area key to area descriptor (overwrite).
    Exploration,
    /// Block type to sighting list (append).
    Resources,
    /// Situation fingerprint to outcome list (append).
    Behaviors,
}

impl KnowledgeCategory {
    /// Whether records in this category accumulate instead of overwriting.
    pub const fn is_append_only(self) -> bool {
        matches!(self, Self::Resources | Self::Behaviors)
    }
}
