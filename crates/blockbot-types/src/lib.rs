//! Shared type definitions for the blockbot avatar control engine.
//!
//! This crate is the single source of truth for everything that crosses a
//! crate or process boundary: action requests and results, the situation
//! snapshot, chat records and knowledge records. Types flow downstream to
//! `TypeScript` via `ts-rs` for agent clients.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (chat messages, sessions)
//! - [`enums`] -- Action kinds, connection states, capabilities, categories
//! - [`geometry`] -- Continuous positions and block cells
//! - [`actions`] -- Action request parsing and normalized results
//! - [`snapshot`] -- The cached avatar situation view
//! - [`chat`] -- Chat history records
//! - [`knowledge`] -- Durable knowledge store contents

pub mod actions;
pub mod chat;
pub mod enums;
pub mod geometry;
pub mod ids;
pub mod knowledge;
pub mod snapshot;

// Re-export all public types at crate root for convenience.
pub use actions::{ActionParseError, ActionRequest, ActionResult};
pub use chat::ChatRecord;
pub use enums::{
    ActionKind, CapabilityKind, ChatOrigin, ConnectionState, EntityKind, KnowledgeCategory,
};
pub use geometry::{BlockPos, Vec3};
pub use ids::{MessageId, SessionId};
pub use knowledge::{BehaviorEntry, ExplorationRecord, KnowledgeData, ResourceSighting};
pub use snapshot::{
    Durability, InventoryItem, NearbyBlock, NearbyEntity, StateSnapshot, TrimmedSnapshot,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for agent clients.

    #[test]
    fn export_bindings() {
        // ts-rs generates TypeScript bindings when types with
        // #[ts(export)] are exported. The files are written to the
        // `bindings/` directory relative to the crate root.
        use ts_rs::TS;

        // IDs
        let _ = crate::ids::MessageId::export_all();
        let _ = crate::ids::SessionId::export_all();

        // Enums
        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::ConnectionState::export_all();
        let _ = crate::enums::CapabilityKind::export_all();
        let _ = crate::enums::EntityKind::export_all();
        let _ = crate::enums::ChatOrigin::export_all();
        let _ = crate::enums::KnowledgeCategory::export_all();

        // Geometry
        let _ = crate::geometry::Vec3::export_all();
        let _ = crate::geometry::BlockPos::export_all();

        // Actions
        let _ = crate::actions::ActionRequest::export_all();
        let _ = crate::actions::ActionResult::export_all();

        // Snapshot
        let _ = crate::snapshot::Durability::export_all();
        let _ = crate::snapshot::InventoryItem::export_all();
        let _ = crate::snapshot::NearbyEntity::export_all();
        let _ = crate::snapshot::NearbyBlock::export_all();
        let _ = crate::snapshot::StateSnapshot::export_all();
        let _ = crate::snapshot::TrimmedSnapshot::export_all();

        // Chat
        let _ = crate::chat::ChatRecord::export_all();

        // Knowledge
        let _ = crate::knowledge::BehaviorEntry::export_all();
        let _ = crate::knowledge::ResourceSighting::export_all();
        let _ = crate::knowledge::ExplorationRecord::export_all();
        let _ = crate::knowledge::KnowledgeData::export_all();
    }
}
