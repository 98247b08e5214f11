//! Situation fingerprints used to key behavior records.
//!
//! A [`Situation`] is a coarse, canonical summary of where the avatar is and
//! what it has. [`fingerprint`] is a pure function of it: equal situations
//! always produce equal keys, across processes and restarts.

use blockbot_types::{BlockPos, EntityKind};
use serde::Serialize;

use crate::session::AvatarSession;

/// One inventory slot as it contributes to a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SituationItem {
    /// Item name.
    pub name: String,
    /// Stack size.
    pub count: u32,
    /// Slot index.
    pub slot: u32,
}

/// One nearby entity as it contributes to a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct SituationEntity {
    /// Entity classification.
    #[serde(rename = "type")]
    pub kind: EntityKindKey,
    /// Distance in tenths of a block.
    pub distance_tenths: u32,
}

/// Sortable stand-in for [`EntityKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKindKey {
    /// See [`EntityKind::Player`].
    Player,
    /// See [`EntityKind::Mob`].
    Mob,
    /// See [`EntityKind::Object`].
    Object,
    /// See [`EntityKind::Orb`].
    Orb,
    /// See [`EntityKind::Other`].
    Other,
}

impl From<EntityKind> for EntityKindKey {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Player => Self::Player,
            EntityKind::Mob => Self::Mob,
            EntityKind::Object => Self::Object,
            EntityKind::Orb => Self::Orb,
            EntityKind::Other => Self::Other,
        }
    }
}

/// Canonical summary of the avatar's situation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Situation {
    /// The avatar's cell.
    pub position: Option<BlockPos>,
    /// Inventory sorted by slot.
    pub inventory: Vec<SituationItem>,
    /// Nearby entities sorted by kind, then distance.
    pub entities: Vec<SituationEntity>,
}

impl Situation {
    /// Observe the live situation, counting entities within `entity_radius`.
    pub fn observe(session: &dyn AvatarSession, entity_radius: f64) -> Self {
        let Some(status) = session.status() else {
            return Self::default();
        };
        let mut inventory: Vec<SituationItem> = status
            .inventory
            .iter()
            .map(|item| SituationItem {
                name: item.name.clone(),
                count: item.count,
                slot: item.slot,
            })
            .collect();
        inventory.sort();

        let own = session.username();
        let mut entities: Vec<SituationEntity> = session
            .entities()
            .iter()
            .filter(|e| e.username.as_deref() != Some(own))
            .filter_map(|e| {
                let distance = e.position.distance_to(&status.position);
                (distance <= entity_radius).then(|| SituationEntity {
                    kind: e.kind.into(),
                    distance_tenths: tenths(distance),
                })
            })
            .collect();
        entities.sort();

        Self {
            position: Some(status.position.block()),
            inventory,
            entities,
        }
    }
}

/// Deterministic key for a situation.
pub fn fingerprint(situation: &Situation) -> String {
    // Field order is fixed by the struct definitions, so the JSON text is
    // canonical.
    serde_json::to_string(situation).unwrap_or_default()
}

/// Round a non-negative distance to whole tenths.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn tenths(distance: f64) -> u32 {
    let scaled = (distance * 10.0).round();
    if scaled.is_nan() || scaled <= 0.0 {
        0
    } else {
        scaled.min(f64::from(u32::MAX)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn situation() -> Situation {
        Situation {
            position: Some(BlockPos::new(1, 64, -2)),
            inventory: vec![SituationItem {
                name: "oak_log".to_owned(),
                count: 3,
                slot: 0,
            }],
            entities: vec![SituationEntity {
                kind: EntityKindKey::Mob,
                distance_tenths: 42,
            }],
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        assert_eq!(fingerprint(&situation()), fingerprint(&situation()));
    }

    #[test]
    fn fingerprint_distinguishes_inventory() {
        let mut other = situation();
        if let Some(item) = other.inventory.first_mut() {
            item.count = 4;
        }
        assert_ne!(fingerprint(&situation()), fingerprint(&other));
    }

    #[test]
    fn fingerprint_of_empty_situation() {
        assert_eq!(
            fingerprint(&Situation::default()),
            r#"{"position":null,"inventory":[],"entities":[]}"#
        );
    }

    #[test]
    fn distances_round_to_tenths() {
        assert_eq!(tenths(4.249), 42);
        assert_eq!(tenths(4.25), 43);
        assert_eq!(tenths(-1.0), 0);
        assert_eq!(tenths(f64::NAN), 0);
    }
}
