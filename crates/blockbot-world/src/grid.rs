//! The voxel grid, its entities and the avatar.
//!
//! Terrain is procedural: flat layers of bedrock, stone, dirt and grass
//! within a square of half-width `extent` around the origin. Generated
//! features (trees, ores, the crafting table) and every later edit live in
//! an override map on top of the layers. Cells outside the square, or above
//! or below the build limits, are not loaded.
//!
//! Mutating operations return the [`SessionEvent`]s they cause; the session
//! layer forwards them to the engine.

use std::collections::BTreeMap;

use blockbot_core::config::WorldConfig;
use blockbot_core::session::{
    AvatarStatus, EntityObservation, Recipe, SessionEvent, is_empty_block,
};
use blockbot_types::{BlockPos, Durability, EntityKind, InventoryItem, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::catalog;
use crate::error::WorldError;

/// Highest loaded cell.
pub const WORLD_HEIGHT: i32 = 127;

/// Y of the grass layer.
pub const SURFACE_Y: i32 = 63;

/// Where the avatar appears.
pub const SPAWN: Vec3 = Vec3::new(0.5, 64.0, 0.5);

/// Cell of the crafting table generated near spawn.
pub const STATION_POS: BlockPos = BlockPos::new(3, 64, -3);

/// How far from a block's center the avatar can touch it.
pub const REACH: f64 = 5.0;

/// Number of inventory slots.
pub const INVENTORY_SLOTS: u32 = 36;

/// Health and food of a fresh avatar.
const FULL_HEALTH: f32 = 20.0;
const FULL_FOOD: u32 = 20;

/// `(name, height, health)` of generated mobs, in spawn rotation.
const MOBS: [(&str, f64, f32); 4] = [
    ("cow", 1.4, 10.0),
    ("pig", 0.9, 10.0),
    ("sheep", 1.3, 8.0),
    ("zombie", 1.95, 20.0),
];

/// Damage dealt by one bare-handed hit, and with a sword.
const HIT_DAMAGE: f32 = 4.0;
const SWORD_DAMAGE: f32 = 7.0;

/// Vertical range of a terrain layer.
fn terrain_layer(name: &str) -> Option<(i32, i32)> {
    match name {
        "bedrock" => Some((0, 0)),
        "stone" => Some((1, SURFACE_Y.saturating_sub(5))),
        "dirt" => Some((SURFACE_Y.saturating_sub(4), SURFACE_Y.saturating_sub(1))),
        "grass_block" => Some((SURFACE_Y, SURFACE_Y)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stack {
    name: String,
    count: u32,
    durability: Option<Durability>,
}

/// The avatar's inventory, keyed by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    slots: BTreeMap<u32, Stack>,
}

impl Inventory {
    /// Total units of `item` across all slots.
    pub fn count_of(&self, item: &str) -> u32 {
        self.slots
            .values()
            .filter(|s| s.name == item)
            .fold(0_u32, |acc, s| acc.saturating_add(s.count))
    }

    /// Add up to `count` units, filling existing stacks first. Returns the
    /// number of units that fit.
    pub fn add(&mut self, item: &str, count: u32) -> u32 {
        let max = catalog::max_stack(item);
        let mut remaining = count;

        for stack in self.slots.values_mut().filter(|s| s.name == item) {
            let room = max.saturating_sub(stack.count);
            let moved = room.min(remaining);
            stack.count = stack.count.saturating_add(moved);
            remaining = remaining.saturating_sub(moved);
        }

        let mut slot = 0_u32;
        while remaining > 0 && slot < INVENTORY_SLOTS {
            if !self.slots.contains_key(&slot) {
                let moved = max.min(remaining);
                let durability = catalog::tool_spec(item).map(|t| Durability {
                    current: t.durability,
                    max: t.durability,
                });
                self.slots.insert(
                    slot,
                    Stack {
                        name: item.to_owned(),
                        count: moved,
                        durability,
                    },
                );
                remaining = remaining.saturating_sub(moved);
            }
            slot = slot.saturating_add(1);
        }
        count.saturating_sub(remaining)
    }

    /// Remove exactly `count` units of `item`, emptiest stacks last.
    pub fn remove(&mut self, item: &str, count: u32) -> Result<(), WorldError> {
        let held = self.count_of(item);
        if held < count {
            return Err(WorldError::NotEnough {
                item: item.to_owned(),
                needed: count,
                held,
            });
        }
        let mut remaining = count;
        let slots: Vec<u32> = self
            .slots
            .iter()
            .filter(|(_, s)| s.name == item)
            .map(|(slot, _)| *slot)
            .rev()
            .collect();
        for slot in slots {
            if remaining == 0 {
                break;
            }
            if let Some(stack) = self.slots.get_mut(&slot) {
                let taken = stack.count.min(remaining);
                stack.count = stack.count.saturating_sub(taken);
                remaining = remaining.saturating_sub(taken);
                if stack.count == 0 {
                    self.slots.remove(&slot);
                }
            }
        }
        Ok(())
    }

    /// Use up one point of durability on the first stack of `item`,
    /// breaking it at zero. Returns `true` if the item broke.
    pub fn wear(&mut self, item: &str) -> bool {
        let Some((slot, stack)) = self.slots.iter_mut().find(|(_, s)| s.name == item) else {
            return false;
        };
        let Some(durability) = stack.durability.as_mut() else {
            return false;
        };
        durability.current = durability.current.saturating_sub(1);
        if durability.current == 0 {
            let slot = *slot;
            self.slots.remove(&slot);
            return true;
        }
        false
    }

    /// Occupied slots in slot order.
    pub fn items(&self) -> Vec<InventoryItem> {
        self.slots
            .iter()
            .map(|(slot, s)| InventoryItem {
                name: s.name.clone(),
                count: s.count,
                slot: *slot,
                durability: s.durability,
            })
            .collect()
    }

    /// Item names held, deduplicated.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = self.slots.values().map(|s| s.name.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Avatar and entities
// ---------------------------------------------------------------------------

/// The avatar's mutable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Avatar {
    /// Feet position.
    pub position: Vec3,
    /// Health points.
    pub health: f32,
    /// Food points.
    pub food: u32,
    /// Inventory.
    pub inventory: Inventory,
    /// Item in the main hand.
    pub held: Option<String>,
    /// Point the avatar is facing.
    pub facing: Vec3,
}

impl Avatar {
    fn fresh() -> Self {
        Self {
            position: SPAWN,
            health: FULL_HEALTH,
            food: FULL_FOOD,
            inventory: Inventory::default(),
            held: None,
            facing: SPAWN.offset(0.0, 0.0, 1.0),
        }
    }

    /// The eye position used for reach checks.
    pub fn eyes(&self) -> Vec3 {
        self.position.offset(0.0, 1.6, 0.0)
    }
}

/// A non-avatar entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SimEntity {
    /// Session-local ID.
    pub id: u32,
    /// Type name.
    pub name: String,
    /// Username, for players.
    pub username: Option<String>,
    /// Classification.
    pub kind: EntityKind,
    /// Feet position.
    pub position: Vec3,
    /// Bounding box height.
    pub height: f64,
    /// Remaining health.
    pub health: f32,
}

impl SimEntity {
    fn observe(&self) -> EntityObservation {
        EntityObservation {
            id: self.id,
            name: Some(self.name.clone()),
            username: self.username.clone(),
            display_name: None,
            kind: self.kind,
            position: self.position,
            height: self.height,
        }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The complete world state.
#[derive(Debug, Clone)]
pub struct World {
    extent: i32,
    overrides: BTreeMap<BlockPos, String>,
    entities: BTreeMap<u32, SimEntity>,
    next_entity_id: u32,
    avatar: Option<Avatar>,
    view_distance: u8,
}

impl World {
    /// An empty flat world with no features.
    pub fn flat(extent: i32) -> Self {
        Self {
            extent: extent.max(1),
            overrides: BTreeMap::new(),
            entities: BTreeMap::new(),
            next_entity_id: 1,
            avatar: None,
            view_distance: 8,
        }
    }

    /// Generate a world from `config`.
    ///
    /// Places a crafting table next to spawn, then seeds trees, ore veins
    /// and mobs around it. The same seed always yields the same world.
    pub fn generate(config: &WorldConfig) -> Self {
        let mut world = Self::flat(config.extent);
        let mut rng = StdRng::seed_from_u64(config.seed);
        world
            .overrides
            .insert(STATION_POS, "crafting_table".to_owned());

        let feature_range = world.extent.saturating_sub(3).clamp(5, 20);
        for _ in 0..config.trees {
            let (x, z) = scatter(&mut rng, feature_range);
            world.plant_tree(x, z);
        }
        for (ore, low, high) in [("coal_ore", 52, 58), ("iron_ore", 44, 52)] {
            for _ in 0..6 {
                let (x, z) = scatter(&mut rng, feature_range);
                let y = rng.random_range(low..=high);
                world.overrides.insert(BlockPos::new(x, y, z), ore.to_owned());
            }
        }
        let mobs = MOBS.iter().cycle().take(usize::try_from(config.mobs).unwrap_or(0));
        for &(name, height, health) in mobs {
            let (x, z) = scatter(&mut rng, feature_range.min(14));
            let position = Vec3::new(f64::from(x) + 0.5, 64.0, f64::from(z) + 0.5);
            world.spawn_entity(name, None, EntityKind::Mob, position, height, health);
        }
        debug!(
            seed = config.seed,
            features = world.overrides.len(),
            entities = world.entities.len(),
            "world generated"
        );
        world
    }

    fn plant_tree(&mut self, x: i32, z: i32) {
        let base = BlockPos::new(x, SURFACE_Y.saturating_add(1), z);
        for dy in 0..4 {
            self.overrides.insert(base.offset(0, dy, 0), "oak_log".to_owned());
        }
        for (dx, dy, dz) in [(1, 3, 0), (-1, 3, 0), (0, 3, 1), (0, 3, -1), (0, 4, 0)] {
            self.overrides
                .entry(base.offset(dx, dy, dz))
                .or_insert_with(|| "oak_leaves".to_owned());
        }
    }

    /// Whether `pos` is inside the loaded area.
    pub fn is_loaded(&self, pos: BlockPos) -> bool {
        pos.x.abs() <= self.extent
            && pos.z.abs() <= self.extent
            && (0..=WORLD_HEIGHT).contains(&pos.y)
    }

    /// Whether `point` is inside the loaded area.
    pub fn contains(&self, point: Vec3) -> bool {
        self.is_loaded(point.block())
    }

    fn base_block(pos: BlockPos) -> &'static str {
        ["bedrock", "stone", "dirt", "grass_block"]
            .into_iter()
            .find(|name| {
                terrain_layer(name).is_some_and(|(low, high)| (low..=high).contains(&pos.y))
            })
            .unwrap_or("air")
    }

    /// The block at `pos`, or `None` when the cell is not loaded.
    pub fn block_at(&self, pos: BlockPos) -> Option<&str> {
        if !self.is_loaded(pos) {
            return None;
        }
        Some(
            self.overrides
                .get(&pos)
                .map_or_else(|| Self::base_block(pos), String::as_str),
        )
    }

    /// Replace the block at `pos`, returning the change event.
    pub fn set_block(&mut self, pos: BlockPos, name: &str) -> Result<SessionEvent, WorldError> {
        let old = self.block_at(pos).ok_or(WorldError::NotLoaded(pos))?.to_owned();
        self.overrides.insert(pos, name.to_owned());
        Ok(SessionEvent::BlockChanged {
            pos,
            old,
            new: name.to_owned(),
        })
    }

    /// Up to `max` cells holding `block` within `radius` of `origin`,
    /// nearest first.
    #[allow(clippy::cast_possible_truncation)]
    pub fn find_blocks(&self, block: &str, origin: Vec3, radius: f64, max: usize) -> Vec<BlockPos> {
        if max == 0 || !radius.is_finite() || radius < 0.0 {
            return Vec::new();
        }
        let within = |pos: &BlockPos| pos.center().distance_to(&origin) <= radius;
        let mut found: Vec<BlockPos> = self
            .overrides
            .iter()
            .filter(|(pos, name)| name.as_str() == block && within(*pos) && self.is_loaded(**pos))
            .map(|(pos, _)| *pos)
            .collect();

        if let Some((low, high)) = terrain_layer(block) {
            let center = origin.block();
            let r = radius.ceil().min(f64::from(self.extent.saturating_mul(2))) as i32;
            let y_low = low.max(center.y.saturating_sub(r));
            let y_high = high.min(center.y.saturating_add(r));
            for x in center.x.saturating_sub(r)..=center.x.saturating_add(r) {
                for z in center.z.saturating_sub(r)..=center.z.saturating_add(r) {
                    for y in y_low..=y_high {
                        let pos = BlockPos::new(x, y, z);
                        if !self.overrides.contains_key(&pos) && self.is_loaded(pos) && within(&pos) {
                            found.push(pos);
                        }
                    }
                }
            }
        }

        found.sort_by(|a, b| {
            a.center()
                .distance_to(&origin)
                .total_cmp(&b.center().distance_to(&origin))
                .then_with(|| a.cmp(b))
        });
        found.truncate(max);
        found
    }

    // -- avatar ------------------------------------------------------------

    /// Spawn the avatar if it is not already in the world. Returns whether
    /// it was spawned now.
    pub fn spawn_avatar(&mut self) -> bool {
        if self.avatar.is_some() {
            return false;
        }
        self.avatar = Some(Avatar::fresh());
        true
    }

    /// The avatar, if spawned.
    pub const fn avatar(&self) -> Option<&Avatar> {
        self.avatar.as_ref()
    }

    fn avatar_mut(&mut self) -> Result<&mut Avatar, WorldError> {
        self.avatar.as_mut().ok_or(WorldError::NotSpawned)
    }

    /// The avatar as the engine sees it.
    pub fn status(&self) -> Option<AvatarStatus> {
        self.avatar.as_ref().map(|a| AvatarStatus {
            position: a.position,
            health: a.health,
            food: a.food,
            inventory: a.inventory.items(),
            held_item: a.held.clone(),
        })
    }

    /// Apply a view distance.
    pub const fn set_view_distance(&mut self, chunks: u8) {
        self.view_distance = chunks;
    }

    /// The applied view distance.
    pub const fn view_distance(&self) -> u8 {
        self.view_distance
    }

    /// Move the avatar up to `max_step` toward `target`, stopping
    /// `radius` short. Returns the new position, or `None` when it is
    /// already within `radius`.
    pub fn step_avatar(
        &mut self,
        target: Vec3,
        radius: f64,
        max_step: f64,
    ) -> Result<Option<SessionEvent>, WorldError> {
        if !self.contains(target) {
            return Err(WorldError::Unreachable(target.to_string()));
        }
        let avatar = self.avatar_mut()?;
        let distance = avatar.position.distance_to(&target);
        let remaining = distance - radius;
        if remaining <= 1e-6 || distance <= f64::EPSILON {
            return Ok(None);
        }
        let step = remaining.min(max_step) / distance;
        let from = avatar.position;
        avatar.position = Vec3::new(
            (target.x - from.x).mul_add(step, from.x),
            (target.y - from.y).mul_add(step, from.y),
            (target.z - from.z).mul_add(step, from.z),
        );
        Ok(Some(SessionEvent::Moved {
            position: avatar.position,
        }))
    }

    /// Turn the avatar toward `point`.
    pub fn look_at(&mut self, point: Vec3) -> Result<(), WorldError> {
        self.avatar_mut()?.facing = point;
        Ok(())
    }

    /// Hold `item` in the main hand.
    pub fn equip(&mut self, item: &str) -> Result<(), WorldError> {
        let avatar = self.avatar_mut()?;
        let held = avatar.inventory.count_of(item);
        if held == 0 {
            return Err(WorldError::NotEnough {
                item: item.to_owned(),
                needed: 1,
                held,
            });
        }
        avatar.held = Some(item.to_owned());
        Ok(())
    }

    /// Put items into the avatar's inventory as if picked up.
    pub fn give(&mut self, item: &str, count: u32) -> Result<Vec<SessionEvent>, WorldError> {
        let added = self.avatar_mut()?.inventory.add(item, count);
        if added == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![SessionEvent::ItemCollected {
            item: item.to_owned(),
            count: added,
        }])
    }

    fn check_reach(&self, pos: BlockPos) -> Result<(), WorldError> {
        let avatar = self.avatar.as_ref().ok_or(WorldError::NotSpawned)?;
        if avatar.eyes().distance_to(&pos.center()) > REACH {
            return Err(WorldError::OutOfReach(pos));
        }
        Ok(())
    }

    /// Break the block at `pos` with the held item, collecting its drop.
    pub fn dig(&mut self, pos: BlockPos) -> Result<Vec<SessionEvent>, WorldError> {
        let name = self.block_at(pos).ok_or(WorldError::NotLoaded(pos))?.to_owned();
        if is_empty_block(&name) {
            return Err(WorldError::EmptyCell(pos));
        }
        let spec = catalog::block_spec(&name);
        if !spec.is_some_and(|s| s.breakable) {
            return Err(WorldError::Unbreakable { name, pos });
        }
        self.check_reach(pos)?;

        let mut events = vec![self.set_block(pos, "air")?];
        let avatar = self.avatar_mut()?;
        let broke = avatar
            .held
            .clone()
            .is_some_and(|tool| catalog::tool_spec(&tool).is_some() && avatar.inventory.wear(&tool));
        if broke {
            avatar.held = None;
        }
        if let Some(drop) = spec.and_then(|s| s.drop) {
            events.extend(self.give(drop, 1)?);
        }
        Ok(events)
    }

    /// Place the held item on top of `support`.
    pub fn place_on(&mut self, support: BlockPos) -> Result<Vec<SessionEvent>, WorldError> {
        let target = support.offset(0, 1, 0);
        let support_block = self
            .block_at(support)
            .ok_or(WorldError::NotLoaded(support))?;
        if is_empty_block(support_block) {
            return Err(WorldError::EmptyCell(support));
        }
        let target_block = self.block_at(target).ok_or(WorldError::NotLoaded(target))?;
        if !is_empty_block(target_block) {
            return Err(WorldError::Occupied(target));
        }
        self.check_reach(target)?;

        let avatar = self.avatar_mut()?;
        let item = avatar.held.clone().ok_or(WorldError::NothingHeld)?;
        if !catalog::is_placeable(&item) {
            return Err(WorldError::NotPlaceable(item));
        }
        avatar.inventory.remove(&item, 1)?;
        if avatar.inventory.count_of(&item) == 0 {
            avatar.held = None;
        }
        Ok(vec![self.set_block(target, &item)?])
    }

    /// Run `recipe` `count` times.
    pub fn craft(
        &mut self,
        recipe: &Recipe,
        count: u32,
        station: Option<BlockPos>,
    ) -> Result<Vec<SessionEvent>, WorldError> {
        if recipe.requires_station {
            let station = station.ok_or_else(|| WorldError::StationRequired(recipe.item.clone()))?;
            if self.block_at(station) != Some("crafting_table") || self.check_reach(station).is_err() {
                return Err(WorldError::StationRequired(recipe.item.clone()));
            }
        }

        let avatar = self.avatar_mut()?;
        for (ingredient, units) in &recipe.ingredients {
            let needed = units
                .checked_mul(count)
                .ok_or(WorldError::ArithmeticOverflow)?;
            let held = avatar.inventory.count_of(ingredient);
            if held < needed {
                return Err(WorldError::NotEnough {
                    item: ingredient.clone(),
                    needed,
                    held,
                });
            }
        }
        for (ingredient, units) in &recipe.ingredients {
            avatar
                .inventory
                .remove(ingredient, units.saturating_mul(count))?;
        }
        let produced = recipe
            .count
            .checked_mul(count)
            .ok_or(WorldError::ArithmeticOverflow)?;
        avatar.inventory.add(&recipe.item, produced);
        Ok(vec![SessionEvent::CraftCompleted {
            item: recipe.item.clone(),
            recipe: recipe.clone(),
        }])
    }

    /// Throw `count` of `item` on the ground in front of the avatar.
    pub fn toss(&mut self, item: &str, count: u32) -> Result<Vec<SessionEvent>, WorldError> {
        let avatar = self.avatar_mut()?;
        avatar.inventory.remove(item, count)?;
        if avatar.inventory.count_of(item) == 0 && avatar.held.as_deref() == Some(item) {
            avatar.held = None;
        }
        let position = avatar.position.offset(1.0, 0.0, 0.0);
        let id = self.spawn_entity(item, None, EntityKind::Object, position, 0.25, 1.0);
        Ok(vec![SessionEvent::EntityMoved { id, position }])
    }

    /// Hit the entity with `id`. Entities at zero health are removed.
    pub fn attack(&mut self, id: u32) -> Result<Vec<SessionEvent>, WorldError> {
        let avatar = self.avatar.as_ref().ok_or(WorldError::NotSpawned)?;
        let eyes = avatar.eyes();
        let damage = match avatar.held.as_deref().and_then(catalog::tool_spec) {
            Some(tool) if tool.class == catalog::ToolClass::Sword => SWORD_DAMAGE,
            _ => HIT_DAMAGE,
        };
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        if entity.position.distance_to(&eyes) > REACH {
            return Err(WorldError::OutOfReach(entity.position.block()));
        }
        entity.health -= damage;
        if entity.health <= 0.0 {
            debug!(id, name = %entity.name, "entity killed");
            self.entities.remove(&id);
        }
        Ok(Vec::new())
    }

    /// Hurt the avatar. At zero health it dies and respawns empty-handed.
    pub fn damage_avatar(&mut self, amount: f32) -> Result<Vec<SessionEvent>, WorldError> {
        let avatar = self.avatar_mut()?;
        avatar.health = (avatar.health - amount).max(0.0);
        let mut events = vec![SessionEvent::HealthChanged {
            health: avatar.health,
            food: avatar.food,
        }];
        if avatar.health <= 0.0 {
            *avatar = Avatar::fresh();
            events.push(SessionEvent::Death);
            events.push(SessionEvent::Spawned);
            events.push(SessionEvent::HealthChanged {
                health: avatar.health,
                food: avatar.food,
            });
        }
        Ok(events)
    }

    // -- entities ----------------------------------------------------------

    /// Add an entity, returning its ID.
    pub fn spawn_entity(
        &mut self,
        name: &str,
        username: Option<&str>,
        kind: EntityKind,
        position: Vec3,
        height: f64,
        health: f32,
    ) -> u32 {
        let id = self.next_entity_id;
        self.next_entity_id = self.next_entity_id.saturating_add(1);
        self.entities.insert(
            id,
            SimEntity {
                id,
                name: name.to_owned(),
                username: username.map(str::to_owned),
                kind,
                position,
                height,
                health,
            },
        );
        id
    }

    /// Move an entity, returning the event.
    pub fn move_entity(&mut self, id: u32, position: Vec3) -> Result<SessionEvent, WorldError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        entity.position = position;
        Ok(SessionEvent::EntityMoved { id, position })
    }

    /// Remove an entity. Returns whether it existed.
    pub fn remove_entity(&mut self, id: u32) -> bool {
        self.entities.remove(&id).is_some()
    }

    /// Position of an entity.
    pub fn entity_position(&self, id: u32) -> Option<Vec3> {
        self.entities.get(&id).map(|e| e.position)
    }

    /// All entities as the engine sees them.
    pub fn entities(&self) -> Vec<EntityObservation> {
        self.entities.values().map(SimEntity::observe).collect()
    }
}

/// A random column at least 4 and at most `range` blocks from the origin on
/// each axis' larger component.
fn scatter(rng: &mut StdRng, range: i32) -> (i32, i32) {
    let range = range.max(5);
    loop {
        let x = rng.random_range(-range..=range);
        let z = rng.random_range(-range..=range);
        if x.abs().max(z.abs()) >= 4 {
            return (x, z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawned() -> World {
        let mut world = World::flat(32);
        world.spawn_avatar();
        world
    }

    #[test]
    fn terrain_layers() {
        let world = World::flat(16);
        assert_eq!(world.block_at(BlockPos::new(0, 0, 0)), Some("bedrock"));
        assert_eq!(world.block_at(BlockPos::new(0, 30, 0)), Some("stone"));
        assert_eq!(world.block_at(BlockPos::new(0, 60, 0)), Some("dirt"));
        assert_eq!(world.block_at(BlockPos::new(0, 63, 0)), Some("grass_block"));
        assert_eq!(world.block_at(BlockPos::new(0, 64, 0)), Some("air"));
        assert_eq!(world.block_at(BlockPos::new(17, 64, 0)), None);
        assert_eq!(world.block_at(BlockPos::new(0, -1, 0)), None);
    }

    #[test]
    fn generation_is_deterministic() {
        let config = WorldConfig::default();
        let a = World::generate(&config);
        let b = World::generate(&config);
        assert_eq!(a.overrides, b.overrides);
        assert_eq!(a.entities(), b.entities());
        assert_eq!(a.block_at(STATION_POS), Some("crafting_table"));
    }

    #[test]
    fn find_blocks_is_nearest_first_and_bounded() {
        let mut world = spawned();
        let _ = world.set_block(BlockPos::new(6, 64, 0), "oak_log");
        let _ = world.set_block(BlockPos::new(2, 64, 0), "oak_log");
        let _ = world.set_block(BlockPos::new(30, 64, 0), "oak_log");
        let found = world.find_blocks("oak_log", SPAWN, 10.0, 5);
        assert_eq!(found, vec![BlockPos::new(2, 64, 0), BlockPos::new(6, 64, 0)]);

        let grass = world.find_blocks("grass_block", SPAWN, 3.0, 1);
        assert_eq!(grass, vec![BlockPos::new(0, 63, 0)]);
    }

    #[test]
    fn dug_terrain_is_not_found_again() {
        let mut world = spawned();
        let below = BlockPos::new(0, 63, 0);
        let events = world.dig(below);
        assert!(events.is_ok());
        assert_eq!(world.block_at(below), Some("air"));
        let grass = world.find_blocks("grass_block", SPAWN, 1.5, 10);
        assert!(!grass.contains(&below));
        let dirt = world.avatar().map(|a| a.inventory.count_of("dirt"));
        assert_eq!(dirt, Some(1));
    }

    #[test]
    fn dig_rejects_empty_and_far_cells() {
        let mut world = spawned();
        assert_eq!(
            world.dig(BlockPos::new(0, 70, 0)),
            Err(WorldError::EmptyCell(BlockPos::new(0, 70, 0)))
        );
        assert_eq!(
            world.dig(BlockPos::new(20, 63, 0)),
            Err(WorldError::OutOfReach(BlockPos::new(20, 63, 0)))
        );
    }

    #[test]
    fn inventory_stacks_and_spills_into_new_slots() {
        let mut inventory = Inventory::default();
        assert_eq!(inventory.add("dirt", 100), 100);
        let items = inventory.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items.first().map(|i| i.count), Some(64));
        assert!(inventory.remove("dirt", 101).is_err());
        assert!(inventory.remove("dirt", 90).is_ok());
        assert_eq!(inventory.count_of("dirt"), 10);
    }

    #[test]
    fn tools_carry_durability_and_break() {
        let mut inventory = Inventory::default();
        inventory.add("wooden_pickaxe", 1);
        let durability = inventory.items().first().and_then(|i| i.durability);
        assert_eq!(durability, Some(Durability { current: 59, max: 59 }));
        let broke = (0..59).map(|_| inventory.wear("wooden_pickaxe")).any(|b| b);
        assert!(broke);
        assert_eq!(inventory.count_of("wooden_pickaxe"), 0);
    }

    #[test]
    fn craft_consumes_ingredients() {
        let mut world = spawned();
        let _ = world.give("oak_log", 2);
        let recipe = catalog::recipes_for("oak_planks");
        let Some(recipe) = recipe.first() else {
            return;
        };
        let events = world.craft(recipe, 2, None);
        assert!(matches!(
            events.as_deref(),
            Ok([SessionEvent::CraftCompleted { .. }])
        ));
        let avatar = world.avatar();
        assert_eq!(avatar.map(|a| a.inventory.count_of("oak_planks")), Some(8));
        assert_eq!(avatar.map(|a| a.inventory.count_of("oak_log")), Some(0));
    }

    #[test]
    fn station_recipes_need_a_table_in_reach() {
        let mut world = spawned();
        let _ = world.give("oak_planks", 3);
        let _ = world.give("stick", 2);
        let recipe = catalog::recipes_for("wooden_pickaxe");
        let Some(recipe) = recipe.first() else {
            return;
        };
        assert!(matches!(
            world.craft(recipe, 1, None),
            Err(WorldError::StationRequired(_))
        ));
        let _ = world.set_block(BlockPos::new(1, 64, 1), "crafting_table");
        assert!(world.craft(recipe, 1, Some(BlockPos::new(1, 64, 1))).is_ok());
    }

    #[test]
    fn step_stops_at_radius() {
        let mut world = spawned();
        let target = SPAWN.offset(3.0, 0.0, 0.0);
        for _ in 0..10 {
            if !matches!(world.step_avatar(target, 1.0, 1.0), Ok(Some(_))) {
                break;
            }
        }
        let position = world.avatar().map(|a| a.position).unwrap_or_default();
        assert!((position.distance_to(&target) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn death_respawns_with_empty_inventory() {
        let mut world = spawned();
        let _ = world.give("dirt", 5);
        let events = world.damage_avatar(25.0).unwrap_or_default();
        assert!(events.contains(&SessionEvent::Death));
        let avatar = world.avatar();
        assert_eq!(avatar.map(|a| a.inventory.count_of("dirt")), Some(0));
        assert_eq!(avatar.map(|a| a.position), Some(SPAWN));
    }
}
