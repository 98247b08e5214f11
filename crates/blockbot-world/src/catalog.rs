//! Static block, item, tool and recipe tables.
//!
//! The catalog is deliberately small: enough terrain, ores and tools for
//! every action kind to have something to act on.

use std::collections::BTreeMap;

use blockbot_core::session::Recipe;

/// Tool family that breaks a block fastest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolClass {
    /// Stone, ores, cobblestone.
    Pickaxe,
    /// Logs and planks.
    Axe,
    /// Dirt and grass.
    Shovel,
    /// Weapons; never chosen for breaking blocks.
    Sword,
}

/// One block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    /// Catalog name.
    pub name: &'static str,
    /// Preferred tool, if any.
    pub tool: Option<ToolClass>,
    /// Item dropped when broken (`None` drops nothing).
    pub drop: Option<&'static str>,
    /// Whether the block can be broken at all.
    pub breakable: bool,
}

/// One tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    /// Item name.
    pub name: &'static str,
    /// Tool family.
    pub class: ToolClass,
    /// Higher tiers are preferred.
    pub tier: u8,
    /// Uses when new.
    pub durability: u32,
}

const fn block(
    name: &'static str,
    tool: Option<ToolClass>,
    drop: Option<&'static str>,
) -> BlockSpec {
    BlockSpec {
        name,
        tool,
        drop,
        breakable: true,
    }
}

/// Every block in the world.
pub const BLOCKS: [BlockSpec; 13] = [
    BlockSpec {
        name: "air",
        tool: None,
        drop: None,
        breakable: false,
    },
    BlockSpec {
        name: "bedrock",
        tool: None,
        drop: None,
        breakable: false,
    },
    block("stone", Some(ToolClass::Pickaxe), Some("cobblestone")),
    block("cobblestone", Some(ToolClass::Pickaxe), Some("cobblestone")),
    block("dirt", Some(ToolClass::Shovel), Some("dirt")),
    block("grass_block", Some(ToolClass::Shovel), Some("dirt")),
    block("oak_log", Some(ToolClass::Axe), Some("oak_log")),
    block("oak_planks", Some(ToolClass::Axe), Some("oak_planks")),
    block("oak_leaves", None, None),
    block("crafting_table", Some(ToolClass::Axe), Some("crafting_table")),
    block("coal_ore", Some(ToolClass::Pickaxe), Some("coal")),
    block("iron_ore", Some(ToolClass::Pickaxe), Some("raw_iron")),
    block("torch", None, Some("torch")),
];

/// Every tool.
pub const TOOLS: [ToolSpec; 5] = [
    ToolSpec {
        name: "wooden_pickaxe",
        class: ToolClass::Pickaxe,
        tier: 1,
        durability: 59,
    },
    ToolSpec {
        name: "stone_pickaxe",
        class: ToolClass::Pickaxe,
        tier: 2,
        durability: 131,
    },
    ToolSpec {
        name: "wooden_axe",
        class: ToolClass::Axe,
        tier: 1,
        durability: 59,
    },
    ToolSpec {
        name: "wooden_shovel",
        class: ToolClass::Shovel,
        tier: 1,
        durability: 59,
    },
    ToolSpec {
        name: "wooden_sword",
        class: ToolClass::Sword,
        tier: 1,
        durability: 59,
    },
];

/// Items that are neither blocks nor tools.
pub const MATERIALS: [&str; 3] = ["stick", "coal", "raw_iron"];

/// `(item, units produced, ingredients, needs station)`.
type RecipeRow = (&'static str, u32, &'static [(&'static str, u32)], bool);

const RECIPES: [RecipeRow; 9] = [
    ("oak_planks", 4, &[("oak_log", 1)], false),
    ("stick", 4, &[("oak_planks", 2)], false),
    ("crafting_table", 1, &[("oak_planks", 4)], false),
    ("torch", 4, &[("coal", 1), ("stick", 1)], false),
    ("wooden_pickaxe", 1, &[("oak_planks", 3), ("stick", 2)], true),
    ("wooden_axe", 1, &[("oak_planks", 3), ("stick", 2)], true),
    ("wooden_shovel", 1, &[("oak_planks", 1), ("stick", 2)], true),
    ("wooden_sword", 1, &[("oak_planks", 2), ("stick", 1)], true),
    ("stone_pickaxe", 1, &[("cobblestone", 3), ("stick", 2)], true),
];

/// Largest stack a slot holds for non-tools.
pub const MAX_STACK: u32 = 64;

/// Look up a block.
pub fn block_spec(name: &str) -> Option<&'static BlockSpec> {
    BLOCKS.iter().find(|b| b.name == name)
}

/// Look up a tool.
pub fn tool_spec(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|t| t.name == name)
}

/// Whether `name` is a block.
pub fn is_block(name: &str) -> bool {
    block_spec(name).is_some()
}

/// Whether `name` is an item that can be held.
pub fn is_item(name: &str) -> bool {
    (is_block(name) && name != "air")
        || tool_spec(name).is_some()
        || MATERIALS.contains(&name)
}

/// Whether `name` can be placed as a block.
pub fn is_placeable(name: &str) -> bool {
    block_spec(name).is_some_and(|b| b.breakable)
}

/// Largest stack for `item`.
pub fn max_stack(item: &str) -> u32 {
    if tool_spec(item).is_some() { 1 } else { MAX_STACK }
}

/// Recipes producing `item`, preferred first.
pub fn recipes_for(item: &str) -> Vec<Recipe> {
    RECIPES
        .iter()
        .filter(|(name, ..)| *name == item)
        .map(|(name, count, ingredients, requires_station)| Recipe {
            item: (*name).to_owned(),
            count: *count,
            ingredients: ingredients
                .iter()
                .map(|(ingredient, units)| ((*ingredient).to_owned(), *units))
                .collect::<BTreeMap<_, _>>(),
            requires_station: *requires_station,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_recipe_ingredient_is_an_item() {
        for (item, _, ingredients, _) in RECIPES {
            assert!(is_item(item), "{item} is not an item");
            for (ingredient, _) in ingredients {
                assert!(is_item(ingredient), "{ingredient} is not an item");
            }
        }
    }

    #[test]
    fn every_drop_is_an_item() {
        for spec in BLOCKS {
            if let Some(drop) = spec.drop {
                assert!(is_item(drop), "{drop} is not an item");
            }
        }
    }

    #[test]
    fn tools_do_not_stack() {
        assert_eq!(max_stack("wooden_pickaxe"), 1);
        assert_eq!(max_stack("dirt"), MAX_STACK);
    }

    #[test]
    fn pickaxe_needs_station() {
        let recipes = recipes_for("wooden_pickaxe");
        assert_eq!(recipes.len(), 1);
        assert!(recipes.first().is_some_and(|r| r.requires_station));
        assert!(recipes_for("bedrock").is_empty());
    }

    #[test]
    fn air_is_not_an_item() {
        assert!(is_block("air"));
        assert!(!is_item("air"));
        assert!(!is_placeable("bedrock"));
    }
}
