//! `craft`.

use tracing::debug;

use super::{ActionContext, ActionError, ActionOutcome};

/// Block name of the crafting station.
const STATION_BLOCK: &str = "crafting_table";

/// Craft `count` of `item` using its first recipe.
///
/// Recipes that need a station are crafted at the nearest crafting table
/// within the search radius, after walking to it.
pub(super) async fn craft(
    ctx: &ActionContext<'_>,
    item: &str,
    count: u32,
) -> Result<ActionOutcome, ActionError> {
    let session = ctx.connection.session();
    if !session.is_known_item(item) {
        return Err(ActionError::UnknownItem {
            name: item.to_owned(),
        });
    }
    if count == 0 {
        return Err(ActionError::InvalidParameters {
            message: "craft count must be at least 1".to_owned(),
        });
    }
    let Some(recipe) = session.recipes_for(item).into_iter().next() else {
        return Err(ActionError::NoRecipe {
            item: item.to_owned(),
        });
    };

    let station = if recipe.requires_station {
        let Some(station) = session
            .find_blocks(STATION_BLOCK, ctx.config.search_radius, 1)
            .first()
            .copied()
        else {
            return Err(ActionError::NoStation {
                item: item.to_owned(),
            });
        };
        debug!(item, %station, "walking to crafting table");
        ctx.approach(station.center(), ctx.config.reach_distance).await?;
        Some(station)
    } else {
        None
    };

    session.craft(&recipe, count, station).await?;
    let produced = recipe.count.saturating_mul(count);
    Ok(ActionOutcome::done(format!("crafted {produced} {item}")))
}
