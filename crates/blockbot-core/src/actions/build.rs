//! `place`.

use blockbot_types::BlockPos;

use super::{ActionContext, ActionError, ActionOutcome};

/// Place `item` into the cell `target`, against the block below it.
pub(super) async fn place(
    ctx: &ActionContext<'_>,
    item: &str,
    target: BlockPos,
) -> Result<ActionOutcome, ActionError> {
    let session = ctx.connection.session();
    if !session.is_known_item(item) {
        return Err(ActionError::UnknownItem {
            name: item.to_owned(),
        });
    }
    if ctx.status()?.count_of(item) == 0 {
        return Err(ActionError::MissingItem {
            item: item.to_owned(),
        });
    }

    ctx.approach(target.center(), ctx.config.reach_distance).await?;

    if session.block_at(target).is_none() {
        return Err(ActionError::NoBlock { pos: target });
    }
    let support = target.below();
    match session.block_at(support) {
        Some(block) if !block.is_empty() => {}
        _ => return Err(ActionError::NoSupport { pos: target }),
    }

    session.equip(item).await?;
    session.place_on(support).await?;
    Ok(ActionOutcome::done(format!("placed {item} at {target}")))
}
