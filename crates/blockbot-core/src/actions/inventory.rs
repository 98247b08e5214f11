//! `equip` and `drop`.

use super::{ActionContext, ActionError, ActionOutcome};

/// Hold `item` in the main hand.
pub(super) async fn equip(ctx: &ActionContext<'_>, item: &str) -> Result<ActionOutcome, ActionError> {
    if ctx.status()?.count_of(item) == 0 {
        return Err(ActionError::MissingItem {
            item: item.to_owned(),
        });
    }
    ctx.connection.session().equip(item).await?;
    Ok(ActionOutcome::done(format!("equipped {item}")))
}

/// Toss up to `count` of `item`, capped at the amount held.
pub(super) async fn drop_items(
    ctx: &ActionContext<'_>,
    item: &str,
    count: u32,
) -> Result<ActionOutcome, ActionError> {
    let held = ctx.status()?.count_of(item);
    if held == 0 {
        return Err(ActionError::MissingItem {
            item: item.to_owned(),
        });
    }
    let amount = count.min(held);
    if amount == 0 {
        return Err(ActionError::InvalidParameters {
            message: "drop count must be at least 1".to_owned(),
        });
    }
    ctx.connection.session().toss(item, amount).await?;
    Ok(ActionOutcome::done(format!("dropped {amount} {item}")))
}
