//! `collect` and `dig`.

use blockbot_types::{BlockPos, CapabilityKind};
use tracing::{debug, info};

use super::{ActionContext, ActionError, ActionOutcome};

/// Harvest up to `count` blocks of `block_type`, one search per unit.
///
/// Stops early when no matching block is left within the radius or a
/// single collection fails. Succeeds only when every requested unit was
/// harvested.
pub(super) async fn collect(
    ctx: &ActionContext<'_>,
    block_type: &str,
    count: u32,
    radius: Option<f64>,
) -> Result<ActionOutcome, ActionError> {
    let session = ctx.connection.session();
    if !session.is_known_block(block_type) {
        return Err(ActionError::UnknownBlock {
            name: block_type.to_owned(),
        });
    }
    if count == 0 {
        return Err(ActionError::InvalidParameters {
            message: "collect count must be at least 1".to_owned(),
        });
    }
    let collector = ctx.connection.collector()?;
    let radius = radius
        .filter(|r| r.is_finite() && *r > 0.0)
        .unwrap_or(ctx.config.search_radius);

    let mut collected = 0_u32;
    let mut stop_reason = None;
    while collected < count {
        if ctx.cancel.is_cancelled() {
            stop_reason = Some("cancelled".to_owned());
            break;
        }
        let Some(target) = session.find_blocks(block_type, radius, 1).first().copied() else {
            stop_reason = Some(format!("no more {block_type} within {radius} blocks"));
            break;
        };
        debug!(block = block_type, %target, "collecting block");
        if let Err(e) = collector.collect(target, ctx.cancel).await {
            stop_reason = Some(format!("collection failed at {target}: {e}"));
            break;
        }
        collected = collected.saturating_add(1);
    }

    info!(block = block_type, collected, requested = count, "collect finished");
    let message = stop_reason.map_or_else(
        || format!("collected {collected}/{count} {block_type}"),
        |reason| format!("collected {collected}/{count} {block_type}: {reason}"),
    );
    Ok(ActionOutcome {
        success: collected == count,
        message,
        collected: Some(collected),
        message_id: None,
    })
}

/// Break the block at `pos` with the best available tool.
///
/// Fails before moving when the cell is empty or not loaded.
pub(super) async fn dig(ctx: &ActionContext<'_>, pos: BlockPos) -> Result<ActionOutcome, ActionError> {
    let session = ctx.connection.session();
    let block = match session.block_at(pos) {
        Some(block) if !block.is_empty() => block,
        _ => return Err(ActionError::NoBlock { pos }),
    };
    ctx.require(CapabilityKind::ToolSelection)?;

    ctx.approach(pos.center(), ctx.config.reach_distance).await?;
    let tool = ctx.connection.tools()?.equip_best_tool(pos).await?;
    session.dig(pos, ctx.cancel).await?;

    let with = tool.map_or_else(String::new, |t| format!(" with {t}"));
    Ok(ActionOutcome::done(format!("dug {} at {pos}{with}", block.name)))
}
