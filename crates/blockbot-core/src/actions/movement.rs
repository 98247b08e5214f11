//! `move` and `look`.

use blockbot_types::Vec3;

use super::{ActionContext, ActionError, ActionOutcome};

/// Walk to within the move goal radius of `target`.
pub(super) async fn move_to(ctx: &ActionContext<'_>, target: Vec3) -> Result<ActionOutcome, ActionError> {
    if !(target.x.is_finite() && target.y.is_finite() && target.z.is_finite()) {
        return Err(ActionError::InvalidParameters {
            message: "coordinates must be finite".to_owned(),
        });
    }
    ctx.approach(target, ctx.config.move_goal_radius).await?;
    let position = ctx.status()?.position;
    Ok(ActionOutcome::done(format!("arrived at {position}")))
}

/// Turn to face `target`.
pub(super) async fn look(ctx: &ActionContext<'_>, target: Vec3) -> Result<ActionOutcome, ActionError> {
    ctx.connection.session().look_at(target).await?;
    Ok(ActionOutcome::done(format!("looking at {target}")))
}
