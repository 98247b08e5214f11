//! `attack`.

use blockbot_types::Vec3;
use tracing::debug;

use super::{ActionContext, ActionError, ActionOutcome};
use crate::session::{EntityObservation, Goal, MovementPlanner, SessionError};

/// Stops the planner's background goal when dropped, including when the
/// dispatcher abandons the attack on timeout.
struct Pursuit<'a>(&'a dyn MovementPlanner);

impl Drop for Pursuit<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Approach the entity named `name` and hit it once in melee range.
///
/// The target is followed in the background while its distance is polled
/// at the configured interval. Movement stops before the hit, on every
/// failure path, and when the future is dropped mid-approach.
pub(super) async fn attack(ctx: &ActionContext<'_>, name: &str) -> Result<ActionOutcome, ActionError> {
    let session = ctx.connection.session();
    let origin = ctx.status()?.position;
    let Some(target) = nearest_match(session.entities(), name, origin, ctx.config.search_radius)
    else {
        return Err(ActionError::NoEntity {
            name: name.to_owned(),
        });
    };
    let planner = ctx.connection.movement()?;

    planner.set_goal(
        Goal::Follow {
            entity_id: target.id,
            radius: ctx.config.attack_goal_radius,
        },
        ctx.movement_options(),
    );
    let pursuit = Pursuit(planner);

    let approached = approach(ctx, &target).await;
    drop(pursuit);
    let current = approached?;

    session.look_at(current.head()).await?;
    session.attack(current.id).await?;
    Ok(ActionOutcome::done(format!("attacked {}", current.label())))
}

/// Poll until `target` is in melee range, returning its latest observation.
async fn approach(
    ctx: &ActionContext<'_>,
    target: &EntityObservation,
) -> Result<EntityObservation, ActionError> {
    let session = ctx.connection.session();
    let mut ticker = tokio::time::interval(ctx.config.attack_poll_interval());
    loop {
        tokio::select! {
            () = ctx.cancel.cancelled() => return Err(SessionError::Cancelled.into()),
            _ = ticker.tick() => {}
        }
        let Some(current) = session.entities().into_iter().find(|e| e.id == target.id) else {
            return Err(ActionError::TargetLost {
                name: target.label().to_owned(),
            });
        };
        let position = ctx.status()?.position;
        let distance = current.position.distance_to(&position);
        debug!(target = current.label(), distance, "approaching attack target");
        if distance <= ctx.config.melee_range {
            return Ok(current);
        }
    }
}

/// The nearest entity within `radius` of `origin` whose name matches.
fn nearest_match(
    entities: Vec<EntityObservation>,
    name: &str,
    origin: Vec3,
    radius: f64,
) -> Option<EntityObservation> {
    entities
        .into_iter()
        .filter(|e| e.matches(name))
        .map(|e| (e.position.distance_to(&origin), e))
        .filter(|(distance, _)| *distance <= radius)
        .min_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, e)| e)
}

#[cfg(test)]
mod tests {
    use blockbot_types::EntityKind;

    use super::*;

    fn cow(id: u32, x: f64) -> EntityObservation {
        EntityObservation {
            id,
            name: Some("cow".to_owned()),
            username: None,
            display_name: None,
            kind: EntityKind::Mob,
            position: Vec3::new(x, 64.0, 0.0),
            height: 1.4,
        }
    }

    #[test]
    fn picks_nearest_matching_entity_within_radius() {
        let origin = Vec3::new(0.0, 64.0, 0.0);
        let found = nearest_match(vec![cow(1, 20.0), cow(2, 5.0), cow(3, 50.0)], "cow", origin, 32.0);
        assert_eq!(found.map(|e| e.id), Some(2));
        assert!(nearest_match(vec![cow(3, 50.0)], "cow", origin, 32.0).is_none());
        assert!(nearest_match(vec![cow(2, 5.0)], "pig", origin, 32.0).is_none());
    }
}
