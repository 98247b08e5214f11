//! Background state synchronization.
//!
//! Two workers keep the snapshot and knowledge store current between
//! actions:
//!
//! - [`run_refresh_loop`] refreshes the snapshot on a fixed interval.
//! - [`run_event_loop`] reacts to session events: chat lines go into the
//!   chat log, relevant world changes trigger a refresh, and new areas,
//!   resource sightings and completed crafts become knowledge.
//!
//! Both subscribe through the supervisor, so they keep working across
//! reconnects.

use std::sync::Arc;

use blockbot_types::{BlockPos, ChatOrigin, ChatRecord, KnowledgeCategory, Vec3};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SnapshotConfig;
use crate::context::BotContext;
use crate::session::{SessionEvent, is_empty_block};
use crate::snapshot::scan_blocks;

/// Half-width of the cube whose blocks describe a newly explored area.
const AREA_SCAN_RADIUS: i32 = 16;

/// Refresh the snapshot every `snapshot.refresh_interval_ms` until
/// `shutdown` is cancelled.
///
/// The interval is re-read from the configuration after every tick.
pub async fn run_refresh_loop(ctx: Arc<BotContext>, shutdown: CancellationToken) {
    loop {
        let interval = ctx.config().current().snapshot.refresh_interval();
        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
        ctx.refresh_snapshot().await;
    }
    debug!("snapshot refresh loop stopped");
}

/// Apply session events until `shutdown` is cancelled.
pub async fn run_event_loop(ctx: Arc<BotContext>, shutdown: CancellationToken) {
    let mut events = ctx.supervisor().subscribe_events();
    let mut tracker = WorldTracker::default();
    loop {
        let event = tokio::select! {
            () = shutdown.cancelled() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => tracker.apply(&ctx, event).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "session event loop lagged, refreshing snapshot");
                ctx.refresh_snapshot().await;
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("session event loop stopped");
}

/// State the event loop carries between events.
#[derive(Debug, Default)]
pub struct WorldTracker {
    last_refresh_position: Option<Vec3>,
    current_area: Option<(i32, i32)>,
}

impl WorldTracker {
    /// Apply one event.
    pub async fn apply(&mut self, ctx: &BotContext, event: SessionEvent) {
        let config = ctx.config().current();
        let snapshot_config = &config.snapshot;
        let own_position = ctx.avatar_position();

        match event {
            SessionEvent::Chat { sender, message } => {
                if ctx.is_own_username(&sender) {
                    return;
                }
                debug!(%sender, "chat received");
                ctx.chat()
                    .push(ChatRecord::new(ChatOrigin::Player, sender, message))
                    .await;
                ctx.refresh_snapshot().await;
            }
            SessionEvent::SystemMessage { message } => {
                ctx.chat()
                    .push(ChatRecord::new(ChatOrigin::System, "server", message))
                    .await;
            }
            SessionEvent::Spawned => {
                info!("avatar spawned");
                self.refresh(ctx).await;
            }
            SessionEvent::Moved { position } => {
                let moved_far = self
                    .last_refresh_position
                    .is_none_or(|last| last.distance_to(&position) > snapshot_config.move_threshold);
                if moved_far {
                    self.refresh(ctx).await;
                }
                self.visit_area(ctx, position, snapshot_config).await;
            }
            SessionEvent::BlockChanged { pos, new, .. } => {
                let near = own_position.is_some_and(|p| within_cube(p.block(), pos, snapshot_config.block_radius));
                if !near {
                    return;
                }
                let sighted = if is_empty_block(&new) {
                    Ok(false)
                } else {
                    ctx.knowledge().record_resource(&new, pos).await
                };
                if let Err(e) = sighted {
                    warn!(error = %e, "failed to persist resource sighting");
                }
                self.refresh(ctx).await;
            }
            SessionEvent::EntityMoved { position, .. } => {
                let near = own_position
                    .is_some_and(|p| p.distance_to(&position) <= snapshot_config.entity_radius);
                if near {
                    self.refresh(ctx).await;
                }
            }
            SessionEvent::HealthChanged { .. } | SessionEvent::ItemCollected { .. } => {
                self.refresh(ctx).await;
            }
            SessionEvent::CraftCompleted { item, recipe } => {
                let value = serde_json::to_value(&recipe).unwrap_or(serde_json::Value::Null);
                if let Err(e) = ctx
                    .knowledge()
                    .learn(KnowledgeCategory::Crafting, &item, value)
                    .await
                {
                    warn!(error = %e, "failed to persist crafting recipe");
                }
            }
            SessionEvent::Death => {
                warn!("avatar died");
                ctx.snapshot().record_result("died").await;
            }
            SessionEvent::Kicked { .. } | SessionEvent::Error { .. } | SessionEvent::Ended { .. } => {
                // The supervisor owns recovery.
                self.last_refresh_position = None;
                self.current_area = None;
            }
        }
    }

    async fn refresh(&mut self, ctx: &BotContext) {
        if ctx.refresh_snapshot().await {
            self.last_refresh_position = ctx.avatar_position();
        }
    }

    /// Record the area containing `position` if the avatar just entered it.
    async fn visit_area(&mut self, ctx: &BotContext, position: Vec3, config: &SnapshotConfig) {
        let area = area_of(position.block(), config.area_size);
        if self.current_area == Some(area) {
            return;
        }
        self.current_area = Some(area);

        let Some(connection) = ctx.supervisor().current() else {
            return;
        };
        let blocks = scan_blocks(
            connection.session(),
            position.block(),
            AREA_SCAN_RADIUS,
            usize::MAX,
        );
        let mut counts = std::collections::BTreeMap::<String, u32>::new();
        for block in &blocks {
            let count = counts.entry(block.name.clone()).or_default();
            *count = count.saturating_add(1);
        }
        let key = format!("{},{}", area.0, area.1);
        let details = json!({
            "blocks": counts,
            "entered_at": position,
        });
        info!(area = %key, "entered new area");
        if let Err(e) = ctx
            .knowledge()
            .learn(KnowledgeCategory::Exploration, &key, details)
            .await
        {
            warn!(error = %e, "failed to persist explored area");
        }
    }
}

/// Area coordinates of the cell `pos` for square areas of side `size`.
pub fn area_of(pos: BlockPos, size: i32) -> (i32, i32) {
    let size = size.max(1);
    (pos.x.div_euclid(size), pos.z.div_euclid(size))
}

fn within_cube(center: BlockPos, pos: BlockPos, radius: i32) -> bool {
    let dx = center.x.abs_diff(pos.x);
    let dy = center.y.abs_diff(pos.y);
    let dz = center.z.abs_diff(pos.z);
    let radius = radius.unsigned_abs();
    dx <= radius && dy <= radius && dz <= radius
}
