//! Situation fingerprints observed from live sessions.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use blockbot_core::config::{BotConfig, ConfigHandle};
use blockbot_core::context::BotContext;
use blockbot_core::fingerprint::{Situation, fingerprint};
use blockbot_core::knowledge::KnowledgeStore;
use blockbot_types::{EntityKind, Vec3};
use blockbot_world::{SimOptions, SimServer, World};

const ENTITY_RADIUS: f64 = 16.0;

/// A server with a connected avatar.
async fn connected() -> (SimServer, Arc<BotContext>) {
    let server = SimServer::new(World::flat(32), SimOptions::default());
    let knowledge =
        std::env::temp_dir().join(format!("blockbot-fp-{}.json", uuid::Uuid::new_v4()));
    let ctx = BotContext::new(
        ConfigHandle::new(BotConfig::default(), None),
        Arc::new(server.clone()),
        KnowledgeStore::empty(knowledge),
    );
    ctx.start().await.unwrap();
    (server, ctx)
}

fn observed_key(ctx: &BotContext) -> String {
    let connection = ctx.supervisor().current().unwrap();
    fingerprint(&Situation::observe(connection.session(), ENTITY_RADIUS))
}

#[tokio::test]
async fn identical_worlds_fingerprint_alike_regardless_of_entity_order() {
    let (first, first_ctx) = connected().await;
    first.give("oak_log", 3).unwrap();
    first.give("cobblestone", 12).unwrap();
    let _cow = first.spawn_entity("cow", EntityKind::Mob, Vec3::new(3.5, 64.0, 0.5));
    let _zombie = first.spawn_entity("zombie", EntityKind::Mob, Vec3::new(0.5, 64.0, 7.5));
    let _steve = first.spawn_entity("Steve", EntityKind::Player, Vec3::new(-4.5, 64.0, 0.5));

    let (second, second_ctx) = connected().await;
    second.give("oak_log", 3).unwrap();
    second.give("cobblestone", 12).unwrap();
    let _steve = second.spawn_entity("Steve", EntityKind::Player, Vec3::new(-4.5, 64.0, 0.5));
    let _zombie = second.spawn_entity("zombie", EntityKind::Mob, Vec3::new(0.5, 64.0, 7.5));
    let _cow = second.spawn_entity("cow", EntityKind::Mob, Vec3::new(3.5, 64.0, 0.5));

    let key = observed_key(&first_ctx);
    assert_eq!(key, observed_key(&second_ctx));
    assert!(key.contains("\"type\":\"mob\""));
}

#[tokio::test]
async fn a_closer_entity_changes_the_fingerprint() {
    let (near, near_ctx) = connected().await;
    let _cow = near.spawn_entity("cow", EntityKind::Mob, Vec3::new(2.5, 64.0, 0.5));
    let (far, far_ctx) = connected().await;
    let _cow = far.spawn_entity("cow", EntityKind::Mob, Vec3::new(9.5, 64.0, 0.5));

    assert_ne!(observed_key(&near_ctx), observed_key(&far_ctx));
}
