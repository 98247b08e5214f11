//! End-to-end action dispatch against the simulated world.
//!
//! Each test hosts a small flat world on a [`SimServer`], wires a
//! [`BotContext`] to it and drives actions through the dispatcher exactly
//! as the control surface does.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use blockbot_core::config::{BotConfig, BusyPolicy, ConfigHandle};
use blockbot_core::context::BotContext;
use blockbot_core::knowledge::KnowledgeStore;
use blockbot_types::{
    ActionKind, ActionRequest, BlockPos, CapabilityKind, ChatOrigin, EntityKind, Vec3,
};
use blockbot_world::grid::SPAWN;
use blockbot_world::{SimOptions, SimServer, World};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn temp_knowledge() -> PathBuf {
    std::env::temp_dir().join(format!("blockbot-test-{}.json", uuid::Uuid::new_v4()))
}

fn fast_server() -> SimServer {
    SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_millis(1),
            ..SimOptions::default()
        },
    )
}

fn test_config() -> BotConfig {
    let mut config = BotConfig::default();
    config.dispatch.attack_poll_interval_ms = 5;
    config.connection.reconnect_delay_ms = 50;
    config
}

fn context(server: &SimServer, config: BotConfig) -> Arc<BotContext> {
    BotContext::new(
        ConfigHandle::new(config, None),
        Arc::new(server.clone()),
        KnowledgeStore::empty(temp_knowledge()),
    )
}

async fn started(server: &SimServer, config: BotConfig) -> Arc<BotContext> {
    let ctx = context(server, config);
    ctx.start().await.unwrap();
    ctx
}

fn inventory_count(server: &SimServer, item: &str) -> u32 {
    server.with_world(|w| w.avatar().map_or(0, |a| a.inventory.count_of(item)))
}

// ---------------------------------------------------------------------------
// Gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_without_connection_is_rejected() {
    let server = fast_server();
    let ctx = context(&server, test_config());

    let result = ctx
        .dispatcher()
        .dispatch(ActionRequest::Chat {
            message: "hello".to_owned(),
        })
        .await;

    assert!(!result.success);
    assert_eq!(result.message, "not connected");
    assert_eq!(server.connect_count(), 0);
}

#[tokio::test]
async fn dispatch_before_spawn_is_rejected() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            spawn_on_connect: false,
            ..SimOptions::default()
        },
    );
    let ctx = started(&server, test_config()).await;
    assert!(ctx.bot_status().loading);

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "look", "x": 0, "y": 64, "z": 5}))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "avatar is not spawned");
}

#[tokio::test]
async fn unknown_type_leaves_snapshot_and_knowledge_untouched() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "fly", "x": 1}))
        .await;

    assert!(!result.success);
    assert_eq!(result.action, None);
    assert!(result.message.contains("unknown action type"));
    assert_eq!(ctx.snapshot().get().await.last_action, None);
    assert!(ctx.knowledge().snapshot().await.behaviors.is_empty());
}

#[tokio::test]
async fn invalid_parameters_name_the_action() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "move", "x": "north"}))
        .await;

    assert!(!result.success);
    assert_eq!(result.action, Some(ActionKind::Move));
    assert!(ctx.knowledge().snapshot().await.behaviors.is_empty());
}

// ---------------------------------------------------------------------------
// Bookkeeping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_dispatched_action_records_behavior_and_last_action() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let ok = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "look", "x": 5, "y": 64, "z": 0}))
        .await;
    assert!(ok.success);
    let snapshot = ctx.snapshot().get().await;
    assert_eq!(snapshot.last_action, Some(ActionKind::Look));
    assert_eq!(snapshot.action_result.as_deref(), Some("success"));

    let failed = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "equip", "item": "wooden_pickaxe"}))
        .await;
    assert!(!failed.success);
    let snapshot = ctx.snapshot().get().await;
    assert_eq!(snapshot.last_action, Some(ActionKind::Equip));
    assert!(
        snapshot
            .action_result
            .as_deref()
            .is_some_and(|r| r.starts_with("error: "))
    );

    let knowledge = ctx.knowledge().snapshot().await;
    let entries: Vec<_> = knowledge.behaviors.values().flatten().collect();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].outcome["success"], json!(true));
    assert_eq!(entries[1].outcome["success"], json!(false));
    assert_eq!(entries[1].action["type"], json!("equip"));
}

#[tokio::test]
async fn chat_adds_exactly_one_bot_record() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    let shutdown = CancellationToken::new();
    let workers = ctx.spawn_workers(&shutdown);

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "chat", "message": "hello there"}))
        .await;
    assert!(result.success);
    assert!(result.message_id.is_some());

    // Give the event loop time to see the echo of our own line.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let history = ctx.chat().history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].origin, ChatOrigin::Bot);
    assert_eq!(history[0].message, "hello there");
    assert_eq!(Some(history[0].id), result.message_id);

    server.say("Steve", "hi bot");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let history = ctx.chat().history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].origin, ChatOrigin::Player);
    assert_eq!(history[1].sender, "Steve");

    shutdown.cancel();
    for worker in workers {
        worker.await.unwrap();
    }
}

#[tokio::test]
async fn chat_is_truncated_to_the_length_limit() {
    let server = fast_server();
    let mut config = test_config();
    config.connection.chat_length_limit = 5;
    let ctx = started(&server, config).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "chat", "message": "abcdefghij"}))
        .await;
    assert!(result.success);
    let history = ctx.chat().history().await;
    assert_eq!(history[0].message, "abcde");
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[tokio::test]
async fn move_arrives_within_goal_radius() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "move", "x": 8.5, "y": 64, "z": 0.5}))
        .await;

    assert!(result.success, "{}", result.message);
    let position = result.position.unwrap();
    assert!(position.distance_to(&Vec3::new(8.5, 64.0, 0.5)) <= 1.0 + 1e-6);
    assert_eq!(server.avatar_position(), Some(position));
}

#[tokio::test]
async fn move_out_of_the_world_has_no_path() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "move", "x": 500, "y": 64, "z": 0}))
        .await;

    assert!(!result.success);
    assert!(result.message.starts_with("no path"));
    assert_eq!(result.position, Some(SPAWN));
}

#[tokio::test(start_paused = true)]
async fn long_move_times_out_and_stops_walking() {
    let server = SimServer::new(
        World::flat(64),
        SimOptions {
            step_delay: Duration::from_secs(1),
            ..SimOptions::default()
        },
    );
    let ctx = started(&server, test_config()).await;

    // 60 blocks at one block per second against a 40s timeout.
    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "move", "x": 60.5, "y": 64, "z": 0.5}))
        .await;

    assert!(!result.success);
    assert!(result.timed_out);
    assert_eq!(result.message, "move timed out after 40000ms");
    let stopped_at = server.avatar_position().unwrap();
    assert!(stopped_at.x < 59.0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(server.avatar_position(), Some(stopped_at));
}

#[tokio::test]
async fn busy_dispatcher_rejects_overlapping_action() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_millis(20),
            ..SimOptions::default()
        },
    );
    let ctx = started(&server, test_config()).await;

    let mover = Arc::clone(&ctx);
    let first = tokio::spawn(async move {
        mover
            .dispatcher()
            .dispatch_value(json!({"type": "move", "x": 12.5, "y": 64, "z": 0.5}))
            .await
    });
    while !ctx.dispatcher().is_busy() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let second = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "look", "x": 0, "y": 64, "z": 5}))
        .await;
    assert!(!second.success);
    assert!(second.message.starts_with("busy"));
    assert!(second.position.is_some());

    let first = first.await.unwrap();
    assert!(first.success, "{}", first.message);
    assert_eq!(
        ctx.snapshot().get().await.last_action,
        Some(ActionKind::Move)
    );
}

#[tokio::test]
async fn queue_policy_waits_for_the_running_action() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_millis(10),
            ..SimOptions::default()
        },
    );
    let mut config = test_config();
    config.dispatch.busy_policy = BusyPolicy::Queue;
    let ctx = started(&server, config).await;

    let mover = Arc::clone(&ctx);
    let first = tokio::spawn(async move {
        mover
            .dispatcher()
            .dispatch_value(json!({"type": "move", "x": 6.5, "y": 64, "z": 0.5}))
            .await
    });
    while !ctx.dispatcher().is_busy() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let second = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "look", "x": 0, "y": 64, "z": 5}))
        .await;
    assert!(second.success, "{}", second.message);
    assert!(first.await.unwrap().success);
    assert_eq!(
        ctx.snapshot().get().await.last_action,
        Some(ActionKind::Look)
    );
}

#[tokio::test(start_paused = true)]
async fn queued_move_is_bounded_by_its_own_timeout() {
    let server = SimServer::new(
        World::flat(64),
        SimOptions {
            step_delay: Duration::from_secs(1),
            ..SimOptions::default()
        },
    );
    let mut config = test_config();
    config.dispatch.busy_policy = BusyPolicy::Queue;
    let ctx = started(&server, config).await;

    let mover = Arc::clone(&ctx);
    let first = tokio::spawn(async move {
        mover
            .dispatcher()
            .dispatch_value(json!({"type": "move", "x": 15.5, "y": 64, "z": 0.5}))
            .await
    });
    while !ctx.dispatcher().is_busy() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // At most 30 blocks away: 30 * 500ms + 10s = 25s, part of it spent queued.
    let began = tokio::time::Instant::now();
    let second = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "move", "x": 30.5, "y": 64, "z": 0.5}))
        .await;
    let waited = began.elapsed();

    assert!(first.await.unwrap().success);
    assert!(!second.success);
    assert!(second.timed_out);
    assert!(second.message.starts_with("move timed out after"));
    assert!(waited <= Duration::from_millis(25_100), "{waited:?}");
    assert!(second.position.unwrap().x < 30.0);
}

#[tokio::test(start_paused = true)]
async fn detached_dispatch_finishes_after_the_caller_gives_up() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_secs(1),
            ..SimOptions::default()
        },
    );
    let ctx = started(&server, test_config()).await;

    let abandoned = tokio::time::timeout(
        Duration::from_secs(3),
        ctx.dispatch_detached(json!({"type": "move", "x": 10.5, "y": 64, "z": 0.5})),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(ctx.snapshot().get().await.last_action, None);

    tokio::time::sleep(Duration::from_secs(15)).await;
    while ctx.dispatcher().is_busy() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let snapshot = ctx.snapshot().get().await;
    assert_eq!(snapshot.last_action, Some(ActionKind::Move));
    assert_eq!(snapshot.action_result.as_deref(), Some("success"));
    let behaviors = ctx.knowledge().snapshot().await.behaviors;
    assert_eq!(behaviors.values().map(Vec::len).sum::<usize>(), 1);
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dig_on_empty_cell_fails_without_moving() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "dig", "x": 10, "y": 70, "z": 10}))
        .await;

    assert!(!result.success);
    assert!(result.message.starts_with("no block at"));
    assert_eq!(result.position, Some(SPAWN));
    assert_eq!(server.avatar_position(), Some(SPAWN));
}

#[tokio::test]
async fn dig_walks_over_and_collects_the_drop() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    server.give("wooden_shovel", 1).unwrap();

    let target = BlockPos::new(8, 63, 0);
    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "dig", "x": 8, "y": 63, "z": 0}))
        .await;

    assert!(result.success, "{}", result.message);
    assert!(result.message.contains("with wooden_shovel"));
    assert_eq!(server.block(target).as_deref(), Some("air"));
    assert_eq!(inventory_count(&server, "dirt"), 1);
}

#[tokio::test]
async fn collect_reports_how_many_blocks_were_harvested() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    for y in 64..67 {
        server.set_block(BlockPos::new(4, y, 2), "oak_log").unwrap();
    }

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "collect", "blockType": "oak_log", "count": 2}))
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.collected, Some(2));
    assert_eq!(inventory_count(&server, "oak_log"), 2);

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "collect", "block_type": "oak_log", "count": 3}))
        .await;
    assert!(!result.success);
    assert_eq!(result.collected, Some(1));
    assert!(result.message.contains("no more oak_log"));
    assert_eq!(inventory_count(&server, "oak_log"), 3);
}

#[tokio::test]
async fn collect_unknown_block_fails_fast() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "collect", "block_type": "unobtainium"}))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "unknown block type: unobtainium");
    assert_eq!(result.collected, None);
}

#[tokio::test]
async fn collect_without_the_capability_reports_it_unavailable() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_millis(1),
            disabled: vec![CapabilityKind::Collection],
            ..SimOptions::default()
        },
    );
    let ctx = started(&server, test_config()).await;
    assert!(
        !ctx.bot_status()
            .capabilities
            .contains(&CapabilityKind::Collection)
    );

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "collect", "block_type": "grass_block"}))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "collection capability is unavailable");
}

#[tokio::test]
async fn place_needs_a_support_block() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    server.give("cobblestone", 2).unwrap();

    let placed = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "place", "item": "cobblestone", "x": 3, "y": 64, "z": 3}))
        .await;
    assert!(placed.success, "{}", placed.message);
    assert_eq!(
        server.block(BlockPos::new(3, 64, 3)).as_deref(),
        Some("cobblestone")
    );

    let floating = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "place", "item": "cobblestone", "x": 3, "y": 70, "z": 3}))
        .await;
    assert!(!floating.success);
    assert!(floating.message.starts_with("nothing to place against"));
    assert_eq!(inventory_count(&server, "cobblestone"), 1);
}

#[tokio::test]
async fn place_without_the_item_fails() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "place", "item": "dirt", "x": 1, "y": 64, "z": 1}))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "no dirt in inventory");
}

// ---------------------------------------------------------------------------
// Crafting and inventory
// ---------------------------------------------------------------------------

#[tokio::test]
async fn craft_walks_to_a_crafting_table() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    server.give("oak_planks", 3).unwrap();
    server.give("stick", 2).unwrap();

    let missing = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "craft", "item": "wooden_pickaxe"}))
        .await;
    assert!(!missing.success);
    assert_eq!(missing.message, "no crafting table nearby to craft wooden_pickaxe");

    server
        .set_block(BlockPos::new(10, 64, 4), "crafting_table")
        .unwrap();
    let crafted = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "craft", "item": "wooden_pickaxe"}))
        .await;
    assert!(crafted.success, "{}", crafted.message);
    assert_eq!(inventory_count(&server, "wooden_pickaxe"), 1);
    assert_eq!(inventory_count(&server, "oak_planks"), 0);
    assert!(crafted.position.unwrap().x > 5.0);
}

#[tokio::test]
async fn craft_without_ingredients_fails_with_the_world_reason() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "craft", "item": "oak_planks", "count": 2}))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "not enough oak_log: need 2, have 0");
}

#[tokio::test]
async fn drop_is_capped_at_the_amount_held() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    server.give("dirt", 3).unwrap();

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "drop", "item": "dirt", "count": 10}))
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "dropped 3 dirt");
    assert_eq!(inventory_count(&server, "dirt"), 0);
}

#[tokio::test]
async fn equip_holds_the_item() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    server.give("wooden_sword", 1).unwrap();

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "equip", "item": "wooden_sword"}))
        .await;
    assert!(result.success);
    let held = server.with_world(|w| w.avatar().and_then(|a| a.held.clone()));
    assert_eq!(held.as_deref(), Some("wooden_sword"));
}

// ---------------------------------------------------------------------------
// Combat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn attack_approaches_and_hits_the_nearest_match() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;
    let near = server.spawn_entity("cow", EntityKind::Mob, Vec3::new(8.5, 64.0, 0.5));
    let far = server.spawn_entity("cow", EntityKind::Mob, Vec3::new(-20.5, 64.0, 0.5));

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "attack", "entityName": "COW"}))
        .await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.message, "attacked cow");
    let position = result.position.unwrap();
    assert!(position.distance_to(&Vec3::new(8.5, 64.0, 0.5)) <= 3.0);
    assert!(server.with_world(|w| w.entity_position(far).is_some()));
    assert!(server.with_world(|w| w.entity_position(near).is_some()));
}

#[tokio::test]
async fn attack_without_a_match_fails() {
    let server = fast_server();
    let ctx = started(&server, test_config()).await;

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "attack", "entity_name": "dragon"}))
        .await;
    assert!(!result.success);
    assert_eq!(result.message, "no entity named dragon nearby");
}

#[tokio::test]
async fn attack_target_that_vanishes_is_lost() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_millis(20),
            ..SimOptions::default()
        },
    );
    let ctx = started(&server, test_config()).await;
    let id = server.spawn_entity("zombie", EntityKind::Mob, Vec3::new(20.5, 64.0, 0.5));

    let attacker = Arc::clone(&ctx);
    let attack = tokio::spawn(async move {
        attacker
            .dispatcher()
            .dispatch_value(json!({"type": "attack", "entity_name": "zombie"}))
            .await
    });
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(server.remove_entity(id));

    let result = attack.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.message, "lost track of zombie");
}

#[tokio::test(start_paused = true)]
async fn timed_out_attack_stops_following_the_target() {
    let server = SimServer::new(
        World::flat(32),
        SimOptions {
            step_delay: Duration::from_secs(1),
            ..SimOptions::default()
        },
    );
    let mut config = test_config();
    config.dispatch.action_timeout_ms = 3_000;
    let ctx = started(&server, config).await;
    let _zombie = server.spawn_entity("zombie", EntityKind::Mob, Vec3::new(30.5, 64.0, 0.5));

    let result = ctx
        .dispatcher()
        .dispatch_value(json!({"type": "attack", "entity_name": "zombie"}))
        .await;
    assert!(!result.success);
    assert!(result.timed_out);
    assert_eq!(result.message, "attack timed out after 3000ms");

    let stopped_at = server.avatar_position().unwrap();
    assert!(stopped_at.x < 10.0);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.avatar_position(), Some(stopped_at));
}
