//! Engine binary for blockbot.
//!
//! This is the main entry point that wires together the avatar
//! connection, the background synchronization workers, configuration hot
//! reload and the HTTP control surface, then runs until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `blockbot-config.yaml` (or `BLOCKBOT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load the knowledge store
//! 4. Create the world backend and the engine context
//! 5. Open the initial avatar connection (failure is fatal)
//! 6. Start the sync workers and the config watcher
//! 7. Start the control server
//! 8. Wait for `Ctrl-C`, then shut everything down

mod error;

use std::path::PathBuf;
use std::sync::Arc;

use blockbot_control::startup::spawn_control_server;
use blockbot_control::{AppState, ServerConfig};
use blockbot_core::config::{
    BotConfig, ConfigHandle, ConfigWatcher, DEFAULT_CONFIG_PATH, LoggingConfig,
};
use blockbot_core::context::BotContext;
use blockbot_core::knowledge::KnowledgeStore;
use blockbot_world::SimServer;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Environment variable naming an alternative configuration file.
const CONFIG_ENV: &str = "BLOCKBOT_CONFIG";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration cannot be read, the initial
/// connection fails, or the control server cannot start.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let config = BotConfig::load_or_default(&config_path).map_err(EngineError::from)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("blockbot-engine starting");
    info!(
        path = %config_path.display(),
        host = config.connection.host,
        port = config.connection.port,
        username = config.connection.username,
        auto_reconnect = config.connection.auto_reconnect,
        "Configuration loaded"
    );

    // 3. Load the knowledge store.
    let knowledge = KnowledgeStore::load(config.knowledge.path.clone()).await;

    // 4. Create the world backend and the engine context.
    let connector = SimServer::from_config(&config.world);
    info!(
        seed = config.world.seed,
        extent = config.world.extent,
        "World backend created"
    );
    let handle = ConfigHandle::new(config.clone(), Some(config_path));
    let ctx = BotContext::new(handle.clone(), Arc::new(connector), knowledge);

    // 5. Open the initial connection.
    let connection = ctx.start().await.map_err(EngineError::from)?;
    info!(
        username = connection.username(),
        version = connection.version(),
        capabilities = ?connection.capabilities(),
        "Avatar connected"
    );

    // 6. Start background workers.
    let shutdown = CancellationToken::new();
    let mut tasks = ctx.spawn_workers(&shutdown);
    let watcher = config
        .reload
        .enabled
        .then(|| ConfigWatcher::new(handle, config.reload.debounce()))
        .flatten();
    if let Some(watcher) = watcher {
        tasks.push(tokio::spawn(watcher.run(shutdown.clone())));
        info!(
            debounce_ms = config.reload.debounce_ms,
            "Config hot reload enabled"
        );
    }

    // 7. Start the control server.
    let app_state = Arc::new(AppState::new(Arc::clone(&ctx)));
    let control = spawn_control_server(
        ServerConfig::from(&config.server),
        app_state,
        shutdown.clone(),
    )
    .await
    .map_err(EngineError::from)?;
    tasks.push(control);

    // 8. Run until interrupted.
    tokio::signal::ctrl_c().await.map_err(EngineError::from)?;
    info!("Shutdown requested");

    shutdown.cancel();
    ctx.shutdown();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }

    info!("blockbot-engine shutdown complete");
    Ok(())
}

/// Configuration file path: `BLOCKBOT_CONFIG` when set, else the default
/// name in the working directory.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
