//! Axum router construction for the control API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::bot;
use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router for the control server.
///
/// The router includes:
/// - `GET /status` -- engine status and current configuration
/// - `POST /config` -- replace and persist the configuration
/// - `GET /knowledge` -- the full knowledge store
/// - `POST /learn` -- add a knowledge record
/// - `GET /bot/status` -- connection lifecycle
/// - `POST /bot/action` -- dispatch one action
/// - `POST /bot/chat` -- send a chat message
/// - `GET /bot/chat/history` -- chat history, oldest first
/// - `GET /bot/vision` -- rendered view or structured fallback
///
/// CORS allows any origin so local agent dashboards can call in.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Engine
        .route("/status", get(handlers::status))
        .route("/config", post(handlers::update_config))
        .route("/knowledge", get(handlers::knowledge))
        .route("/learn", post(handlers::learn))
        // Avatar
        .route("/bot/status", get(bot::status))
        .route("/bot/action", post(bot::action))
        .route("/bot/chat", post(bot::chat))
        .route("/bot/chat/history", get(bot::chat_history))
        .route("/bot/vision", get(bot::vision))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
