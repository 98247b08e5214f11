//! Avatar endpoint handlers.
//!
//! Actions submitted here run through the engine's dispatcher on a
//! detached task, so the busy gate and per-action timeouts apply and a
//! client that hangs up does not cut an action short. A dispatched action always answers
//! `200` with a normalized result; `success` tells the caller how it went.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/bot/status` | Connection lifecycle |
//! | `POST` | `/bot/action` | Dispatch one action |
//! | `POST` | `/bot/chat` | Send a chat message |
//! | `GET` | `/bot/chat/history` | Chat history, oldest first |
//! | `GET` | `/bot/vision` | Rendered frame, or a structured fallback |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use blockbot_types::{ActionRequest, ActionResult, InventoryItem, TrimmedSnapshot};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ControlError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /bot/chat`.
#[derive(Debug, serde::Deserialize)]
pub struct ChatRequest {
    /// Message text.
    pub message: String,
}

/// Response body for `POST /bot/action`: the action result with the
/// trimmed snapshot taken right after it.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    /// The normalized action result.
    #[serde(flatten)]
    pub result: ActionResult,
    /// Avatar health.
    pub health: f32,
    /// Avatar food level.
    pub food: u32,
    /// Leading inventory entries.
    pub inventory: Vec<InventoryItem>,
}

impl ActionResponse {
    /// Combine a result with a trimmed snapshot. The result's position wins
    /// when it has one.
    pub fn new(mut result: ActionResult, snapshot: TrimmedSnapshot) -> Self {
        if result.position.is_none() {
            result.position = snapshot.position;
        }
        Self {
            result,
            health: snapshot.health,
            food: snapshot.food,
            inventory: snapshot.inventory,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /bot/status
// ---------------------------------------------------------------------------

/// Connection lifecycle: connected, loading, or down.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.ctx.bot_status())
}

// ---------------------------------------------------------------------------
// POST /bot/action
// ---------------------------------------------------------------------------

/// Dispatch one action.
///
/// The body is handed to the dispatcher unparsed, so unknown types and bad
/// parameters come back as failed results rather than HTTP errors.
pub async fn action(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let result = state.ctx.dispatch_detached(body).await;
    let limit = state.ctx.config().current().snapshot.trimmed_inventory;
    let snapshot = state.ctx.snapshot().trimmed(limit).await;
    Json(ActionResponse::new(result, snapshot))
}

// ---------------------------------------------------------------------------
// POST /bot/chat
// ---------------------------------------------------------------------------

/// Send a chat message as the avatar.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<impl IntoResponse, ControlError> {
    if body.message.trim().is_empty() {
        return Err(ControlError::BadRequest("message must not be empty".to_owned()));
    }

    let request = serde_json::to_value(ActionRequest::Chat {
        message: body.message,
    })?;
    let result = state.ctx.dispatch_detached(request).await;

    if result.success {
        Ok(Json(serde_json::json!({
            "success": true,
            "message_id": result.message_id,
        })))
    } else {
        Ok(Json(serde_json::json!({
            "success": false,
            "error": result.message,
        })))
    }
}

// ---------------------------------------------------------------------------
// GET /bot/chat/history
// ---------------------------------------------------------------------------

/// Chat history, oldest first.
pub async fn chat_history(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let messages = state.ctx.chat().history().await;
    Json(serde_json::json!({
        "count": messages.len(),
        "messages": messages,
    }))
}

// ---------------------------------------------------------------------------
// GET /bot/vision
// ---------------------------------------------------------------------------

/// A rendered frame from the avatar's eyes.
///
/// When rendering is unavailable or fails, answers `success: false` with
/// the avatar's position, nearby entities and nearby blocks instead.
pub async fn vision(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ControlError> {
    let connection = state
        .ctx
        .supervisor()
        .current()
        .ok_or(ControlError::NotConnected)?;

    let error = match connection.renderer() {
        Ok(renderer) => match renderer.render().await {
            Ok(frame) => {
                debug!(mime = %frame.mime, "frame rendered");
                return Ok(Json(serde_json::json!({
                    "success": true,
                    "mode": "frame",
                    "mime": frame.mime,
                    "data": frame.data,
                })));
            }
            Err(e) => e.to_string(),
        },
        Err(e) => e.to_string(),
    };
    warn!(error = %error, "rendering unavailable, serving fallback view");

    state.ctx.refresh_snapshot().await;
    let snapshot = state.ctx.snapshot().get().await;
    Ok(Json(serde_json::json!({
        "success": false,
        "mode": "fallback",
        "error": error,
        "fallback": {
            "position": snapshot.position,
            "entities": snapshot.nearby_entities,
            "blocks": snapshot.nearby_blocks,
        },
    })))
}
