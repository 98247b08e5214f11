//! Engine-level endpoint handlers: status, configuration and knowledge.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/status` | Engine status and current configuration |
//! | `POST` | `/config` | Replace and persist the configuration |
//! | `GET` | `/knowledge` | The full knowledge store |
//! | `POST` | `/learn` | Add a crafting, building, behavior, resource or exploration record |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use blockbot_core::config::BotConfig;
use blockbot_types::{BlockPos, KnowledgeCategory};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::error::ControlError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request body for `POST /learn`.
#[derive(Debug, serde::Deserialize)]
pub struct LearnRequest {
    /// Record type: `crafting`, `building`, `behavior`, `resource` or
    /// `exploration`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific payload.
    #[serde(default)]
    pub data: Value,
}

/// `data` for a crafting record.
#[derive(Debug, serde::Deserialize)]
struct CraftingData {
    item: String,
    recipe: Value,
}

/// `data` for a building record.
#[derive(Debug, serde::Deserialize)]
struct BuildingData {
    pattern: String,
    blocks: Value,
}

/// `data` for a behavior record.
#[derive(Debug, serde::Deserialize)]
struct BehaviorData {
    situation: Value,
    action: Value,
    outcome: Value,
}

/// `data` for a resource sighting.
#[derive(Debug, serde::Deserialize)]
struct ResourceData {
    #[serde(alias = "type", alias = "blockType")]
    block: String,
    #[serde(alias = "pos")]
    position: BlockPos,
}

/// `data` for an exploration record.
#[derive(Debug, serde::Deserialize)]
struct ExplorationData {
    area: String,
    #[serde(default)]
    details: Value,
}

/// Parse a `/learn` payload, reporting shape errors as bad requests.
fn parse_data<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, ControlError> {
    serde_json::from_value(data)
        .map_err(|e| ControlError::BadRequest(format!("invalid {kind} data: {e}")))
}

/// Behavior key for a situation: strings are used as-is, anything else is
/// keyed by its JSON text.
fn situation_key(situation: &Value) -> Result<String, ControlError> {
    match situation {
        Value::String(key) => Ok(key.clone()),
        other => Ok(serde_json::to_string(other)?),
    }
}

// ---------------------------------------------------------------------------
// GET /status
// ---------------------------------------------------------------------------

/// Engine status with the configuration currently in effect.
pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.ctx.config().current();
    Json(serde_json::json!({
        "status": "ok",
        "config": *config,
        "time": Utc::now(),
        "started_at": state.started_at,
    }))
}

// ---------------------------------------------------------------------------
// POST /config
// ---------------------------------------------------------------------------

/// Replace the configuration and write it back to its file.
///
/// Missing sections fall back to their defaults, like the file loader.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ControlError> {
    let config: BotConfig = serde_json::from_value(body)
        .map_err(|e| ControlError::BadRequest(format!("invalid configuration: {e}")))?;
    state.ctx.config().update(config).await?;
    info!("configuration replaced over HTTP");

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "configuration updated",
    })))
}

// ---------------------------------------------------------------------------
// GET /knowledge
// ---------------------------------------------------------------------------

/// The full knowledge store.
pub async fn knowledge(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.ctx.knowledge().snapshot().await)
}

// ---------------------------------------------------------------------------
// POST /learn
// ---------------------------------------------------------------------------

/// Add one knowledge record. Unknown record types are rejected with 400.
pub async fn learn(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LearnRequest>,
) -> Result<impl IntoResponse, ControlError> {
    let store = state.ctx.knowledge();
    let kind = body.kind.as_str();
    match kind {
        "crafting" => {
            let data: CraftingData = parse_data(kind, body.data)?;
            store
                .learn(KnowledgeCategory::Crafting, &data.item, data.recipe)
                .await?;
        }
        "building" => {
            let data: BuildingData = parse_data(kind, body.data)?;
            store
                .learn(KnowledgeCategory::Building, &data.pattern, data.blocks)
                .await?;
        }
        "behavior" => {
            let data: BehaviorData = parse_data(kind, body.data)?;
            let key = situation_key(&data.situation)?;
            let entry = serde_json::json!({
                "action": data.action,
                "outcome": data.outcome,
            });
            store
                .record(KnowledgeCategory::Behaviors, &key, entry)
                .await?;
        }
        "resource" => {
            let data: ResourceData = parse_data(kind, body.data)?;
            store.record_resource(&data.block, data.position).await?;
        }
        "exploration" => {
            let data: ExplorationData = parse_data(kind, body.data)?;
            store
                .learn(KnowledgeCategory::Exploration, &data.area, data.details)
                .await?;
        }
        other => {
            return Err(ControlError::BadRequest(format!(
                "unknown learning type: {other}"
            )));
        }
    }
    info!(kind, "knowledge learned over HTTP");

    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": "learned",
    })))
}
