//! Error types for the control API.
//!
//! [`ControlError`] unifies all failure modes into a single enum that
//! converts into an Axum HTTP response with a `{error, status}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use blockbot_core::config::ConfigError;
use blockbot_core::knowledge::KnowledgeError;

/// Errors that can occur in the control API layer.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// The request body was well-formed JSON but semantically invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The avatar is not connected.
    #[error("not connected")]
    NotConnected,

    /// Saving the configuration failed.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Writing the knowledge store failed.
    #[error("knowledge error: {0}")]
    Knowledge(#[from] KnowledgeError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for ControlError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::NotConnected => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            Self::Knowledge(KnowledgeError::InvalidEntry { .. }) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            Self::Config(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Knowledge(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
