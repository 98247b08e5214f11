//! Control server startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_control_server`] which launches the HTTP server on a
//! background Tokio task, so the control surface runs alongside the
//! engine's background workers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use blockbot_control::startup::spawn_control_server;
//! use blockbot_control::{AppState, ServerConfig};
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(ctx));
//! let handle = spawn_control_server(ServerConfig::default(), state, shutdown.clone()).await?;
//! ```

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the control server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Spawn the control HTTP server on a background Tokio task.
///
/// The host name is resolved before the task is spawned, so a
/// misconfigured address fails startup instead of a background task. The
/// server stops when `shutdown` is cancelled; the caller should await the
/// returned handle during clean shutdown.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured host does not
/// resolve.
pub async fn spawn_control_server(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>, StartupError> {
    let address = config.address();
    let resolved = tokio::net::lookup_host((config.host.as_str(), config.port))
        .await
        .map_err(|e| ServerError::Bind(format!("invalid address {address}: {e}")))?
        .next();
    if resolved.is_none() {
        return Err(ServerError::Bind(format!("{address} did not resolve")).into());
    }

    let handle = tokio::spawn(async move {
        if let Err(e) = crate::server::start_server(&config, state, shutdown).await {
            tracing::error!(error = %e, "Control server exited with error");
        }
    });

    tracing::info!(%address, "Control server spawned on background task");

    Ok(handle)
}
