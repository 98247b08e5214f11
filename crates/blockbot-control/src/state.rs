//! Shared application state for the control API.

use std::sync::Arc;

use blockbot_core::context::BotContext;
use chrono::{DateTime, Utc};

/// State handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The engine context the handlers act through.
    pub ctx: Arc<BotContext>,
    /// When the control server was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wrap an engine context.
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self {
            ctx,
            started_at: Utc::now(),
        }
    }
}
