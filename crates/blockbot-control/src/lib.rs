//! HTTP control surface for the blockbot engine.
//!
//! This crate provides an Axum HTTP server through which an external
//! decision-maker drives the avatar:
//!
//! - **Status endpoints** (`/status`, `/bot/status`) for the engine
//!   configuration and the connection lifecycle
//! - **Action endpoints** (`/bot/action`, `/bot/chat`) that submit one
//!   action to the dispatcher and return its normalized result
//! - **Read endpoints** for chat history, the knowledge store and the
//!   avatar's view (`/bot/vision`)
//! - **Write endpoints** for configuration (`/config`) and knowledge
//!   (`/learn`)
//!
//! # Architecture
//!
//! Every handler works against the shared
//! [`BotContext`](blockbot_core::context::BotContext). Actions go through
//! its dispatcher, so the busy gate and timeouts apply to HTTP callers the
//! same way they apply to anything else. The server itself holds no state
//! of its own.

pub mod bot;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;

// Re-export primary types for convenience.
pub use error::ControlError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use state::AppState;
