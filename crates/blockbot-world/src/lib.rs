//! In-memory voxel world backend for the blockbot engine.
//!
//! Implements the session traits from `blockbot-core` against a small
//! procedural world, so the engine can run, and be tested, without a game
//! server.
//!
//! # Modules
//!
//! - [`catalog`] -- Blocks, tools, materials and recipes.
//! - [`grid`] -- Terrain, entities, the avatar and its inventory.
//! - [`server`] -- [`SimServer`], the [`Connector`](blockbot_core::session::Connector)
//!   implementation, plus fault injection.
//! - [`session`] -- [`SimSession`], one avatar session.
//! - [`capabilities`] -- Movement, collection, tool selection and rendering.
//! - [`error`] -- [`WorldError`].

pub mod capabilities;
pub mod catalog;
pub mod error;
pub mod grid;
pub mod server;
pub mod session;

pub use error::WorldError;
pub use grid::World;
pub use server::{SimOptions, SimServer};
pub use session::SimSession;
