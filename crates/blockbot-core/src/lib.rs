//! Action execution and state synchronization for the blockbot engine.
//!
//! This crate owns the single live avatar connection, serializes and
//! time-bounds each requested action, reconciles the cached situation
//! snapshot after every action or world event, recovers lost connections,
//! and records behavior outcomes in a durable knowledge store.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `blockbot-config.yaml`, the
//!   shared [`ConfigHandle`](config::ConfigHandle) and hot reload.
//! - [`session`] -- [`Connector`](session::Connector),
//!   [`AvatarSession`](session::AvatarSession) and capability traits.
//! - [`connection`] -- The live connection and its loaded capabilities.
//! - [`supervisor`] -- Connect, loss detection and fixed-delay reconnect.
//! - [`snapshot`] -- The cached situation snapshot and its refresh routine.
//! - [`chat`] -- Fixed-capacity chat history.
//! - [`knowledge`] -- Write-through knowledge store.
//! - [`fingerprint`] -- Situation fingerprints for behavior records.
//! - [`actions`] -- One handler per action kind.
//! - [`dispatcher`] -- Busy gating, timeouts and post-action bookkeeping.
//! - [`sync`] -- Periodic and event-driven background synchronization.
//! - [`context`] -- [`BotContext`](context::BotContext), which ties the
//!   components together.

pub mod actions;
pub mod chat;
pub mod config;
pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod fingerprint;
pub mod knowledge;
pub mod session;
pub mod snapshot;
pub mod supervisor;
pub mod sync;
