//! The process-wide engine context.
//!
//! [`BotContext`] owns every shared component: configuration, connection
//! supervisor, snapshot cache, chat log, knowledge store and dispatcher.
//! The entry point creates one and hands an [`Arc`] of it to the control
//! surface and the background workers.

use std::sync::Arc;

use blockbot_types::{ActionResult, CapabilityKind, ConnectionState, Vec3};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::chat::ChatLog;
use crate::config::ConfigHandle;
use crate::connection::AvatarConnection;
use crate::dispatcher::ActionDispatcher;
use crate::knowledge::KnowledgeStore;
use crate::session::Connector;
use crate::snapshot::SnapshotCache;
use crate::supervisor::{ConnectionSupervisor, SupervisorError};
use crate::sync;

/// Connection summary served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotStatus {
    /// Whether a session is live.
    pub connected: bool,
    /// Whether the session is live but the avatar has not spawned yet.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub loading: bool,
    /// Supervisor lifecycle state.
    pub state: ConnectionState,
    /// Avatar username, when connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Capabilities that loaded, when connected.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<CapabilityKind>,
}

/// Shared engine state.
#[derive(Debug)]
pub struct BotContext {
    config: ConfigHandle,
    supervisor: Arc<ConnectionSupervisor>,
    snapshot: Arc<SnapshotCache>,
    chat: Arc<ChatLog>,
    knowledge: Arc<KnowledgeStore>,
    dispatcher: ActionDispatcher,
}

impl BotContext {
    /// Wire the components together. Nothing connects yet.
    pub fn new(
        config: ConfigHandle,
        connector: Arc<dyn Connector>,
        knowledge: KnowledgeStore,
    ) -> Arc<Self> {
        let current = config.current();
        let supervisor = ConnectionSupervisor::new(connector, config.clone());
        let snapshot = Arc::new(SnapshotCache::new());
        let chat = Arc::new(ChatLog::new(current.snapshot.chat_capacity));
        let knowledge = Arc::new(knowledge);
        let dispatcher = ActionDispatcher::new(
            config.clone(),
            Arc::clone(&supervisor),
            Arc::clone(&snapshot),
            Arc::clone(&chat),
            Arc::clone(&knowledge),
        );
        Arc::new(Self {
            config,
            supervisor,
            snapshot,
            chat,
            knowledge,
            dispatcher,
        })
    }

    /// Open the initial connection and take a first snapshot.
    pub async fn start(&self) -> Result<Arc<AvatarConnection>, SupervisorError> {
        let connection = self.supervisor.connect().await?;
        self.refresh_snapshot().await;
        Ok(connection)
    }

    /// Start the background workers. They stop when `shutdown` is
    /// cancelled.
    pub fn spawn_workers(self: &Arc<Self>, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(sync::run_refresh_loop(Arc::clone(self), shutdown.clone())),
            tokio::spawn(sync::run_event_loop(Arc::clone(self), shutdown.clone())),
            tokio::spawn(Arc::clone(self).follow_config(shutdown.clone())),
        ]
    }

    /// Apply configuration changes that need more than a re-read.
    async fn follow_config(self: Arc<Self>, shutdown: CancellationToken) {
        let mut changes = self.config.subscribe();
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            let capacity = changes.borrow_and_update().snapshot.chat_capacity;
            self.chat.set_capacity(capacity).await;
            info!(chat_capacity = capacity, "applied configuration change");
        }
        debug!("config follower stopped");
    }

    /// Dispatch a raw request on its own task.
    ///
    /// The dispatch runs to completion, snapshot refresh and behavior record
    /// included, even if the caller stops waiting for it.
    pub async fn dispatch_detached(self: &Arc<Self>, value: serde_json::Value) -> ActionResult {
        let ctx = Arc::clone(self);
        let task = tokio::spawn(async move { ctx.dispatcher.dispatch_value(value).await });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "dispatch task failed");
                ActionResult::rejected(None, format!("dispatch task failed: {e}"))
            }
        }
    }

    /// Stop reconnecting and drop the connection.
    pub fn shutdown(&self) {
        self.supervisor.shutdown();
    }

    /// Recompute the snapshot from the current connection.
    ///
    /// Returns `false` when there is no connection or the avatar has not
    /// spawned.
    pub async fn refresh_snapshot(&self) -> bool {
        let Some(connection) = self.supervisor.current() else {
            return false;
        };
        let config = self.config.current();
        self.snapshot
            .refresh(&connection, &self.chat, &config.snapshot)
            .await
    }

    /// Summary of the connection for status reporting.
    pub fn bot_status(&self) -> BotStatus {
        let state = self.supervisor.state();
        match self.supervisor.current() {
            Some(connection) => BotStatus {
                connected: true,
                loading: !connection.is_spawned(),
                state,
                username: Some(connection.username().to_owned()),
                capabilities: connection.capabilities(),
            },
            None => BotStatus {
                connected: false,
                loading: false,
                state,
                username: None,
                capabilities: Vec::new(),
            },
        }
    }

    /// The avatar's live position, if spawned.
    pub fn avatar_position(&self) -> Option<Vec3> {
        self.supervisor
            .current()
            .and_then(|c| c.session().status())
            .map(|s| s.position)
    }

    /// Whether `name` is the connected avatar's own username.
    pub fn is_own_username(&self, name: &str) -> bool {
        self.supervisor
            .current()
            .is_some_and(|c| c.username() == name)
    }

    /// Configuration handle.
    pub const fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Connection supervisor.
    pub const fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    /// Snapshot cache.
    pub fn snapshot(&self) -> &SnapshotCache {
        &self.snapshot
    }

    /// Chat history.
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Knowledge store.
    pub fn knowledge(&self) -> &KnowledgeStore {
        &self.knowledge
    }

    /// Action dispatcher.
    pub const fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }
}
