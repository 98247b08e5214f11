//! Serialized, time-bounded action dispatch.
//!
//! [`ActionDispatcher::dispatch`] never fails: every request produces
//! exactly one [`ActionResult`]. One action runs at a time; what happens to
//! a request that arrives meanwhile depends on the configured
//! [`BusyPolicy`].
//!
//! For every request that reaches a live, spawned avatar the dispatcher:
//!
//! 1. fingerprints the situation,
//! 2. races the handler against the action's timeout,
//! 3. refreshes the snapshot,
//! 4. appends a behavior record keyed by the fingerprint,
//!
//! and only then returns. A timed-out handler's cancellation token is
//! cancelled; capabilities that cannot stop may keep acting for a while.

use std::sync::Arc;
use std::time::Duration;

use blockbot_types::{
    ActionKind, ActionParseError, ActionRequest, ActionResult, BehaviorEntry, Vec3,
};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::{self, ActionContext, ActionError, ActionOutcome};
use crate::chat::ChatLog;
use crate::config::{BotConfig, BusyPolicy, ConfigHandle};
use crate::fingerprint::{Situation, fingerprint};
use crate::knowledge::{KnowledgeStore, now_millis};
use crate::snapshot::SnapshotCache;
use crate::supervisor::ConnectionSupervisor;

/// Executes action requests against the current connection.
#[derive(Debug)]
pub struct ActionDispatcher {
    config: ConfigHandle,
    supervisor: Arc<ConnectionSupervisor>,
    snapshot: Arc<SnapshotCache>,
    chat: Arc<ChatLog>,
    knowledge: Arc<KnowledgeStore>,
    slot: Mutex<()>,
}

impl ActionDispatcher {
    /// Create a dispatcher over the shared components.
    pub fn new(
        config: ConfigHandle,
        supervisor: Arc<ConnectionSupervisor>,
        snapshot: Arc<SnapshotCache>,
        chat: Arc<ChatLog>,
        knowledge: Arc<KnowledgeStore>,
    ) -> Self {
        Self {
            config,
            supervisor,
            snapshot,
            chat,
            knowledge,
            slot: Mutex::new(()),
        }
    }

    /// Whether an action is currently running.
    pub fn is_busy(&self) -> bool {
        self.slot.try_lock().is_err()
    }

    /// Parse a raw JSON request and dispatch it.
    ///
    /// A request that does not parse fails without touching the snapshot or
    /// the knowledge store.
    pub async fn dispatch_value(&self, value: serde_json::Value) -> ActionResult {
        match ActionRequest::from_value(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                debug!(error = %e, "rejecting unparseable action request");
                let kind = match &e {
                    ActionParseError::InvalidParameters { kind, .. } => Some(*kind),
                    _ => None,
                };
                ActionResult::rejected(kind, e.to_string())
            }
        }
    }

    /// Execute one request and return its normalized result.
    ///
    /// The action's timeout is a single deadline for the whole call: a
    /// request queued behind a running action spends part of that budget
    /// waiting, and runs only for what is left.
    pub async fn dispatch(&self, request: ActionRequest) -> ActionResult {
        let started = Instant::now();
        let kind = request.kind();
        let config = self.config.current();

        let Some(connection) = self.supervisor.current() else {
            return ActionResult::rejected(Some(kind), ActionError::NotConnected.to_string());
        };
        let Some(status) = connection.session().status() else {
            return ActionResult::rejected(Some(kind), ActionError::NotSpawned.to_string());
        };
        let declared = action_timeout(&config, &request, status.position);
        let deadline = started.checked_add(declared);

        let Some(_guard) = self.acquire(&config, deadline).await else {
            info!(action = %kind, "rejecting action, dispatcher busy");
            let mut result = ActionResult::rejected(Some(kind), ActionError::Busy.to_string());
            result.position = Some(status.position);
            result.timed_out = config.dispatch.busy_policy == BusyPolicy::Queue;
            result.elapsed_ms = duration_ms(started.elapsed());
            return result;
        };

        // Waiting for the slot may have outlived the connection or moved the
        // avatar.
        let Some(connection) = self.supervisor.current() else {
            return ActionResult::rejected(Some(kind), ActionError::NotConnected.to_string());
        };
        let Some(status) = connection.session().status() else {
            return ActionResult::rejected(Some(kind), ActionError::NotSpawned.to_string());
        };
        let fresh = action_timeout(&config, &request, status.position);
        let remaining = deadline.map_or(fresh, |d| d.saturating_duration_since(Instant::now()));
        let (timeout, ceiling) = if fresh <= remaining {
            (fresh, fresh)
        } else {
            (remaining, declared)
        };

        let key = fingerprint(&Situation::observe(
            connection.session(),
            config.snapshot.entity_radius,
        ));

        info!(action = %kind, timeout_ms = duration_ms(timeout), "dispatching action");
        let cancel = CancellationToken::new();
        let ctx = ActionContext {
            connection: &connection,
            config: &config.dispatch,
            chat_length_limit: config.connection.chat_length_limit,
            chat: &self.chat,
            cancel: &cancel,
        };
        let raced = tokio::time::timeout(timeout, actions::execute(&ctx, &request)).await;

        let (outcome, timed_out) = match raced {
            Ok(Ok(outcome)) => (outcome, false),
            Ok(Err(e)) => {
                warn!(action = %kind, error = %e, "action failed");
                (failed(e.to_string()), false)
            }
            Err(_elapsed) => {
                cancel.cancel();
                warn!(action = %kind, timeout_ms = duration_ms(ceiling), "action timed out");
                (
                    failed(format!("{kind} timed out after {}ms", duration_ms(ceiling))),
                    true,
                )
            }
        };

        let position = connection
            .session()
            .status()
            .map_or(status.position, |s| s.position);
        let result = ActionResult {
            action: Some(kind),
            success: outcome.success,
            message: outcome.message,
            position: Some(position),
            timed_out,
            elapsed_ms: duration_ms(started.elapsed()),
            collected: outcome.collected,
            message_id: outcome.message_id,
        };

        let short = if result.success {
            "success".to_owned()
        } else {
            format!("error: {}", result.message)
        };
        self.snapshot.record_action(kind, short).await;
        self.snapshot
            .refresh(&connection, &self.chat, &config.snapshot)
            .await;

        let entry = BehaviorEntry {
            action: serde_json::to_value(&request).unwrap_or(serde_json::Value::Null),
            outcome: result.outcome_value(),
            timestamp: now_millis(),
        };
        if let Err(e) = self.knowledge.record_behavior(&key, entry).await {
            warn!(error = %e, "failed to persist behavior record");
        }

        info!(
            action = %kind,
            success = result.success,
            timed_out,
            elapsed_ms = result.elapsed_ms,
            "action finished"
        );
        result
    }

    /// Take the dispatch slot according to the busy policy.
    ///
    /// A queued request waits until `deadline`, or indefinitely without one.
    async fn acquire(
        &self,
        config: &BotConfig,
        deadline: Option<Instant>,
    ) -> Option<MutexGuard<'_, ()>> {
        match (config.dispatch.busy_policy, deadline) {
            (BusyPolicy::Reject, _) => self.slot.try_lock().ok(),
            (BusyPolicy::Queue, Some(deadline)) => {
                tokio::time::timeout_at(deadline, self.slot.lock()).await.ok()
            }
            (BusyPolicy::Queue, None) => Some(self.slot.lock().await),
        }
    }
}

/// The ceiling for `request` issued with the avatar at `position`.
fn action_timeout(config: &BotConfig, request: &ActionRequest, position: Vec3) -> Duration {
    match request.target_point() {
        Some(target) if request.kind() == ActionKind::Move => {
            config.dispatch.move_timeout(position.distance_to(&target))
        }
        _ => config.dispatch.action_timeout(),
    }
}

fn failed(message: String) -> ActionOutcome {
    ActionOutcome {
        success: false,
        message,
        collected: None,
        message_id: None,
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
