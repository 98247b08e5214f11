//! Ownership and recovery of the single avatar connection.
//!
//! The [`ConnectionSupervisor`] is the only writer of the current
//! connection. It opens sessions through a [`Connector`], forwards each
//! session's events to a broadcast channel that outlives reconnects, and
//! reacts to terminal events by scheduling a reconnect.
//!
//! At most one reconnect loop runs at a time. A terminal event that arrives
//! while a loop is already scheduled is logged and otherwise ignored, and
//! events from a connection that is no longer current never trigger one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use blockbot_types::ConnectionState;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigHandle;
use crate::connection::AvatarConnection;
use crate::session::{ConnectError, ConnectOptions, Connector, SessionEvent};

/// Capacity of the session event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Errors surfaced by the supervisor.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The connect attempt failed.
    #[error("failed to connect avatar: {source}")]
    Connect {
        /// The underlying connect error.
        #[from]
        source: ConnectError,
    },

    /// The supervisor has been shut down.
    #[error("supervisor is shut down")]
    ShutDown,
}

/// Owns the lifecycle of the avatar connection.
pub struct ConnectionSupervisor {
    connector: Arc<dyn Connector>,
    config: ConfigHandle,
    current: watch::Sender<Option<Arc<AvatarConnection>>>,
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<SessionEvent>,
    reconnect_scheduled: AtomicBool,
    reconnect_attempts: AtomicU64,
    shutdown: CancellationToken,
}

impl core::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &*self.state.borrow())
            .field("reconnect_scheduled", &self.reconnect_scheduled)
            .finish_non_exhaustive()
    }
}

impl ConnectionSupervisor {
    /// Create a supervisor with no connection.
    pub fn new(connector: Arc<dyn Connector>, config: ConfigHandle) -> Arc<Self> {
        let (current, _) = watch::channel(None);
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            connector,
            config,
            current,
            state,
            events,
            reconnect_scheduled: AtomicBool::new(false),
            reconnect_attempts: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        })
    }

    /// The current connection, if any.
    pub fn current(&self) -> Option<Arc<AvatarConnection>> {
        self.current.borrow().clone()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Subscribe to session events from this and every later connection.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Number of background reconnect attempts made so far.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// Whether a reconnect loop is currently scheduled or running.
    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_scheduled.load(Ordering::SeqCst)
    }

    /// Connect and make the new connection current.
    ///
    /// Used for the initial connection; failures propagate to the caller
    /// and do not schedule a retry.
    pub async fn connect(self: &Arc<Self>) -> Result<Arc<AvatarConnection>, SupervisorError> {
        if self.shutdown.is_cancelled() {
            return Err(SupervisorError::ShutDown);
        }
        match self.open().await {
            Ok((connection, events)) => {
                self.install(Arc::clone(&connection), events);
                Ok(connection)
            }
            Err(e) => {
                self.state.send_replace(ConnectionState::Error);
                Err(e.into())
            }
        }
    }

    /// Stop reconnecting and drop the current connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.current.send_replace(None);
        self.state.send_replace(ConnectionState::Disconnected);
        info!("connection supervisor shut down");
    }

    /// Open a session and finish its setup without making it current.
    async fn open(
        &self,
    ) -> Result<(Arc<AvatarConnection>, mpsc::UnboundedReceiver<SessionEvent>), ConnectError> {
        let config = self.config.current();
        let options = ConnectOptions {
            host: config.connection.host.clone(),
            port: config.connection.port,
            username: config.connection.username.clone(),
            version: config.connection.version.clone(),
            auth: config.connection.auth.clone(),
        };

        self.state.send_replace(ConnectionState::Connecting);
        info!(
            host = %options.host,
            port = options.port,
            username = %options.username,
            "connecting avatar"
        );

        let handle = tokio::time::timeout(
            config.connection.connect_timeout(),
            self.connector.connect(&options),
        )
        .await
        .map_err(|_elapsed| ConnectError::Timeout)??;

        let connection = Arc::new(
            AvatarConnection::establish(handle.session, config.connection.view_distance).await,
        );
        Ok((connection, handle.events))
    }

    /// Make `connection` current and start forwarding its events.
    fn install(
        self: &Arc<Self>,
        connection: Arc<AvatarConnection>,
        events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        info!(
            session_id = %connection.session_id(),
            username = connection.username(),
            version = connection.version(),
            capabilities = ?connection.capabilities(),
            "avatar connected"
        );
        self.current.send_replace(Some(Arc::clone(&connection)));
        self.state.send_replace(ConnectionState::Connected);

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor.pump(connection, events).await;
        });
    }

    /// Forward one connection's events until it ends.
    async fn pump(
        self: Arc<Self>,
        connection: Arc<AvatarConnection>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let session_id = connection.session_id();
        loop {
            let event = tokio::select! {
                () = self.shutdown.cancelled() => return,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                debug!(%session_id, "session event stream closed");
                self.on_connection_lost(&connection, ConnectionState::Disconnected, true);
                return;
            };

            // No subscribers is fine.
            let _ = self.events.send(event.clone());

            match event {
                SessionEvent::Kicked { reason } => {
                    warn!(%session_id, %reason, "avatar kicked");
                    self.on_connection_lost(&connection, ConnectionState::Kicked, true);
                    return;
                }
                SessionEvent::Error { message, transient } => {
                    error!(%session_id, %message, transient, "session error");
                    self.on_connection_lost(&connection, ConnectionState::Error, transient);
                    return;
                }
                SessionEvent::Ended { reason } => {
                    info!(%session_id, %reason, "session ended");
                    self.on_connection_lost(&connection, ConnectionState::Disconnected, true);
                    return;
                }
                _ => {}
            }
        }
    }

    /// Handle the loss of `connection`, scheduling at most one reconnect.
    fn on_connection_lost(
        self: &Arc<Self>,
        connection: &Arc<AvatarConnection>,
        state: ConnectionState,
        transient: bool,
    ) {
        let is_current = self
            .current
            .borrow()
            .as_ref()
            .is_some_and(|c| Arc::ptr_eq(c, connection));
        if !is_current {
            debug!(session_id = %connection.session_id(), "ignoring loss of stale connection");
            return;
        }

        self.current.send_replace(None);
        self.state.send_replace(state);

        if self.shutdown.is_cancelled() {
            return;
        }
        let config = self.config.current();
        if !config.connection.auto_reconnect {
            info!("auto-reconnect disabled, staying disconnected");
            return;
        }
        if !transient {
            warn!("session failure is not recoverable, staying disconnected");
            self.state.send_replace(ConnectionState::Disconnected);
            return;
        }
        if self.reconnect_scheduled.swap(true, Ordering::SeqCst) {
            debug!("reconnect already scheduled");
            return;
        }

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor.reconnect_loop().await;
        });
    }

    /// Retry with a fixed delay until connected, shut down, or a fatal
    /// error.
    async fn reconnect_loop(self: Arc<Self>) {
        loop {
            let connection_config = self.config.current().connection.clone();
            let delay = connection_config.reconnect_delay();
            info!(delay_ms = connection_config.reconnect_delay_ms, "scheduling reconnect");
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
            match self.open().await {
                Ok((connection, events)) => {
                    // Clear the flag before installing so a loss of the new
                    // connection can schedule its own reconnect.
                    self.reconnect_scheduled.store(false, Ordering::SeqCst);
                    if self.shutdown.is_cancelled() {
                        return;
                    }
                    self.install(connection, events);
                    return;
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "reconnect attempt failed, retrying");
                    self.state.send_replace(ConnectionState::Error);
                }
                Err(e) => {
                    error!(error = %e, "reconnect failed permanently");
                    self.state.send_replace(ConnectionState::Disconnected);
                    break;
                }
            }
        }
        self.reconnect_scheduled.store(false, Ordering::SeqCst);
    }
}
