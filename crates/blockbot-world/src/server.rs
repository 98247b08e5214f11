//! The simulated server: accepts connections and owns the shared world.
//!
//! [`SimServer`] implements [`Connector`]. Every session it opens reads and
//! mutates the same [`World`], so state survives reconnects the way a real
//! server keeps player data. Only the most recent session is live; opening a
//! new one closes the previous one.
//!
//! The server also exposes the levers a real server would pull on its own:
//! other players chatting, blocks changing, entities wandering, kicks and
//! dropped connections.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use blockbot_core::config::WorldConfig;
use blockbot_core::session::{
    ConnectError, ConnectOptions, Connector, SessionEvent, SessionHandle,
};
use blockbot_types::{BlockPos, CapabilityKind, EntityKind, Vec3};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::WorldError;
use crate::grid::World;
use crate::session::SimSession;

/// Authentication modes the server accepts.
const AUTH_MODES: [&str; 2] = ["offline", "microsoft"];

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Behavior knobs for a [`SimServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOptions {
    /// Real time per block walked and per block broken.
    pub step_delay: Duration,
    /// Spawn the avatar as soon as a session opens.
    pub spawn_on_connect: bool,
    /// Only this protocol version is accepted. `None` accepts any.
    pub accepted_version: Option<String>,
    /// Capabilities that fail to load.
    pub disabled: Vec<CapabilityKind>,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(50),
            spawn_on_connect: true,
            accepted_version: None,
            disabled: Vec::new(),
        }
    }
}

impl SimOptions {
    /// Options matching a world configuration.
    pub fn from_config(config: &WorldConfig) -> Self {
        Self {
            step_delay: Duration::from_millis(config.step_delay_ms),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// The server's end of one session: its event sender and closed flag.
#[derive(Debug)]
pub(crate) struct Link {
    events: Mutex<Option<mpsc::UnboundedSender<SessionEvent>>>,
    closed: AtomicBool,
}

impl Link {
    fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether the session has ended.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Deliver events to the session's stream. Dropped once closed.
    pub(crate) fn emit(&self, events: impl IntoIterator<Item = SessionEvent>) {
        let guard = lock(&self.events);
        let Some(sender) = guard.as_ref() else {
            return;
        };
        for event in events {
            if sender.send(event).is_err() {
                break;
            }
        }
    }

    /// End the session, closing its stream.
    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        lock(&self.events).take();
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared by the server and every session it opened.
#[derive(Debug)]
pub(crate) struct Shared {
    world: Mutex<World>,
    options: SimOptions,
    live: Mutex<Option<Arc<Link>>>,
    failures: Mutex<VecDeque<ConnectError>>,
    connects: AtomicU64,
}

impl Shared {
    /// Exclusive access to the world. Never hold across an await.
    pub(crate) fn world(&self) -> MutexGuard<'_, World> {
        lock(&self.world)
    }

    /// Server options.
    pub(crate) const fn options(&self) -> &SimOptions {
        &self.options
    }

    fn live(&self) -> Option<Arc<Link>> {
        lock(&self.live).clone()
    }

    fn emit(&self, events: impl IntoIterator<Item = SessionEvent>) {
        if let Some(link) = self.live() {
            link.emit(events);
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// An in-process server hosting one world.
#[derive(Debug, Clone)]
pub struct SimServer {
    shared: Arc<Shared>,
}

impl SimServer {
    /// Host `world` with the given options.
    pub fn new(world: World, options: SimOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                world: Mutex::new(world),
                options,
                live: Mutex::new(None),
                failures: Mutex::new(VecDeque::new()),
                connects: AtomicU64::new(0),
            }),
        }
    }

    /// Generate a world from `config` and host it.
    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(World::generate(config), SimOptions::from_config(config))
    }

    /// Read the world.
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&self.shared.world())
    }

    /// Connect attempts made so far, successful or not.
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::Acquire)
    }

    /// Whether a session is currently open.
    pub fn is_live(&self) -> bool {
        self.shared.live().is_some_and(|link| !link.is_closed())
    }

    /// Make the next connect attempt fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next_connect(&self, error: ConnectError) {
        lock(&self.shared.failures).push_back(error);
    }

    // -- session faults ----------------------------------------------------

    /// Close the live session's stream without a word.
    pub fn drop_connection(&self) {
        if let Some(link) = lock(&self.shared.live).take() {
            warn!("dropping live session");
            link.close();
        }
    }

    /// Kick the live session.
    pub fn kick(&self, reason: &str) {
        self.end_live(SessionEvent::Kicked {
            reason: reason.to_owned(),
        });
    }

    /// Fail the live session.
    pub fn fail_session(&self, message: &str, transient: bool) {
        self.end_live(SessionEvent::Error {
            message: message.to_owned(),
            transient,
        });
    }

    fn end_live(&self, event: SessionEvent) {
        if let Some(link) = lock(&self.shared.live).take() {
            info!(?event, "ending live session");
            link.emit([event]);
            link.close();
        }
    }

    // -- world changes -----------------------------------------------------

    /// Another player says something.
    pub fn say(&self, sender: &str, message: &str) {
        self.shared.emit([SessionEvent::Chat {
            sender: sender.to_owned(),
            message: message.to_owned(),
        }]);
    }

    /// A server notice.
    pub fn announce(&self, message: &str) {
        self.shared.emit([SessionEvent::SystemMessage {
            message: message.to_owned(),
        }]);
    }

    /// Put items straight into the avatar's inventory.
    pub fn give(&self, item: &str, count: u32) -> Result<(), WorldError> {
        let events = self.shared.world().give(item, count)?;
        self.shared.emit(events);
        Ok(())
    }

    /// Replace a block.
    pub fn set_block(&self, pos: BlockPos, name: &str) -> Result<(), WorldError> {
        let event = self.shared.world().set_block(pos, name)?;
        self.shared.emit([event]);
        Ok(())
    }

    /// Add an entity. Players get `name` as their username.
    pub fn spawn_entity(&self, name: &str, kind: EntityKind, position: Vec3) -> u32 {
        let username = (kind == EntityKind::Player).then_some(name);
        let id = self
            .shared
            .world()
            .spawn_entity(name, username, kind, position, 1.8, 20.0);
        debug!(id, name, "entity spawned");
        self.shared.emit([SessionEvent::EntityMoved { id, position }]);
        id
    }

    /// Move an entity.
    pub fn move_entity(&self, id: u32, position: Vec3) -> Result<(), WorldError> {
        let event = self.shared.world().move_entity(id, position)?;
        self.shared.emit([event]);
        Ok(())
    }

    /// Remove an entity. Returns whether it existed.
    pub fn remove_entity(&self, id: u32) -> bool {
        self.shared.world().remove_entity(id)
    }

    /// Hurt the avatar.
    pub fn damage(&self, amount: f32) -> Result<(), WorldError> {
        let events = self.shared.world().damage_avatar(amount)?;
        self.shared.emit(events);
        Ok(())
    }

    /// Spawn the avatar if it is not in the world yet.
    pub fn spawn_avatar(&self) {
        let spawned = self.shared.world().spawn_avatar();
        if spawned {
            self.shared.emit([SessionEvent::Spawned]);
        }
    }

    // -- inspection --------------------------------------------------------

    /// The avatar's position, if spawned.
    pub fn avatar_position(&self) -> Option<Vec3> {
        self.with_world(|w| w.avatar().map(|a| a.position))
    }

    /// The block at `pos`, if loaded.
    pub fn block(&self, pos: BlockPos) -> Option<String> {
        self.with_world(|w| w.block_at(pos).map(str::to_owned))
    }
}

#[async_trait]
impl Connector for SimServer {
    async fn connect(&self, options: &ConnectOptions) -> Result<SessionHandle, ConnectError> {
        let attempt = self
            .shared
            .connects
            .fetch_add(1, Ordering::AcqRel)
            .saturating_add(1);
        debug!(attempt, username = %options.username, "connect attempt");

        if let Some(error) = lock(&self.shared.failures).pop_front() {
            return Err(error);
        }
        let accepted = self.shared.options.accepted_version.as_ref();
        if accepted.is_some_and(|version| *version != options.version) {
            return Err(ConnectError::VersionMismatch {
                version: options.version.clone(),
            });
        }
        if options.username.is_empty() || !AUTH_MODES.contains(&options.auth.as_str()) {
            return Err(ConnectError::AuthRejected {
                message: format!(
                    "cannot log in as {:?} with auth {:?}",
                    options.username, options.auth
                ),
            });
        }

        let (sender, events) = mpsc::unbounded_channel();
        let link = Arc::new(Link::new(sender));
        if let Some(previous) = lock(&self.shared.live).replace(Arc::clone(&link)) {
            previous.close();
        }

        if self.shared.options.spawn_on_connect {
            self.shared.world().spawn_avatar();
            link.emit([SessionEvent::Spawned]);
        }

        let session = SimSession::new(
            Arc::clone(&self.shared),
            link,
            options.username.clone(),
            options.version.clone(),
        );
        info!(username = %options.username, "session opened");
        Ok(SessionHandle {
            session: Arc::new(session),
            events,
        })
    }
}
