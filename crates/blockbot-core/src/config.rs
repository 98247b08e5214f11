//! Configuration loading, hot reload and typed config structures.
//!
//! The configuration lives in `blockbot-config.yaml` next to the binary.
//! This module defines strongly-typed structs that mirror the YAML
//! structure, a loader that reads and parses the file, and a
//! [`ConfigHandle`] through which every component reads the current value.
//!
//! [`ConfigWatcher`] listens for file-system notifications on the file
//! (through `notify`) and publishes new values through the handle. A file
//! that fails to parse keeps the previous value in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default configuration file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "blockbot-config.yaml";

/// Errors that can occur when loading or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write the configuration file.
    #[error("failed to access config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse or render YAML content.
    #[error("failed to process config YAML: {source}")]
    Yaml {
        /// The underlying YAML error.
        source: serde_yml::Error,
    },

    /// Failed to set up file-system notifications for hot reload.
    #[error("failed to watch config file: {source}")]
    Watch {
        /// The underlying watcher error.
        #[from]
        source: notify::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

// ---------------------------------------------------------------------------
// BotConfig
// ---------------------------------------------------------------------------

/// Top-level engine configuration.
///
/// Mirrors the structure of `blockbot-config.yaml`. Every field has a
/// default, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Avatar connection parameters.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// HTTP control surface bind address.
    #[serde(default)]
    pub server: ServerConfig,

    /// Snapshot refresh and scan radii.
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Action timeouts, busy policy and handler tuning.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Knowledge store location.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// In-memory world generation.
    #[serde(default)]
    pub world: WorldConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Configuration hot reload.
    #[serde(default)]
    pub reload: ReloadConfig,
}

impl BotConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values for addresses and
    /// identity:
    /// - `MC_HOST`, `MC_PORT`, `MC_USERNAME` override `connection.*`
    /// - `CONTROL_HOST`, `CONTROL_PORT` override `server.*`
    /// - `KNOWLEDGE_PATH` overrides `knowledge.path`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but does not parse is an error; a missing file
    /// is not.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Render this configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yml::to_string(self)?)
    }

    /// Write this configuration to `path`, replacing the file atomically.
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let yaml = self.to_yaml()?;
        let tmp = path.with_extension("yaml.tmp");
        tokio::fs::write(&tmp, yaml).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Apply environment variable overrides.
    ///
    /// Port values that do not parse are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MC_HOST") {
            self.connection.host = val;
        }
        if let Ok(val) = std::env::var("MC_PORT") {
            match val.parse() {
                Ok(port) => self.connection.port = port,
                Err(_) => warn!(value = %val, "ignoring invalid MC_PORT"),
            }
        }
        if let Ok(val) = std::env::var("MC_USERNAME") {
            self.connection.username = val;
        }
        if let Ok(val) = std::env::var("CONTROL_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("CONTROL_PORT") {
            match val.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %val, "ignoring invalid CONTROL_PORT"),
            }
        }
        if let Ok(val) = std::env::var("KNOWLEDGE_PATH") {
            self.knowledge.path = PathBuf::from(val);
        }
    }
}

/// Avatar connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Game server host.
    #[serde(default = "default_mc_host")]
    pub host: String,

    /// Game server port.
    #[serde(default = "default_mc_port")]
    pub port: u16,

    /// Avatar username.
    #[serde(default = "default_username")]
    pub username: String,

    /// Protocol version announced on connect.
    #[serde(default = "default_version")]
    pub version: String,

    /// Authentication mode (`offline` or `microsoft`).
    #[serde(default = "default_auth")]
    pub auth: String,

    /// View distance in chunks, applied once connected.
    #[serde(default = "default_view_distance")]
    pub view_distance: u8,

    /// Outbound chat messages are truncated to this many characters.
    #[serde(default = "default_chat_length_limit")]
    pub chat_length_limit: usize,

    /// Whether lost connections are re-established automatically.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,

    /// Fixed delay before each reconnect attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound on a single connect attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl ConnectionConfig {
    /// The reconnect delay as a [`Duration`].
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// The connect timeout as a [`Duration`].
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_mc_host(),
            port: default_mc_port(),
            username: default_username(),
            version: default_version(),
            auth: default_auth(),
            view_distance: default_view_distance(),
            chat_length_limit: default_chat_length_limit(),
            auto_reconnect: true,
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// HTTP control surface bind address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Snapshot refresh cadence and scan radii.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Periodic refresh interval.
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// Half-width of the cube scanned for nearby blocks.
    #[serde(default = "default_block_radius")]
    pub block_radius: i32,

    /// Nearby blocks kept after sorting by distance.
    #[serde(default = "default_max_blocks")]
    pub max_blocks: usize,

    /// Radius for nearby entities.
    #[serde(default = "default_entity_radius")]
    pub entity_radius: f64,

    /// Chat history ring buffer capacity.
    #[serde(default = "default_chat_capacity")]
    pub chat_capacity: usize,

    /// Avatar movement beyond this distance triggers a refresh.
    #[serde(default = "default_move_threshold")]
    pub move_threshold: f64,

    /// Inventory entries included with an action result.
    #[serde(default = "default_trimmed_inventory")]
    pub trimmed_inventory: usize,

    /// Side length of one explored area, in blocks.
    #[serde(default = "default_area_size")]
    pub area_size: i32,
}

impl SnapshotConfig {
    /// The refresh interval as a [`Duration`], never shorter than 10 ms.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(10))
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            block_radius: default_block_radius(),
            max_blocks: default_max_blocks(),
            entity_radius: default_entity_radius(),
            chat_capacity: default_chat_capacity(),
            move_threshold: default_move_threshold(),
            trimmed_inventory: default_trimmed_inventory(),
            area_size: default_area_size(),
        }
    }
}

/// What to do with an action request that arrives while another runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Fail immediately with a `busy` result.
    #[default]
    Reject,
    /// Wait for the running action, bounded by the new action's timeout.
    Queue,
}

/// Action timeouts, busy policy and handler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Ceiling for every action except `move`.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    /// Minimum `move` timeout.
    #[serde(default = "default_move_timeout_floor_ms")]
    pub move_timeout_floor_ms: u64,

    /// Extra `move` time allowed per block of distance.
    #[serde(default = "default_move_timeout_per_block_ms")]
    pub move_timeout_per_block_ms: u64,

    /// Fixed `move` allowance added to the distance term.
    #[serde(default = "default_move_timeout_base_ms")]
    pub move_timeout_base_ms: u64,

    /// Handling of concurrent requests.
    #[serde(default)]
    pub busy_policy: BusyPolicy,

    /// Default radius for block, station and entity searches.
    #[serde(default = "default_search_radius")]
    pub search_radius: f64,

    /// Goal radius for `move`.
    #[serde(default = "default_move_goal_radius")]
    pub move_goal_radius: f64,

    /// Distance the avatar approaches to before placing, digging or
    /// crafting at a station.
    #[serde(default = "default_reach_distance")]
    pub reach_distance: f64,

    /// Follow radius while approaching an attack target.
    #[serde(default = "default_attack_goal_radius")]
    pub attack_goal_radius: f64,

    /// Distance at which an attack lands.
    #[serde(default = "default_melee_range")]
    pub melee_range: f64,

    /// Interval between distance checks while approaching a target.
    #[serde(default = "default_attack_poll_interval_ms")]
    pub attack_poll_interval_ms: u64,

    /// Whether the movement planner may break blocks in the way.
    #[serde(default = "default_true")]
    pub allow_dig: bool,

    /// Whether the movement planner may pillar up (1x1 towers).
    #[serde(default = "default_true")]
    pub allow_towers: bool,

    /// Whether the movement planner may use free (parkour) motion.
    #[serde(default = "default_true")]
    pub allow_free_motion: bool,
}

impl DispatchConfig {
    /// The ceiling applied to every non-`move` action.
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Timeout for a `move` over `distance` blocks:
    /// `max(floor, distance * per_block + base)`.
    pub fn move_timeout(&self, distance: f64) -> Duration {
        let distance = if distance.is_finite() {
            distance.max(0.0)
        } else {
            0.0
        };
        let per_block = Duration::from_millis(self.move_timeout_per_block_ms).as_secs_f64();
        let scaled = Duration::try_from_secs_f64(distance * per_block).unwrap_or(Duration::MAX);
        let computed = scaled.saturating_add(Duration::from_millis(self.move_timeout_base_ms));
        computed.max(Duration::from_millis(self.move_timeout_floor_ms))
    }

    /// The attack polling interval, never shorter than 10 ms.
    pub fn attack_poll_interval(&self) -> Duration {
        Duration::from_millis(self.attack_poll_interval_ms.max(10))
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: default_action_timeout_ms(),
            move_timeout_floor_ms: default_move_timeout_floor_ms(),
            move_timeout_per_block_ms: default_move_timeout_per_block_ms(),
            move_timeout_base_ms: default_move_timeout_base_ms(),
            busy_policy: BusyPolicy::default(),
            search_radius: default_search_radius(),
            move_goal_radius: default_move_goal_radius(),
            reach_distance: default_reach_distance(),
            attack_goal_radius: default_attack_goal_radius(),
            melee_range: default_melee_range(),
            attack_poll_interval_ms: default_attack_poll_interval_ms(),
            allow_dig: true,
            allow_towers: true,
            allow_free_motion: true,
        }
    }
}

/// Knowledge store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Path of the JSON knowledge file.
    #[serde(default = "default_knowledge_path")]
    pub path: PathBuf,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            path: default_knowledge_path(),
        }
    }
}

/// In-memory world generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Random seed for terrain features and mob placement.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Half-width of the loaded area around the origin, in blocks.
    #[serde(default = "default_extent")]
    pub extent: i32,

    /// Real time the avatar takes to walk one block.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Trees scattered around spawn.
    #[serde(default = "default_trees")]
    pub trees: u32,

    /// Mobs scattered around spawn.
    #[serde(default = "default_mobs")]
    pub mobs: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            extent: default_extent(),
            step_delay_ms: default_step_delay_ms(),
            trees: default_trees(),
            mobs: default_mobs(),
        }
    }
}

/// Logging output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Configuration hot reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Whether the config file is watched for changes.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Quiet period after a change notification before the file is read,
    /// so an editor's burst of writes yields one reload.
    #[serde(default = "default_reload_debounce_ms")]
    pub debounce_ms: u64,
}

impl ReloadConfig {
    /// The debounce period as a [`Duration`].
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: default_reload_debounce_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigHandle
// ---------------------------------------------------------------------------

/// Shared access to the current configuration.
///
/// Cloning the handle is cheap; all clones observe the same value.
/// Readers take an [`Arc`] of the value current at the time of the call, so
/// a reload never changes a configuration mid-action.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<BotConfig>>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Create a handle holding `config`, optionally backed by a file.
    pub fn new(config: BotConfig, path: Option<PathBuf>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(config));
        Self {
            tx: Arc::new(tx),
            path,
        }
    }

    /// The current configuration.
    pub fn current(&self) -> Arc<BotConfig> {
        Arc::clone(&self.tx.borrow())
    }

    /// Subscribe to configuration changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BotConfig>> {
        self.tx.subscribe()
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Publish a new configuration in memory only.
    pub fn replace(&self, config: BotConfig) {
        self.tx.send_replace(Arc::new(config));
    }

    /// Write `config` to the backing file (when there is one), then publish
    /// it.
    pub async fn update(&self, config: BotConfig) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            config.save(path).await?;
            info!(path = %path.display(), "configuration saved");
        }
        self.replace(config);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigWatcher
// ---------------------------------------------------------------------------

/// Watches the configuration file and publishes changes through a
/// [`ConfigHandle`].
///
/// The file's directory is watched rather than the file itself, so editors
/// that save by renaming a new file into place are still seen.
#[derive(Debug)]
pub struct ConfigWatcher {
    handle: ConfigHandle,
    path: PathBuf,
    debounce: Duration,
}

impl ConfigWatcher {
    /// Create a watcher for the handle's backing file.
    ///
    /// Returns `None` when the handle has no file.
    pub fn new(handle: ConfigHandle, debounce: Duration) -> Option<Self> {
        let path = handle.path()?.to_path_buf();
        Some(Self {
            handle,
            path,
            debounce,
        })
    }

    /// Re-read the file and publish it if it differs from the current value.
    ///
    /// Returns `true` when a new configuration was published.
    pub async fn reload(&self) -> bool {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "config file not readable");
                return false;
            }
        };
        match BotConfig::parse(&contents) {
            Ok(config) => {
                if *self.handle.current() == config {
                    return false;
                }
                self.handle.replace(config);
                info!(path = %self.path.display(), "configuration reloaded");
                true
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "changed config failed to parse, keeping previous values"
                );
                false
            }
        }
    }

    /// Whether `event` touches the configuration file.
    fn concerns(&self, event: &Event) -> bool {
        let Some(name) = self.path.file_name() else {
            return false;
        };
        (event.kind.is_modify() || event.kind.is_create())
            && event.paths.iter().any(|p| p.file_name() == Some(name))
    }

    /// Register for notifications on the file's directory.
    fn watch(&self) -> Result<(RecommendedWatcher, mpsc::UnboundedReceiver<Event>), ConfigError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!(error = %e, "config watch error"),
        })?;
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        Ok((watcher, rx))
    }

    /// Reload on every change until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let (_watcher, mut events) = match self.watch() {
            Ok(watching) => watching,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "config hot reload unavailable");
                return;
            }
        };
        debug!(path = %self.path.display(), "watching config file");
        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => break,
                event = events.recv() => event,
            };
            let Some(event) = event else {
                break;
            };
            if !self.concerns(&event) {
                continue;
            }
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.debounce) => {}
            }
            while events.try_recv().is_ok() {}
            self.reload().await;
        }
        debug!("config watcher stopped");
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_mc_host() -> String {
    "localhost".to_owned()
}

const fn default_mc_port() -> u16 {
    25565
}

fn default_username() -> String {
    "AI".to_owned()
}

fn default_version() -> String {
    "1.21.1".to_owned()
}

fn default_auth() -> String {
    "offline".to_owned()
}

const fn default_view_distance() -> u8 {
    8
}

const fn default_chat_length_limit() -> usize {
    100
}

const fn default_reconnect_delay_ms() -> u64 {
    5000
}

const fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_server_host() -> String {
    "localhost".to_owned()
}

const fn default_server_port() -> u16 {
    3002
}

const fn default_refresh_interval_ms() -> u64 {
    1000
}

const fn default_block_radius() -> i32 {
    5
}

const fn default_max_blocks() -> usize {
    20
}

const fn default_entity_radius() -> f64 {
    16.0
}

const fn default_chat_capacity() -> usize {
    50
}

const fn default_move_threshold() -> f64 {
    1.0
}

const fn default_trimmed_inventory() -> usize {
    10
}

const fn default_area_size() -> i32 {
    16
}

const fn default_action_timeout_ms() -> u64 {
    60_000
}

const fn default_move_timeout_floor_ms() -> u64 {
    20_000
}

const fn default_move_timeout_per_block_ms() -> u64 {
    500
}

const fn default_move_timeout_base_ms() -> u64 {
    10_000
}

const fn default_search_radius() -> f64 {
    32.0
}

const fn default_move_goal_radius() -> f64 {
    1.0
}

const fn default_reach_distance() -> f64 {
    3.0
}

const fn default_attack_goal_radius() -> f64 {
    2.0
}

const fn default_melee_range() -> f64 {
    3.0
}

const fn default_attack_poll_interval_ms() -> u64 {
    1000
}

fn default_knowledge_path() -> PathBuf {
    PathBuf::from("knowledge.json")
}

const fn default_seed() -> u64 {
    42
}

const fn default_extent() -> i32 {
    64
}

const fn default_step_delay_ms() -> u64 {
    50
}

const fn default_trees() -> u32 {
    12
}

const fn default_mobs() -> u32 {
    4
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_reload_debounce_ms() -> u64 {
    200
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("blockbot-{}-{name}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn default_config_is_valid() {
        let config = BotConfig::default();
        assert_eq!(config.connection.reconnect_delay_ms, 5000);
        assert_eq!(config.connection.chat_length_limit, 100);
        assert_eq!(config.snapshot.block_radius, 5);
        assert_eq!(config.snapshot.max_blocks, 20);
        assert_eq!(config.snapshot.chat_capacity, 50);
        assert_eq!(config.dispatch.busy_policy, BusyPolicy::Reject);
        assert_eq!(config.dispatch.action_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "dispatch:\n  busy_policy: queue\n  action_timeout_ms: 5000\n";
        let config = BotConfig::parse(yaml);
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.dispatch.busy_policy, BusyPolicy::Queue);
        assert_eq!(config.dispatch.action_timeout_ms, 5000);
        // Everything else uses defaults
        assert_eq!(config.dispatch.move_timeout_floor_ms, 20_000);
        assert!((config.snapshot.entity_radius - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn parse_empty_yaml() {
        let config = BotConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn parse_rejects_malformed_yaml() {
        let config = BotConfig::parse("dispatch: [unclosed");
        assert!(matches!(config, Err(ConfigError::Yaml { .. })));
    }

    #[test]
    fn move_timeout_has_a_floor() {
        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.move_timeout(0.0), Duration::from_secs(20));
        assert_eq!(dispatch.move_timeout(10.0), Duration::from_secs(20));
        assert_eq!(dispatch.move_timeout(f64::NAN), Duration::from_secs(20));
    }

    #[test]
    fn move_timeout_scales_with_distance() {
        let dispatch = DispatchConfig::default();
        // 100 blocks * 500 ms + 10 s = 60 s
        assert_eq!(dispatch.move_timeout(100.0), Duration::from_secs(60));
    }

    #[test]
    fn yaml_roundtrip_preserves_values() {
        let mut config = BotConfig::default();
        config.connection.username = "digger".to_owned();
        config.dispatch.busy_policy = BusyPolicy::Queue;
        let yaml = config.to_yaml().unwrap_or_default();
        let parsed: Result<BotConfig, _> = serde_yml::from_str(&yaml);
        assert_eq!(parsed.ok(), Some(config));
    }

    #[test]
    fn handle_publishes_replacements() {
        let handle = ConfigHandle::new(BotConfig::default(), None);
        let mut rx = handle.subscribe();
        let mut next = BotConfig::default();
        next.snapshot.max_blocks = 3;
        handle.replace(next);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(handle.current().snapshot.max_blocks, 3);
    }

    #[tokio::test]
    async fn reload_publishes_changes_and_keeps_value_on_parse_error() {
        let path = temp_path("config.yaml");
        let written = tokio::fs::write(&path, "snapshot:\n  max_blocks: 7\n").await;
        assert!(written.is_ok());

        let initial = BotConfig::from_file(&path).unwrap_or_default();
        let handle = ConfigHandle::new(initial, Some(path.clone()));
        let watcher = ConfigWatcher::new(handle.clone(), Duration::from_millis(10));
        assert!(watcher.is_some());
        let Some(watcher) = watcher else { return };

        // Unchanged file: nothing to do.
        assert!(!watcher.reload().await);

        let _ = tokio::fs::write(&path, "snapshot:\n  max_blocks: 9\n").await;
        assert!(watcher.reload().await);
        assert_eq!(handle.current().snapshot.max_blocks, 9);

        let _ = tokio::fs::write(&path, "snapshot: [broken").await;
        assert!(!watcher.reload().await);
        assert_eq!(handle.current().snapshot.max_blocks, 9);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn watcher_follows_file_notifications() {
        let path = temp_path("watched.yaml");
        let _ = tokio::fs::write(&path, "snapshot:\n  max_blocks: 7\n").await;
        let initial = BotConfig::from_file(&path).unwrap_or_default();
        let handle = ConfigHandle::new(initial, Some(path.clone()));
        let watcher = ConfigWatcher::new(handle.clone(), Duration::from_millis(20));
        assert!(watcher.is_some());
        let Some(watcher) = watcher else { return };
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(watcher.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(200)).await;

        let mut changes = handle.subscribe();
        let _ = tokio::fs::write(&path, "snapshot:\n  max_blocks: 11\n").await;
        let changed = tokio::time::timeout(Duration::from_secs(5), changes.changed()).await;
        assert!(matches!(changed, Ok(Ok(()))));
        assert_eq!(handle.current().snapshot.max_blocks, 11);

        // Other files in the directory are ignored.
        let neighbour = temp_path("other.yaml");
        let _ = tokio::fs::write(&neighbour, "snapshot:\n  max_blocks: 2\n").await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(handle.current().snapshot.max_blocks, 11);

        shutdown.cancel();
        assert!(task.await.is_ok());
        let _ = tokio::fs::remove_file(&path).await;
        let _ = tokio::fs::remove_file(&neighbour).await;
    }

    #[tokio::test]
    async fn update_persists_to_backing_file() {
        let path = temp_path("saved.yaml");
        let handle = ConfigHandle::new(BotConfig::default(), Some(path.clone()));
        let mut next = BotConfig::default();
        next.server.port = 4100;
        let saved = handle.update(next).await;
        assert!(saved.is_ok());

        let reloaded = BotConfig::from_file(&path);
        assert!(reloaded.is_ok());
        // CONTROL_PORT may be set in the environment; compare the raw file.
        let raw = std::fs::read_to_string(&path).unwrap_or_default();
        assert!(raw.contains("4100"));
        assert_eq!(handle.current().server.port, 4100);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
