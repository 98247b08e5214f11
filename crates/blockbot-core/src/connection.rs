//! The live avatar connection and its loaded capabilities.
//!
//! An [`AvatarConnection`] is built once per successful connect and never
//! mutated afterwards. A reconnect produces a new one.

use std::sync::Arc;

use blockbot_types::{CapabilityKind, SessionId};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::session::{
    AvatarSession, BlockCollector, CapabilityError, FrameRenderer, MovementPlanner, ToolSelector,
};

/// Handle to the live avatar session.
pub struct AvatarConnection {
    session_id: SessionId,
    connected_at: DateTime<Utc>,
    session: Arc<dyn AvatarSession>,
    movement: Option<Arc<dyn MovementPlanner>>,
    collector: Option<Arc<dyn BlockCollector>>,
    tools: Option<Arc<dyn ToolSelector>>,
    renderer: Option<Arc<dyn FrameRenderer>>,
}

impl core::fmt::Debug for AvatarConnection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AvatarConnection")
            .field("session_id", &self.session_id)
            .field("username", &self.session.username())
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

impl AvatarConnection {
    /// Finish setting up a freshly opened session.
    ///
    /// Applies the view distance, then loads each capability in
    /// [`CapabilityKind::LOAD_ORDER`]. A capability that fails to load is
    /// logged and left unavailable; the connection is still usable.
    pub async fn establish(session: Arc<dyn AvatarSession>, view_distance: u8) -> Self {
        let session_id = SessionId::new();

        if let Err(e) = session.set_view_distance(view_distance).await {
            warn!(%session_id, error = %e, "failed to apply view distance");
        }

        let mut connection = Self {
            session_id,
            connected_at: Utc::now(),
            session,
            movement: None,
            collector: None,
            tools: None,
            renderer: None,
        };

        for capability in CapabilityKind::LOAD_ORDER {
            let loaded = connection.load(capability).await;
            match loaded {
                Ok(()) => info!(%session_id, %capability, "capability loaded"),
                Err(e) => warn!(%session_id, %capability, error = %e, "capability unavailable"),
            }
        }

        connection
    }

    async fn load(&mut self, capability: CapabilityKind) -> Result<(), CapabilityError> {
        match capability {
            CapabilityKind::Movement => {
                self.movement = Some(self.session.load_movement().await?);
            }
            CapabilityKind::Collection => {
                self.collector = Some(self.session.load_collector().await?);
            }
            CapabilityKind::ToolSelection => {
                self.tools = Some(self.session.load_tool_selector().await?);
            }
            CapabilityKind::Rendering => {
                self.renderer = Some(self.session.load_renderer().await?);
            }
        }
        Ok(())
    }

    /// Identity of this connection.
    pub const fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// When the connection was established.
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// The avatar's username.
    pub fn username(&self) -> &str {
        self.session.username()
    }

    /// The protocol version in use.
    pub fn version(&self) -> &str {
        self.session.version()
    }

    /// The underlying session.
    pub fn session(&self) -> &dyn AvatarSession {
        self.session.as_ref()
    }

    /// Whether the avatar has materialized in the world.
    pub fn is_spawned(&self) -> bool {
        self.session.status().is_some()
    }

    /// Capabilities that loaded, in load order.
    pub fn capabilities(&self) -> Vec<CapabilityKind> {
        CapabilityKind::LOAD_ORDER
            .into_iter()
            .filter(|c| self.has(*c))
            .collect()
    }

    /// Whether `capability` loaded.
    pub const fn has(&self, capability: CapabilityKind) -> bool {
        match capability {
            CapabilityKind::Movement => self.movement.is_some(),
            CapabilityKind::Collection => self.collector.is_some(),
            CapabilityKind::ToolSelection => self.tools.is_some(),
            CapabilityKind::Rendering => self.renderer.is_some(),
        }
    }

    /// The movement planner.
    pub fn movement(&self) -> Result<&dyn MovementPlanner, CapabilityError> {
        self.movement.as_deref().ok_or(CapabilityError::Unavailable {
            capability: CapabilityKind::Movement,
        })
    }

    /// The block collection helper.
    pub fn collector(&self) -> Result<&dyn BlockCollector, CapabilityError> {
        self.collector.as_deref().ok_or(CapabilityError::Unavailable {
            capability: CapabilityKind::Collection,
        })
    }

    /// The tool selection helper.
    pub fn tools(&self) -> Result<&dyn ToolSelector, CapabilityError> {
        self.tools.as_deref().ok_or(CapabilityError::Unavailable {
            capability: CapabilityKind::ToolSelection,
        })
    }

    /// The frame renderer.
    pub fn renderer(&self) -> Result<&dyn FrameRenderer, CapabilityError> {
        self.renderer.as_deref().ok_or(CapabilityError::Unavailable {
            capability: CapabilityKind::Rendering,
        })
    }
}
