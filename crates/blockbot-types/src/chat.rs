//! Chat history records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::ChatOrigin;
use crate::ids::MessageId;

/// One chat line seen or sent by the avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChatRecord {
    /// Assigned when the record enters the history.
    pub id: MessageId,
    /// Who produced the line.
    pub origin: ChatOrigin,
    /// Username of the sender (the avatar's own name for `bot` records).
    pub sender: String,
    /// Message text.
    pub message: String,
    /// When the record entered the history.
    pub timestamp: DateTime<Utc>,
}

impl ChatRecord {
    /// Create a record stamped with a fresh ID and the current time.
    pub fn new(origin: ChatOrigin, sender: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            origin,
            sender: sender.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
