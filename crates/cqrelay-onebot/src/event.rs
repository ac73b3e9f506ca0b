//! Inbound OneBot v11 event payloads.

use serde::Deserialize;
use uuid::Uuid;

use cqrelay_core::types::UserId;

/// Subset of a OneBot event the relay looks at. Every field is optional on
/// the wire; missing ones default to empty / zero.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundEvent {
    #[serde(default)]
    pub post_type: String,
    #[serde(default)]
    pub message_type: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub group_id: i64,
}

/// A private message accepted for processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateMessage {
    /// Correlates log lines for one message across the queue and workers.
    pub id: Uuid,
    pub user_id: UserId,
    pub raw: String,
}

impl InboundEvent {
    /// Keep only private messages with a sender and a body. Group messages,
    /// notices, heartbeats and everything else yield `None`.
    pub fn into_private(self) -> Option<PrivateMessage> {
        if self.message_type != "private" || self.user_id == 0 || self.message.is_empty() {
            return None;
        }
        Some(PrivateMessage {
            id: Uuid::new_v4(),
            user_id: UserId(self.user_id),
            raw: self.message,
        })
    }
}
