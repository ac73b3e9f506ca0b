//! Context interface required by the message pipeline.

use async_trait::async_trait;

use cqrelay_core::types::UserId;

use crate::history::ConversationStore;
use crate::runtime::AgentRuntime;

/// Implemented by `AppState` in `cqrelay-gateway`.
///
/// Defined here so the pipeline stays transport-agnostic: the OneBot crate
/// depends on `cqrelay-agent`, never the other way round.
#[async_trait]
pub trait MessageContext: Send + Sync {
    fn agent(&self) -> &AgentRuntime;
    fn history(&self) -> &ConversationStore;

    /// Deliver `text` to a private chat.
    ///
    /// Returns `Err` with a human-readable explanation on failure.
    async fn send_private(&self, user_id: &UserId, text: &str) -> Result<(), String>;
}
