//! Local commands, intercepted before the guard checks.

use tracing::info;

use cqrelay_core::types::{ParsedMessage, UserId};

use super::context::MessageContext;

pub const CLEAR_REPLY: &str = "对话已清空。";

/// Handle local commands before composing a completion request.
///
/// Returns `Some(reply)` if the message was a recognized command,
/// `None` if it should continue through the pipeline.
///
/// Recognized commands:
///   `/clear`  drop this user's conversation history
pub fn handle_slash_command<C: MessageContext + ?Sized>(
    ctx: &C,
    user_id: &UserId,
    msg: &ParsedMessage,
) -> Option<String> {
    if msg.has_images() {
        return None;
    }

    let trimmed = msg.text.trim();
    if trimmed.eq_ignore_ascii_case("/clear") {
        let removed = ctx.history().clear(user_id);
        info!(user = %user_id, removed, "conversation history cleared");
        return Some(CLEAR_REPLY.to_string());
    }

    None
}
