//! Private-message pipeline shared by every inbound transport.
//!
//! `process_private_message` runs one full turn:
//! local command → guard/compose → interim notice → completion →
//! record exchange → deliver reply.
//!
//! The caller only parses the inbound event and logs the outcome.

use tracing::{debug, info, warn};

use cqrelay_core::types::{ParsedMessage, UserId};

use crate::compose::Composition;
use crate::history::HistoryEntry;
use crate::provider::ProviderError;

use super::context::MessageContext;
use super::slash::handle_slash_command;

/// How a pipeline turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Nothing to answer; no reply was sent.
    Ignored,
    /// A local command was handled.
    Command,
    /// The sentinel phrase was answered with the canned reply.
    CannedReply,
    /// Input was over the token ceiling; the "too long" notice was sent.
    Rejected { estimated: f64 },
    /// The completion service reported an error, relayed verbatim.
    UpstreamError { message: String },
    /// The completion service answered with no choices; nothing recorded.
    Empty,
    /// A reply was recorded and delivered.
    Replied {
        model: String,
        tokens_in: u32,
        tokens_out: u32,
    },
}

/// Run the pipeline for one private message.
///
/// Transport failures talking to the completion service (network, JSON,
/// timeout) are returned as `Err`; the user gets no reply. Delivery
/// failures are logged and never retried.
pub async fn process_private_message<C: MessageContext + ?Sized>(
    ctx: &C,
    user_id: &UserId,
    msg: &ParsedMessage,
) -> Result<Outcome, ProviderError> {
    if let Some(reply) = handle_slash_command(ctx, user_id, msg) {
        deliver(ctx, user_id, &reply).await;
        return Ok(Outcome::Command);
    }

    let history = ctx.history().get_history(user_id);
    let composed = match ctx.agent().composer().compose(user_id, msg, &history) {
        Composition::Silent => {
            debug!(user = %user_id, "empty message, ignoring");
            return Ok(Outcome::Ignored);
        }
        Composition::CannedReply(reply) => {
            deliver(ctx, user_id, &reply).await;
            return Ok(Outcome::CannedReply);
        }
        Composition::Rejected { notice, estimated } => {
            info!(user = %user_id, estimated, "message rejected as too long");
            deliver(ctx, user_id, &notice).await;
            return Ok(Outcome::Rejected { estimated });
        }
        Composition::Request(composed) => composed,
    };

    if let Some(notice) = &composed.notice {
        deliver(ctx, user_id, notice).await;
    }

    let resp = ctx.agent().complete(&composed.request).await?;

    if let Some(message) = resp.error_message() {
        warn!(user = %user_id, error = %message, "completion service returned an error");
        deliver(ctx, user_id, message).await;
        return Ok(Outcome::UpstreamError {
            message: message.to_string(),
        });
    }

    let Some(content) = resp.primary_content() else {
        warn!(user = %user_id, model = %resp.model, "completion returned no choices");
        return Ok(Outcome::Empty);
    };

    ctx.history().append_exchange(
        user_id,
        HistoryEntry::user(composed.user_text, resp.usage.prompt_tokens),
        HistoryEntry::assistant(content, resp.usage.completion_tokens),
    );

    info!(
        user = %user_id,
        kind = ?composed.kind,
        model = %resp.model,
        tokens_in = resp.usage.prompt_tokens,
        tokens_out = resp.usage.completion_tokens,
        "pipeline: chat complete"
    );

    deliver(ctx, user_id, content).await;

    Ok(Outcome::Replied {
        model: resp.model.clone(),
        tokens_in: resp.usage.prompt_tokens,
        tokens_out: resp.usage.completion_tokens,
    })
}

/// Send `text` to the user within the call timeout. Failures are logged only.
async fn deliver<C: MessageContext + ?Sized>(ctx: &C, user_id: &UserId, text: &str) {
    let timeout = ctx.agent().call_timeout();
    match tokio::time::timeout(timeout, ctx.send_private(user_id, text)).await {
        Ok(Ok(())) => debug!(user = %user_id, chars = text.chars().count(), "reply delivered"),
        Ok(Err(e)) => warn!(user = %user_id, error = %e, "failed to deliver private message"),
        Err(_) => warn!(
            user = %user_id,
            timeout_ms = timeout.as_millis() as u64,
            "delivery timed out"
        ),
    }
}
