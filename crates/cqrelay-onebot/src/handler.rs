//! Entry point for one accepted private message.

use tracing::{debug, info, warn, Instrument};

use cqrelay_agent::pipeline::{process_private_message, MessageContext, Outcome};

use crate::cq;
use crate::event::PrivateMessage;

/// Parse the CQ-annotated body and run the pipeline.
///
/// Runs inside a span carrying the message id and sender so every log line
/// of the turn correlates. Returns `None` when the completion call failed at
/// the transport level; the user gets no reply in that case.
pub async fn handle_private_message<C: MessageContext + ?Sized>(
    ctx: &C,
    msg: PrivateMessage,
) -> Option<Outcome> {
    let span = tracing::info_span!("private_message", id = %msg.id, user = %msg.user_id);

    async move {
        let parsed = cq::parse(&msg.raw);
        debug!(parsed = %parsed, "parsed inbound message");

        match process_private_message(ctx, &msg.user_id, &parsed).await {
            Ok(outcome) => {
                info!(outcome = ?outcome, "message handled");
                Some(outcome)
            }
            Err(e) => {
                warn!(error = %e, "completion call failed, no reply sent");
                None
            }
        }
    }
    .instrument(span)
    .await
}
