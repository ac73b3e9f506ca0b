//! Guard decisions and completion request composition.
//!
//! `Composer::compose` decides whether a parsed message short-circuits
//! (silent drop, canned sentinel reply, "too long" notice) and otherwise picks
//! the model and lays out the message list.

use tracing::debug;

use cqrelay_core::config::AgentConfig;
use cqrelay_core::types::{ParsedMessage, UserId};

use crate::history::HistoryEntry;
use crate::provider::{ChatRequest, ContentBlock, Message, MessageContent, Role};
use crate::tokens::estimate_tokens;

/// Which model tier a composed request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Default model, full history.
    Text,
    /// Upgraded model selected by the escalation prefix, full history.
    Escalated,
    /// Vision model with image blocks and no history.
    Vision,
}

/// A request ready to be sent to the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedRequest {
    pub kind: RequestKind,
    pub request: ChatRequest,
    /// Text recorded as the user entry once the exchange succeeds.
    pub user_text: String,
    /// Sent to the user before the completion call starts.
    pub notice: Option<String>,
}

/// Outcome of the guard checks plus composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Composition {
    /// Nothing to answer: no text, no images.
    Silent,
    /// Fixed reply, no completion call.
    CannedReply(String),
    /// Input estimated above the token ceiling.
    Rejected { notice: String, estimated: f64 },
    Request(ComposedRequest),
}

pub struct Composer {
    config: AgentConfig,
}

impl Composer {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn compose(
        &self,
        user_id: &UserId,
        msg: &ParsedMessage,
        history: &[HistoryEntry],
    ) -> Composition {
        let text = msg.text.trim();

        if !msg.has_images() && text.is_empty() {
            return Composition::Silent;
        }

        // A bare escalation prefix leaves nothing to ask.
        if !msg.has_images() && self.strip_escalation(text) == Some("") {
            debug!(user = %user_id, "escalation prefix without a question");
            return Composition::Silent;
        }

        if !msg.has_images() && text == self.config.sentinel_phrase {
            return Composition::CannedReply(self.config.sentinel_reply.clone());
        }

        let estimated = estimate_tokens(text);
        if estimated > self.config.max_input_tokens {
            debug!(user = %user_id, estimated, "message exceeds token ceiling");
            return Composition::Rejected {
                notice: self.config.too_long_notice.clone(),
                estimated,
            };
        }

        let composed = if msg.has_images() {
            self.vision_request(text, &msg.image_urls)
        } else {
            self.text_request(text, history)
        };
        debug!(
            user = %user_id,
            kind = ?composed.kind,
            model = %composed.request.model,
            messages = composed.request.messages.len(),
            "request composed"
        );
        Composition::Request(composed)
    }

    /// Images always go to the vision model as one stateless user message.
    fn vision_request(&self, text: &str, image_urls: &[String]) -> ComposedRequest {
        let prompt = if text.is_empty() {
            self.config.default_image_prompt.clone()
        } else {
            text.to_string()
        };

        let mut blocks = Vec::with_capacity(image_urls.len() + 1);
        blocks.push(ContentBlock::text(prompt.clone()));
        blocks.extend(image_urls.iter().map(|url| ContentBlock::image(url.clone())));

        ComposedRequest {
            kind: RequestKind::Vision,
            request: ChatRequest {
                model: self.config.vision_model.clone(),
                messages: vec![Message {
                    role: Role::User,
                    content: MessageContent::Blocks(blocks),
                }],
            },
            user_text: prompt,
            notice: Some(self.config.vision_notice.clone()),
        }
    }

    /// The trimmed remainder after the escalation prefix, if `text` starts with it.
    fn strip_escalation<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.config.escalation_prefix.is_empty() {
            return None;
        }
        text.strip_prefix(&self.config.escalation_prefix).map(str::trim)
    }

    fn text_request(&self, text: &str, history: &[HistoryEntry]) -> ComposedRequest {
        let (kind, model, content, notice) = match self.strip_escalation(text) {
            Some(rest) => (
                RequestKind::Escalated,
                self.config.upgraded_model.clone(),
                rest.to_string(),
                Some(self.config.escalation_notice.clone()),
            ),
            None => (
                RequestKind::Text,
                self.config.default_model.clone(),
                text.to_string(),
                None,
            ),
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = self.config.system_prompt.as_deref() {
            messages.push(Message::text(Role::System, system));
        }
        messages.extend(history.iter().map(HistoryEntry::to_message));
        messages.push(Message::text(Role::User, content.clone()));

        ComposedRequest {
            kind,
            request: ChatRequest { model, messages },
            user_text: content,
            notice,
        }
    }
}
