use serde::{Deserialize, Serialize};
use std::fmt;

/// QQ account number of a private-chat peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Structured content extracted from a CQ-annotated chat message.
///
/// Produced once per inbound event; never modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// Message text with every CQ code removed, trimmed.
    pub text: String,
    /// `url=` of each `[CQ:image]` code, in document order.
    pub image_urls: Vec<String>,
    /// `qq=` of each `[CQ:at]` code, in document order.
    pub mentioned_users: Vec<String>,
    /// `id=` of the first `[CQ:reply]` code.
    pub reply_to: Option<String>,
}

impl ParsedMessage {
    /// Plain text message with no structured content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn has_images(&self) -> bool {
        !self.image_urls.is_empty()
    }
}

impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Text: {:?}, ImageURLs: [{}], AtUsers: [{}], ReplyTo: {:?}",
            self.text,
            self.image_urls.join(", "),
            self.mentioned_users.join(", "),
            self.reply_to.as_deref().unwrap_or(""),
        )
    }
}
