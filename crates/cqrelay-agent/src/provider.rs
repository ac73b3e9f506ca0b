use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Speaker of a message in a completion request or in stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Message body: plain text, or a list of content blocks for vision requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single multimodal content block (OpenAI chat completions layout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentBlock::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

/// A single message in a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Completion request. Built fresh per inbound message, never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Completion response as reported by the service.
///
/// A populated `error` is a normal outcome (quota exhausted, bad model, ...)
/// that gets relayed to the user, not a transport failure.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
    pub error: Option<ApiError>,
}

impl ChatResponse {
    /// Content of the first choice, if the service returned any.
    pub fn primary_content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.content.as_str())
    }

    /// Error message to relay, if the service reported a non-empty one.
    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_ref()
            .map(|e| e.message.as_str())
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Choice {
    pub content: String,
    pub finish_reason: Option<String>,
}

/// Token usage reported by the completion service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Error descriptor embedded in a completion response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
    pub kind: Option<String>,
    pub code: Option<String>,
}

/// Common interface for completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a non-streaming completion request, wait for the full response.
    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}
