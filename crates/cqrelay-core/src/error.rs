use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid OpenAI API key: {reason}")]
    InvalidApiKey { reason: String },
}

impl RelayError {
    /// Short error code string, used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::InvalidApiKey { .. } => "INVALID_API_KEY",
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
