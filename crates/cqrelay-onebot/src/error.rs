/// Errors produced by the OneBot messenger.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OneBot returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("OneBot rejected the message (retcode {retcode}): {message}")]
    Rejected { retcode: i64, message: String },
}
