//! Error types for the live-update client

use std::time::Duration;

/// Result type for live-update and API operations
pub type LiveResult<T> = Result<T, LiveError>;

/// Errors that can occur while talking to a seeBeads server
#[derive(Debug, thiserror::Error)]
pub enum LiveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event stream rejected with HTTP {0}")]
    Status(u16),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("no data on event stream for {0:?}")]
    IdleTimeout(Duration),

    #[error("event stream ended")]
    StreamEnded,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("client has been stopped")]
    Stopped,
}

impl LiveError {
    /// Whether the reconnect loop should retry after this error.
    ///
    /// Everything the transport can produce is retryable; only local
    /// misconfiguration and a deliberate stop are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LiveError::InvalidConfig(_) | LiveError::InvalidUrl(_) | LiveError::Stopped
        )
    }
}
