//! Index client error types.

use thiserror::Error;

/// Index service call errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("index service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid index response: {0}")]
    Decode(String),

    #[error("invalid index url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Whether repeating the call could succeed.
    ///
    /// URL construction failures come from configuration and never heal.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ClientError::InvalidUrl(_))
    }
}

/// Result type for index client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
