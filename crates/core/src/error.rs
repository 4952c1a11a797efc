//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
///
/// Every variant is a configuration-class failure: retrying the same input
/// cannot make it succeed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid object url: {0}")]
    InvalidObjectUrl(String),

    #[error(
        "unrecognized key layout for {key}: expected <id>/<file> or <guid>/<id>/<file>, got {segments} segments (is this an extramural bucket?)"
    )]
    UnrecognizedKeyLayout { key: String, segments: usize },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
