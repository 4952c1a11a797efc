//! Reconciliation error types.

use indexer_client::ClientError;
use indexer_storage::StorageError;
use thiserror::Error;

/// Terminal failure of one object's reconciliation.
///
/// Transient conditions never appear here unless the retry budget ran out.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Config(#[from] indexer_core::Error),

    #[error("index service error: {0}")]
    Index(ClientError),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error(
        "retry budget exhausted after {attempts} attempts (did: {}, rev: {}): {detail}",
        .did.as_deref().unwrap_or("-"),
        .rev.as_deref().unwrap_or("-")
    )]
    RetryExhausted {
        did: Option<String>,
        rev: Option<String>,
        attempts: u32,
        detail: String,
    },
}

impl ReconcileError {
    /// The failure points at configuration or input, not at the object or
    /// the services being reachable.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReconcileError::Config(_)
                | ReconcileError::Index(ClientError::InvalidUrl(_))
                | ReconcileError::Storage(
                    StorageError::Config(_)
                        | StorageError::InvalidKey(_)
                        | StorageError::Unsupported { .. }
                )
        )
    }
}

/// Result type for reconciliation.
pub type ReconcileResult<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_exhausted_reports_identity() {
        let err = ReconcileError::RetryExhausted {
            did: Some("dg.4503/abc".to_string()),
            rev: Some("r1".to_string()),
            attempts: 10,
            detail: "update rejected with 503".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("10 attempts"));
        assert!(msg.contains("dg.4503/abc"));
        assert!(msg.contains("r1"));
        assert!(msg.contains("503"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn test_missing_identity_renders_placeholder() {
        let err = ReconcileError::RetryExhausted {
            did: None,
            rev: None,
            attempts: 3,
            detail: "search failed".to_string(),
        };
        assert!(err.to_string().contains("did: -, rev: -"));
    }

    #[test]
    fn test_configuration_errors_are_narrow() {
        let configuration = [
            ReconcileError::Config(indexer_core::Error::InvalidObjectUrl("x".to_string())),
            ReconcileError::Index(ClientError::InvalidUrl("no base".to_string())),
            ReconcileError::Storage(StorageError::Config("no region".to_string())),
            ReconcileError::Storage(StorageError::InvalidKey("../x".to_string())),
            ReconcileError::Storage(StorageError::Unsupported {
                backend: "filesystem",
                operation: "bucket owner",
            }),
        ];
        for err in &configuration {
            assert!(err.is_configuration(), "{err:?}");
        }

        let runtime = [
            ReconcileError::Storage(StorageError::NotFound("bucket/abc/x.bam".to_string())),
            ReconcileError::Index(ClientError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
            ReconcileError::Index(ClientError::Decode("eof".to_string())),
        ];
        for err in &runtime {
            assert!(!err.is_configuration(), "{err:?}");
        }
    }
}
