//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration of the indexer binary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub index: IndexServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Validate every section, prefixing errors with the section name.
    pub fn validate(&self) -> Result<(), String> {
        self.index.validate().map_err(|e| format!("index: {e}"))?;
        self.storage.validate().map_err(|e| format!("storage: {e}"))
    }
}

/// Index service connection parameters and reconciliation behavior flags.
///
/// Built once from external configuration before any reconciliation and
/// never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexServiceConfig {
    /// Base URL of the index service (e.g., "https://data.example.org/index").
    pub url: String,
    /// Basic-auth username for mutating calls.
    #[serde(default)]
    pub username: Option<String>,
    /// Basic-auth password.
    /// WARNING: Prefer INDEXER_INDEX__PASSWORD over storing it in a file.
    #[serde(default)]
    pub password: Option<String>,
    /// The bucket does not embed record identities in its keys; records are
    /// discovered by URL or created blank.
    #[serde(default)]
    pub extramural_bucket: bool,
    /// Literal uploader for newly created records. Highest priority.
    #[serde(default)]
    pub extramural_uploader: Option<String>,
    /// Use the bucket owner as uploader.
    #[serde(default)]
    pub extramural_uploader_s3owner: bool,
    /// Key of a two-column CSV (object key, uploader) in the object's bucket.
    #[serde(default)]
    pub extramural_uploader_manifest: Option<String>,
    /// Skip objects that already have a matching record (first-ever ingest).
    #[serde(default)]
    pub extramural_initial_mode: bool,
    /// Skip the existence search and always create a new record.
    #[serde(default)]
    pub extramural_fast_mode: bool,
    /// Disable TLS certificate validation for this client only.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Retry budget shared by all network calls of one reconciliation.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl IndexServiceConfig {
    /// Minimal configuration pointing at `url` with every flag off.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            extramural_bucket: false,
            extramural_uploader: None,
            extramural_uploader_s3owner: false,
            extramural_uploader_manifest: None,
            extramural_initial_mode: false,
            extramural_fast_mode: false,
            accept_invalid_certs: false,
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Credentials, when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Some((user, pass)),
            _ => None,
        }
    }

    /// Validate index service configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        let url = url::Url::parse(&self.url)
            .map_err(|e| format!("index url '{}' is invalid: {e}", self.url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "index url '{}' must use http or https",
                self.url
            ));
        }
        if self.username.is_some() ^ self.password.is_some() {
            return Err(
                "index config requires both username and password when either is set".to_string(),
            );
        }
        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        self.retry.validate()
    }
}

/// Fixed-delay retry policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Failed network attempts allowed per reconciliation.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    crate::MAX_RETRIES
}

fn default_delay_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Blob store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local directory where each sub-directory is a bucket.
    Filesystem {
        /// Root directory holding the buckets.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::S3 {
            endpoint: None,
            region: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}
