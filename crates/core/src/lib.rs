//! Core domain types and shared logic for the blob indexer.
//!
//! This crate defines the data model used across all other crates:
//! - Object locations and the identity rules for managed bucket keys
//! - Index service and storage configuration
//! - Single-pass multi-algorithm content digests

pub mod config;
pub mod error;
pub mod hash;
pub mod object;

pub use config::{AppConfig, IndexServiceConfig, RetryConfig, StorageConfig};
pub use error::{Error, Result};
pub use hash::{DigestSet, Hashes, MultiHasher, digest_stream};
pub use object::{ObjectReference, identity_from_key};

/// Default number of failed network attempts allowed per reconciliation.
pub const MAX_RETRIES: u32 = 10;
