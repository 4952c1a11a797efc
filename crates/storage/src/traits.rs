//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Read access to a multi-bucket blob store.
///
/// Only the capabilities the reconciler needs: object bytes (whole or
/// streamed) and the identity owning a bucket.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Get an object's content. Intended for small objects such as manifests.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes>;

    /// Get an object as a forward-only byte stream.
    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream>;

    /// Identity owning the bucket.
    async fn bucket_owner(&self, bucket: &str) -> StorageResult<String>;

    /// Static identifier for the backend type (e.g., "s3", "filesystem").
    /// Used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// The default implementation returns Ok(()), suitable for backends that
    /// don't require connectivity verification (e.g., local filesystem).
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
