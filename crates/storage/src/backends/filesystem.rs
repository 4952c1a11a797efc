//! Local filesystem blob store backend.
//!
//! Each immediate sub-directory of the root is a bucket; keys are relative
//! paths inside it.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobStore, ByteStream};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::instrument;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem blob store.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at an existing or new directory.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve `bucket/key` under the root, rejecting anything that could escape it.
    fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        for part in [bucket, key] {
            if part.is_empty() || part.starts_with('/') || part.starts_with('\\') {
                return Err(StorageError::InvalidKey(format!(
                    "path traversal not allowed: {bucket}/{key}"
                )));
            }
            if !Path::new(part)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {bucket}/{key}"
                )));
            }
        }
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(format!(
                "bucket name may not contain '/': {bucket}"
            )));
        }
        Ok(self.root.join(bucket).join(key))
    }

    fn map_open_error(err: std::io::Error, bucket: &str, key: &str) -> StorageError {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(format!("{bucket}/{key}"))
        } else {
            StorageError::Io(err)
        }
    }
}

#[async_trait]
impl BlobStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let path = self.object_path(bucket, key)?;
        let data = fs::read(&path)
            .await
            .map_err(|e| Self::map_open_error(e, bucket, key))?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ByteStream> {
        let path = self.object_path(bucket, key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| Self::map_open_error(e, bucket, key))?;

        let stream = ReaderStream::with_capacity(file, STREAM_CHUNK_SIZE)
            .map(|result| result.map_err(StorageError::Io));
        Ok(Box::pin(stream))
    }

    async fn bucket_owner(&self, _bucket: &str) -> StorageResult<String> {
        Err(StorageError::Unsupported {
            backend: "filesystem",
            operation: "bucket_owner",
        })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}
