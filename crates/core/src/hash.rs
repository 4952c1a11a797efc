//! Single-pass content digests.
//!
//! An object is read exactly once; every chunk is fed to all hashers so the
//! byte count and each digest describe the identical byte stream.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

/// Hex-encoded digests of one object, in the shape the index service stores.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashes {
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
    pub sha512: String,
    /// CRC-32 (IEEE) as 8 lowercase hex digits.
    pub crc: String,
}

/// Byte count plus every supported digest, computed from one forward read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DigestSet {
    pub size: u64,
    pub hashes: Hashes,
}

impl DigestSet {
    /// Compute the digest set of an in-memory buffer.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = MultiHasher::new();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Incremental hasher driving every algorithm at once.
pub struct MultiHasher {
    size: u64,
    md5: Md5,
    sha1: Sha1,
    sha256: Sha256,
    sha512: Sha512,
    crc: crc32fast::Hasher,
}

impl MultiHasher {
    pub fn new() -> Self {
        Self {
            size: 0,
            md5: Md5::new(),
            sha1: Sha1::new(),
            sha256: Sha256::new(),
            sha512: Sha512::new(),
            crc: crc32fast::Hasher::new(),
        }
    }

    /// Update every hasher with the same chunk.
    pub fn update(&mut self, data: &[u8]) {
        self.size += data.len() as u64;
        self.md5.update(data);
        self.sha1.update(data);
        self.sha256.update(data);
        self.sha512.update(data);
        self.crc.update(data);
    }

    /// Bytes consumed so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn finalize(self) -> DigestSet {
        DigestSet {
            size: self.size,
            hashes: Hashes {
                md5: hex::encode(self.md5.finalize()),
                sha1: hex::encode(self.sha1.finalize()),
                sha256: hex::encode(self.sha256.finalize()),
                sha512: hex::encode(self.sha512.finalize()),
                crc: format!("{:08x}", self.crc.finalize()),
            },
        }
    }
}

impl Default for MultiHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MultiHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiHasher")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Consume a byte stream once and return its digest set.
///
/// The first stream error aborts the computation; no partial digest set is
/// ever produced.
pub async fn digest_stream<S, E>(mut stream: S) -> std::result::Result<DigestSet, E>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
{
    let mut hasher = MultiHasher::new();
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    Ok(hasher.finalize())
}
