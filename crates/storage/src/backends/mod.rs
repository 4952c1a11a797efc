//! Blob store backend implementations.

pub mod filesystem;
pub mod s3;
