use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use super::error::StorageError;
use super::hash::ContentHash;

/// One object as reported by a backing-store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub hash: ContentHash,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Stream of listed blobs, produced incrementally by the backend.
pub type BlobListing<'a> = BoxStream<'a, Result<BlobInfo, StorageError>>;

/// Content-addressed blob storage.
///
/// Blobs are keyed by the hash the caller supplies; the store trusts that the
/// hash is the digest of the bytes and never re-verifies it.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `hash`.
    ///
    /// Returns `true` if the blob was written, `false` if it already existed
    /// (in which case nothing is written).
    async fn put(&self, hash: &ContentHash, data: Bytes) -> Result<bool, StorageError>;

    /// Retrieve all bytes for a blob by its content hash.
    async fn get(&self, hash: &ContentHash) -> Result<Bytes, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// Delete a blob by its content hash.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError>;

    /// List every blob in the store without materializing the full listing.
    fn list(&self) -> BlobListing<'_>;

    /// Backing-store key for a hash.
    fn locator(&self, hash: &ContentHash) -> String {
        hash.locator()
    }
}
