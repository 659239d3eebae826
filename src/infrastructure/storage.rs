use async_trait::async_trait;
use bytes::Bytes;

use crate::entities::storage_link::StorageLink;
use crate::errors::StorageError;

pub mod s3;

/// Named byte blobs in named buckets.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `data` under `bucket/key`, creating the bucket first if it does
    /// not exist. Overwrites are last-write-wins.
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<StorageLink, StorageError>;

    /// Fetches `bucket/key`, failing with `StorageError::NotFound` when absent.
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError>;

    async fn get_link(&self, link: &StorageLink) -> Result<Bytes, StorageError> {
        self.get(&link.bucket, &link.key).await
    }
}

/// MIME type guessed from the leading bytes of a blob.
pub fn content_type_of(data: &[u8]) -> &'static str {
    infer::get(data)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream")
}
