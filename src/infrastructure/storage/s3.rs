use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use dashmap::DashSet;
use tracing::{debug, info, instrument};

use crate::entities::storage_link::StorageLink;
use crate::errors::StorageError;
use crate::settings::AppConfig;

use super::{content_type_of, ObjectStorage};

/// S3/MinIO implementation of [`ObjectStorage`].
pub struct S3Storage {
    client: S3Client,
    known_buckets: DashSet<String>,
}

impl S3Storage {
    pub fn new(config: &AppConfig) -> Self {
        let credentials = Credentials::new(
            config.storage_access_key.clone(),
            config.storage_secret_key.clone(),
            None,
            None,
            "app-config",
        );

        // Path-style addressing is required by MinIO.
        let s3_config = S3ConfigBuilder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.storage_region.clone()))
            .endpoint_url(&config.storage_endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        info!(
            endpoint = %config.storage_endpoint,
            region = %config.storage_region,
            "S3 storage client initialized"
        );

        S3Storage {
            client: S3Client::from_conf(s3_config),
            known_buckets: DashSet::new(),
        }
    }

    /// Check-then-create. Two callers racing on a new bucket may both try to
    /// create it; the loser sees "already exists" and carries on.
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        if self.known_buckets.contains(bucket) {
            return Ok(());
        }

        if self.client.head_bucket().bucket(bucket).send().await.is_err() {
            match self.client.create_bucket().bucket(bucket).send().await {
                Ok(_) => info!(bucket, "Created bucket"),
                Err(err) => {
                    let already_exists = err
                        .as_service_error()
                        .map(|e| e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists())
                        .unwrap_or(false);
                    if !already_exists {
                        return Err(StorageError::Backend(format!(
                            "failed to create bucket {}: {}",
                            bucket,
                            DisplayErrorContext(&err)
                        )));
                    }
                    debug!(bucket, "Bucket already exists");
                }
            }
        }

        self.known_buckets.insert(bucket.to_string());
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    async fn put(&self, bucket: &str, key: &str, data: Bytes) -> Result<StorageLink, StorageError> {
        self.ensure_bucket(bucket).await?;

        let content_type = content_type_of(&data);

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|err| {
                StorageError::Backend(format!("failed to upload {}/{}: {}", bucket, key, DisplayErrorContext(&err)))
            })?;

        debug!("Object stored");
        Ok(StorageLink::new(bucket, key))
    }

    #[instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err
                    .as_service_error()
                    .map(|e| e.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::NotFound(format!("{}/{}", bucket, key))
                } else {
                    StorageError::Backend(format!("failed to fetch {}/{}: {}", bucket, key, DisplayErrorContext(&err)))
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("failed to read {}/{}: {}", bucket, key, e)))?
            .into_bytes();

        debug!(size_bytes = data.len(), "Object fetched");
        Ok(data)
    }
}
