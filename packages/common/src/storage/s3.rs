use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::warn;

use super::error::StorageError;
use super::hash::{ContentHash, OBJECTS_PREFIX};
use super::traits::{BlobInfo, BlobListing, BlobStore};
use crate::config::S3StorageConfig;

const LIST_PAGE_SIZE: usize = 1000;

/// S3-compatible content-addressed blob store (AWS S3, MinIO).
///
/// Objects live at the same key layout as the filesystem backend:
/// `objects/{first 2 hex chars}/{full 64 hex chars}`.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
}

impl S3BlobStore {
    pub fn new(config: &S3StorageConfig) -> Result<Self, StorageError> {
        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            config.access_key.as_deref(),
            config.secret_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if config.path_style {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

fn backend(e: s3::error::S3Error) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn check_status(status: u16, op: &str, key: &str) -> Result<(), StorageError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(StorageError::Backend(format!(
            "{op} {key} returned HTTP {status}"
        )))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, hash: &ContentHash, data: Bytes) -> Result<bool, StorageError> {
        if self.exists(hash).await? {
            return Ok(false);
        }

        let key = hash.locator();
        let response = self
            .bucket
            .put_object(&key, &data)
            .await
            .map_err(backend)?;
        check_status(response.status_code(), "PUT", &key)?;
        Ok(true)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Bytes, StorageError> {
        let key = hash.locator();
        let response = self.bucket.get_object(&key).await.map_err(backend)?;
        match response.status_code() {
            404 => Err(StorageError::NotFound(hash.to_hex())),
            status => {
                check_status(status, "GET", &key)?;
                Ok(response.bytes().clone())
            }
        }
    }

    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        let key = hash.locator();
        let (_, status) = self.bucket.head_object(&key).await.map_err(backend)?;
        match status {
            404 => Ok(false),
            status => {
                check_status(status, "HEAD", &key)?;
                Ok(true)
            }
        }
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        if !self.exists(hash).await? {
            return Ok(false);
        }

        let key = hash.locator();
        let response = self.bucket.delete_object(&key).await.map_err(backend)?;
        match response.status_code() {
            404 => Ok(false),
            status => {
                check_status(status, "DELETE", &key)?;
                Ok(true)
            }
        }
    }

    fn list(&self) -> BlobListing<'_> {
        let bucket = &self.bucket;
        let pages = futures::stream::try_unfold(
            (Some(None::<String>), bucket),
            |(token, bucket)| async move {
                let Some(token) = token else {
                    return Ok::<_, StorageError>(None);
                };

                let (page, status) = bucket
                    .list_page(
                        format!("{OBJECTS_PREFIX}/"),
                        None,
                        token,
                        None,
                        Some(LIST_PAGE_SIZE),
                    )
                    .await
                    .map_err(backend)?;
                check_status(status, "LIST", OBJECTS_PREFIX)?;

                let next = match (page.is_truncated, page.next_continuation_token) {
                    (true, Some(token)) => Some(Some(token)),
                    _ => None,
                };

                let infos: Vec<Result<BlobInfo, StorageError>> = page
                    .contents
                    .into_iter()
                    .filter_map(|object| {
                        let hash = match ContentHash::from_locator(&object.key) {
                            Ok(hash) => hash,
                            Err(e) => {
                                warn!(key = %object.key, error = %e, "Ignoring foreign object in bucket");
                                return None;
                            }
                        };
                        let last_modified = DateTime::parse_from_rfc3339(&object.last_modified)
                            .map(|t| t.with_timezone(&Utc))
                            .unwrap_or_else(|_| Utc::now());
                        Some(Ok(BlobInfo {
                            hash,
                            size: object.size,
                            last_modified,
                        }))
                    })
                    .collect();

                Ok(Some((futures::stream::iter(infos), (next, bucket))))
            },
        );

        pages.try_flatten().boxed()
    }
}
