use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::fs;
use tracing::warn;

use super::error::StorageError;
use super::hash::{ContentHash, OBJECTS_PREFIX};
use super::traits::{BlobInfo, BlobListing, BlobStore};

/// Filesystem-backed content-addressed blob store.
///
/// Blobs are stored under the same key layout as the object-storage backend:
/// `{base_path}/objects/{first 2 hex chars}/{full 64 hex chars}`
pub struct FilesystemBlobStore {
    base_path: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join(OBJECTS_PREFIX)).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self { base_path })
    }

    /// Compute the filesystem path for a given content hash.
    fn blob_path(&self, hash: &ContentHash) -> PathBuf {
        self.base_path.join(hash.locator())
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(&self, hash: &ContentHash, data: Bytes) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(hash);

        if fs::try_exists(&blob_path).await? {
            return Ok(false);
        }

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(true)
    }

    async fn get(&self, hash: &ContentHash) -> Result<Bytes, StorageError> {
        match fs::read(self.blob_path(hash)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(hash.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(hash)).await?)
    }

    async fn delete(&self, hash: &ContentHash) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(hash)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self) -> BlobListing<'_> {
        let walk = ShardWalk {
            objects_dir: self.base_path.join(OBJECTS_PREFIX),
            started: false,
            shards: None,
            current: None,
        };

        futures::stream::try_unfold(walk, |mut walk| async move {
            match walk.next_blob().await? {
                Some(info) => Ok::<_, StorageError>(Some((info, walk))),
                None => Ok(None),
            }
        })
        .boxed()
    }
}

/// Lazy two-level directory walk over `objects/<shard>/<hash>`.
struct ShardWalk {
    objects_dir: PathBuf,
    started: bool,
    shards: Option<fs::ReadDir>,
    current: Option<fs::ReadDir>,
}

impl ShardWalk {
    async fn next_blob(&mut self) -> Result<Option<BlobInfo>, StorageError> {
        if !self.started {
            self.started = true;
            match fs::read_dir(&self.objects_dir).await {
                Ok(dir) => self.shards = Some(dir),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }

        loop {
            if let Some(current) = self.current.as_mut() {
                match current.next_entry().await? {
                    Some(entry) => {
                        if let Some(info) = blob_info(&entry.path()).await? {
                            return Ok(Some(info));
                        }
                        continue;
                    }
                    None => self.current = None,
                }
            }

            let Some(shards) = self.shards.as_mut() else {
                return Ok(None);
            };
            match shards.next_entry().await? {
                Some(shard) if shard.file_type().await?.is_dir() => {
                    self.current = Some(fs::read_dir(shard.path()).await?);
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }
    }
}

/// Describe one file in a shard directory, skipping anything that is not a blob.
async fn blob_info(path: &Path) -> Result<Option<BlobInfo>, StorageError> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let shard = path
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let hash = match ContentHash::from_locator(&format!("{OBJECTS_PREFIX}/{shard}/{name}")) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring foreign file in blob store");
            return Ok(None);
        }
    };

    let meta = match fs::metadata(path).await {
        Ok(meta) => meta,
        // Deleted between readdir and stat.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Ok(None);
    }

    let last_modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now());

    Ok(Some(BlobInfo {
        hash,
        size: meta.len(),
        last_modified,
    }))
}
