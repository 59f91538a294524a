use std::path::PathBuf;

use serde::Deserialize;

/// Which blob backend to use.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Filesystem,
    S3,
}

/// Blob storage configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Backend selector. Default: filesystem.
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default)]
    pub filesystem: FilesystemStorageConfig,
    #[serde(default)]
    pub s3: S3StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemStorageConfig {
    /// Root directory for blobs. Default: "./data/blobs".
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("./data/blobs")
}

impl Default for FilesystemStorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

/// S3-compatible bucket settings.
#[derive(Debug, Deserialize, Clone)]
pub struct S3StorageConfig {
    /// Default: "launcher-files".
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Default: "us-east-1".
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO etc.). When unset the region name is resolved as an AWS region.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Path-style addressing. Default: true.
    #[serde(default = "default_path_style")]
    pub path_style: bool,
}

fn default_bucket() -> String {
    "launcher-files".into()
}
fn default_region() -> String {
    "us-east-1".into()
}
fn default_path_style() -> bool {
    true
}

impl Default for S3StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            path_style: default_path_style(),
        }
    }
}
