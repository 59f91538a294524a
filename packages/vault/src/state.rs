use std::sync::Arc;

use common::storage::{BlobStore, open_blob_store};
use sea_orm::DatabaseConnection;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::database::init_db;
use crate::error::VaultError;
use crate::locks::InstanceLocks;

/// Handles shared by every vault operation.
#[derive(Clone)]
pub struct VaultState {
    pub db: DatabaseConnection,
    pub blob_store: Arc<dyn BlobStore>,
    pub config: Arc<AppConfig>,
    pub locks: InstanceLocks,
    /// Held shared by transactions that write or reference blobs, and
    /// exclusively while blobs are deleted.
    pub reap_gate: Arc<RwLock<()>>,
}

impl VaultState {
    pub fn new(db: DatabaseConnection, blob_store: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        Self {
            db,
            blob_store,
            config: Arc::new(config),
            locks: InstanceLocks::new(),
            reap_gate: Arc::new(RwLock::new(())),
        }
    }

    /// Connect the database and blob store named by `config`.
    pub async fn connect(config: AppConfig) -> Result<Self, VaultError> {
        let db = init_db(&config.database).await?;
        let blob_store = open_blob_store(&config.storage).await?;
        Ok(Self::new(db, blob_store, config))
    }
}
