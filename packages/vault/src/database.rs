use std::time::Duration;

use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::entity::association;

pub async fn init_db(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(config.url.clone());

    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("vault::entity::*").sync(&db).await?;
    ensure_indexes(&db).await;

    Ok(db)
}

/// Create the secondary indexes schema sync does not derive.
///
/// Orphan detection and reference counting filter associations by content hash.
pub async fn ensure_indexes(db: &DatabaseConnection) {
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_association_content_hash")
        .table(association::Entity)
        .col(association::Column::ContentHash)
        .to_owned();

    let backend = db.get_database_backend();
    match db.execute_raw(backend.build(&stmt)).await {
        Ok(_) => info!("Ensured index idx_association_content_hash exists"),
        Err(e) => warn!(error = %e, "Failed to create index idx_association_content_hash"),
    }
}
