use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_object")]
pub struct Model {
    /// SHA-256 content hash, 64 lowercase hex characters.
    #[sea_orm(primary_key, auto_increment = false)]
    pub hash: String,

    /// Filename the content was first seen under. Display only.
    pub filename: String,

    pub size: i64,

    /// Backing-store key (`objects/<2 hex>/<hash>`).
    pub locator: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub associations: HasMany<super::association::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
