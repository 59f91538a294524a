use common::Side;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "association")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique_key = "instance_path")]
    pub instance_id: String,

    /// Install path relative to the game directory, `/`-separated.
    #[sea_orm(unique_key = "instance_path")]
    pub path: String,

    pub content_hash: String,

    pub side: Side,

    pub created_at: DateTimeUtc,

    #[sea_orm(belongs_to, from = "instance_id", to = "id", on_delete = "Cascade")]
    pub instance: HasOne<super::instance::Entity>,

    #[sea_orm(belongs_to, from = "content_hash", to = "hash")]
    pub content_object: HasOne<super::content_object::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
