use common::LoaderKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "instance")]
pub struct Model {
    /// URL-safe slug derived from title and game version.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    /// Minecraft version, e.g. "1.20.1".
    pub mc_version: String,

    pub loader: LoaderKind,
    pub loader_version: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub associations: HasMany<super::association::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
