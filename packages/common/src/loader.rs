#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Mod loader an instance is built for.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "forge"))]
    Forge,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "fabric"))]
    Fabric,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "quilt"))]
    Quilt,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "neoforge"))]
    NeoForge,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "vanilla"))]
    Vanilla,
}

impl LoaderKind {
    pub const ALL: &'static [LoaderKind] = &[
        Self::Forge,
        Self::Fabric,
        Self::Quilt,
        Self::NeoForge,
        Self::Vanilla,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forge => "forge",
            Self::Fabric => "fabric",
            Self::Quilt => "quilt",
            Self::NeoForge => "neoforge",
            Self::Vanilla => "vanilla",
        }
    }
}

impl fmt::Display for LoaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseLoaderError {
    invalid: String,
}

impl fmt::Display for ParseLoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid loader '{}'. Valid values: {}",
            self.invalid,
            LoaderKind::ALL
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseLoaderError {}

impl FromStr for LoaderKind {
    type Err = ParseLoaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LoaderKind::ALL
            .iter()
            .copied()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLoaderError {
                invalid: s.to_string(),
            })
    }
}
