#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which side of the game a file is installed on.
///
/// The stored strings (`CLIENT`, `SERVER`, `BOTH`) are part of the external
/// contract and must not change.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema,
)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Needed only by the game client.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "CLIENT"))]
    Client,
    /// Needed only by the dedicated server.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "SERVER"))]
    Server,
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "BOTH"))]
    Both,
}

impl Side {
    pub const ALL: &'static [Side] = &[Self::Client, Self::Server, Self::Both];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Server => "SERVER",
            Self::Both => "BOTH",
        }
    }

    /// Whether a launcher client should download files with this side.
    pub fn is_client_visible(&self) -> bool {
        matches!(self, Self::Client | Self::Both)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid side string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSideError {
    invalid: String,
}

impl fmt::Display for ParseSideError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid side '{}'. Valid values: CLIENT, SERVER, BOTH",
            self.invalid
        )
    }
}

impl std::error::Error for ParseSideError {}

impl FromStr for Side {
    type Err = ParseSideError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLIENT" => Ok(Self::Client),
            "SERVER" => Ok(Self::Server),
            "BOTH" => Ok(Self::Both),
            _ => Err(ParseSideError {
                invalid: s.to_string(),
            }),
        }
    }
}
