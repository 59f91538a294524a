use common::Side;
use serde::Serialize;

/// Extensions shown as editable configuration files.
const CONFIG_EXTENSIONS: &[&str] = &["cfg", "txt", "json", "toml", "ini", "properties", "md"];

/// One installed file of an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FileNode {
    #[schema(example = "mods/jei.jar")]
    pub path: String,
    /// Name the content was first stored under.
    #[schema(example = "jei.jar")]
    pub filename: String,
    pub size: u64,
    pub hash: String,
    pub side: Side,
    pub is_config: bool,
}

/// Whether `path` names an editable configuration file.
pub fn is_config_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => CONFIG_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FileOpStatus {
    Uploaded,
    Updated,
    Deleted,
    Moved,
    SideUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct FileOpResponse {
    pub status: FileOpStatus,
    /// Path the operation left the file at.
    pub path: String,
}

impl FileOpResponse {
    pub fn new(status: FileOpStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
        }
    }
}
