use common::LoaderKind;
use serde::Serialize;

/// What a launcher needs to install an instance on a client machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Manifest {
    pub instance_id: String,
    pub mc_version: String,
    pub loader: LoaderKind,
    pub loader_version: Option<String>,
    /// Client-visible files ordered by install path.
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ManifestFile {
    #[schema(example = "jei.jar")]
    pub filename: String,
    pub hash: String,
    pub size: u64,
    #[schema(example = "mods/jei.jar")]
    pub install_path: String,
    pub download_url: String,
}
