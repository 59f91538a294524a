use common::LoaderKind;
use serde::{Deserialize, Serialize};

/// Descriptive metadata sent alongside a bundle upload.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct BundleMeta {
    #[schema(example = "Техномагия")]
    pub title: String,
    #[schema(example = "1.20.1")]
    pub mc_version: String,
    #[serde(default)]
    pub loader: LoaderKind,
    #[schema(example = "47.2.0")]
    pub loader_version: Option<String>,
}

/// Result of a successful bundle ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct IngestReport {
    #[schema(example = "tehnomagiya-1-20-1")]
    pub instance_id: String,
    /// Entries whose content had never been stored before.
    pub new_object_count: u64,
    /// Entries whose content was already stored, here or earlier in the bundle.
    pub deduped_count: u64,
    /// Entries dropped for unsafe paths or archiver junk.
    pub skipped_entries: u64,
}
