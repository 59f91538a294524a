use common::LoaderKind;
use serde::Serialize;

use crate::error::VaultError;

pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct InstanceSummary {
    #[schema(example = "tehnomagiya-1-20-1")]
    pub id: String,
    pub title: String,
    pub mc_version: String,
    pub loader: LoaderKind,
    pub loader_version: Option<String>,
    pub files_count: u64,
}

/// One page of instances, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct PaginatedInstances {
    pub items: Vec<InstanceSummary>,
    /// Total number of instances across all pages.
    #[schema(example = 47)]
    pub total: u64,
    /// Current page number (1-based).
    #[schema(example = 1)]
    pub page: u64,
    #[schema(example = 20)]
    pub page_size: u64,
    /// Total number of pages.
    #[schema(example = 3)]
    pub pages: u64,
}

/// Check paging arguments: `page >= 1`, `1 <= page_size <= 100`.
pub fn validate_paging(page: u64, page_size: u64) -> Result<(), VaultError> {
    if page == 0 {
        return Err(VaultError::InvalidArgument("page must be >= 1".into()));
    }
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(VaultError::InvalidArgument(format!(
            "page_size must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct DeleteInstanceReport {
    /// Content objects freed because only the deleted instance used them.
    ///
    /// Orphans left by earlier operations are reclaimed by the same sweep
    /// but not counted here.
    pub orphan_objects_reaped: u64,
    /// Bytes of those content objects.
    pub bytes_freed: u64,
}
