use common::storage::StorageError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Failures surfaced by vault operations.
///
/// Rejections of untrusted input (`SizeExceeded`, `UnsupportedFormat`,
/// `CorruptArchive`, `BombDetected`, `PathUnsafe`) and expected outcomes
/// (`NotFound`) are distinct from faults of the backing stores.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("upload exceeds the {limit} byte limit")]
    SizeExceeded { limit: u64 },

    #[error("unsupported archive format (expected ZIP or RAR)")]
    UnsupportedFormat,

    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("decompression bomb detected: {0}")]
    BombDetected(String),

    #[error("unsafe path: {0}")]
    PathUnsafe(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    #[error("conflict while replacing associations: {0}")]
    ConflictDuringReplace(String),

    #[error("invalid instance id: {0}")]
    InvalidInstanceId(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("upload aborted: {0}")]
    UploadAborted(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SizeExceeded { .. } => "SIZE_EXCEEDED",
            Self::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            Self::CorruptArchive(_) => "CORRUPT_ARCHIVE",
            Self::BombDetected(_) => "BOMB_DETECTED",
            Self::PathUnsafe(_) => "PATH_UNSAFE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BackingStoreUnavailable(_) => "BACKING_STORE_UNAVAILABLE",
            Self::ConflictDuringReplace(_) => "CONFLICT",
            Self::InvalidInstanceId(_) => "INVALID_INSTANCE_ID",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::UploadAborted(_) => "UPLOAD_ABORTED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for rejections caused by the caller's input rather than a fault.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::SizeExceeded { .. }
                | Self::UnsupportedFormat
                | Self::CorruptArchive(_)
                | Self::BombDetected(_)
                | Self::PathUnsafe(_)
                | Self::NotFound(_)
                | Self::InvalidInstanceId(_)
                | Self::InvalidArgument(_)
        )
    }
}

impl From<DbErr> for VaultError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                VaultError::ConflictDuringReplace(detail)
            }
            _ => VaultError::BackingStoreUnavailable(err.to_string()),
        }
    }
}

impl From<StorageError> for VaultError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(hash) => VaultError::NotFound(format!("blob {hash}")),
            other => VaultError::BackingStoreUnavailable(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(err: tokio::task::JoinError) -> Self {
        VaultError::Internal(format!("blocking task failed: {err}"))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::Internal(format!("I/O error: {err}"))
    }
}
