use std::io::{Read, Seek, SeekFrom, Write};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tempfile::SpooledTempFile;
use tracing::{debug, warn};

use super::rar::{self, RAR4_SIGNATURE, RAR5_SIGNATURE};
use super::{ArchiveKind, EntryHeader};
use crate::config::ArchiveConfig;
use crate::error::VaultError;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

/// Upload bytes buffered in the async task before a blocking spool write.
const SPOOL_FLUSH_BYTES: usize = 1024 * 1024;

/// Totals gathered from an archive directory that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectorySummary {
    pub file_count: usize,
    pub total_uncompressed: u64,
}

/// An upload that passed size, format and bomb checks.
///
/// The spool is rewound and ready for extraction. Dropping it frees the
/// memory buffer or unlinks the temp file.
pub struct ValidatedArchive {
    pub(crate) spool: SpooledTempFile,
    pub kind: ArchiveKind,
    pub summary: DirectorySummary,
}

impl std::fmt::Debug for ValidatedArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedArchive")
            .field("kind", &self.kind)
            .field("summary", &self.summary)
            .field("spilled", &self.spool.is_rolled())
            .finish()
    }
}

/// Spool an upload and inspect its directory without extracting anything.
pub async fn validate_upload<S, E>(
    upload: S,
    config: &ArchiveConfig,
) -> Result<ValidatedArchive, VaultError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut spool = spool_upload(upload, config).await?;

    let limits = config.clone();
    let (spool, kind, summary) = tokio::task::spawn_blocking(move || {
        let (kind, summary) = inspect(&mut spool, &limits)?;
        Ok::<_, VaultError>((spool, kind, summary))
    })
    .await??;

    debug!(
        %kind,
        files = summary.file_count,
        total_uncompressed = summary.total_uncompressed,
        "Archive passed validation"
    );

    Ok(ValidatedArchive {
        spool,
        kind,
        summary,
    })
}

/// Copy the upload into a spooled temp file, aborting past `max_upload_bytes`.
pub async fn spool_upload<S, E>(
    mut upload: S,
    config: &ArchiveConfig,
) -> Result<SpooledTempFile, VaultError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut spool = tempfile::spooled_tempfile(config.spool_memory_bytes);
    let mut pending: Vec<u8> = Vec::with_capacity(SPOOL_FLUSH_BYTES);
    let mut total: u64 = 0;

    while let Some(chunk) = upload.next().await {
        let chunk = chunk.map_err(|e| VaultError::UploadAborted(e.to_string()))?;

        total += chunk.len() as u64;
        if total > config.max_upload_bytes {
            warn!(
                limit = config.max_upload_bytes,
                "Upload exceeded size limit, aborting"
            );
            return Err(VaultError::SizeExceeded {
                limit: config.max_upload_bytes,
            });
        }

        pending.extend_from_slice(&chunk);
        if pending.len() >= SPOOL_FLUSH_BYTES {
            let buf = std::mem::replace(&mut pending, Vec::with_capacity(SPOOL_FLUSH_BYTES));
            spool = write_spool(spool, buf).await?;
        }
    }

    if !pending.is_empty() {
        spool = write_spool(spool, pending).await?;
    }

    Ok(spool)
}

async fn write_spool(
    mut spool: SpooledTempFile,
    buf: Vec<u8>,
) -> Result<SpooledTempFile, VaultError> {
    let spool = tokio::task::spawn_blocking(move || {
        spool.write_all(&buf)?;
        Ok::<_, std::io::Error>(spool)
    })
    .await??;
    Ok(spool)
}

/// Detect the container format and check every declared entry size.
///
/// Leaves the reader rewound to the start on success.
pub fn inspect<R: Read + Seek>(
    reader: &mut R,
    config: &ArchiveConfig,
) -> Result<(ArchiveKind, DirectorySummary), VaultError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut head = [0u8; 8];
    let mut filled = 0;
    while filled < head.len() {
        let n = reader.read(&mut head[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    let kind = detect_kind(&head[..filled])?;

    let entries = match kind {
        ArchiveKind::Zip => zip_directory(reader)?,
        ArchiveKind::Rar4 | ArchiveKind::Rar5 => rar::read_directory(reader, kind)?,
    };
    let summary = check_entries(&entries, config)?;

    reader.seek(SeekFrom::Start(0))?;
    Ok((kind, summary))
}

/// Identify ZIP, RAR 4.x and RAR 5.0 by their signatures.
pub fn detect_kind(head: &[u8]) -> Result<ArchiveKind, VaultError> {
    if head.starts_with(ZIP_SIGNATURE) {
        Ok(ArchiveKind::Zip)
    } else if head.starts_with(RAR5_SIGNATURE) {
        Ok(ArchiveKind::Rar5)
    } else if head.starts_with(RAR4_SIGNATURE) {
        Ok(ArchiveKind::Rar4)
    } else {
        Err(VaultError::UnsupportedFormat)
    }
}

/// Read the ZIP central directory without decompressing any entry.
fn zip_directory<R: Read + Seek>(reader: &mut R) -> Result<Vec<EntryHeader>, VaultError> {
    reader.seek(SeekFrom::Start(0))?;
    let mut archive = zip::ZipArchive::new(&mut *reader)
        .map_err(|e| VaultError::CorruptArchive(format!("invalid ZIP directory: {e}")))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive
            .by_index_raw(i)
            .map_err(|e| VaultError::CorruptArchive(format!("ZIP entry {i}: {e}")))?;
        entries.push(EntryHeader {
            name: String::from_utf8_lossy(file.name_raw()).into_owned(),
            compressed_size: file.compressed_size(),
            uncompressed_size: Some(file.size()),
            is_dir: file.is_dir(),
        });
    }
    Ok(entries)
}

/// Apply the ratio, zero-compressed and total-size ceilings.
pub fn check_entries(
    entries: &[EntryHeader],
    config: &ArchiveConfig,
) -> Result<DirectorySummary, VaultError> {
    let mut summary = DirectorySummary::default();

    for entry in entries.iter().filter(|e| !e.is_dir) {
        let Some(uncompressed) = entry.uncompressed_size else {
            return Err(VaultError::BombDetected(format!(
                "'{}' does not declare its uncompressed size",
                entry.name
            )));
        };

        if uncompressed > 0 && entry.compressed_size == 0 {
            return Err(VaultError::BombDetected(format!(
                "'{}' declares {uncompressed} bytes from empty compressed data",
                entry.name
            )));
        }

        if entry.compressed_size > 0
            && uncompressed as u128
                > entry.compressed_size as u128 * config.max_compression_ratio as u128
        {
            return Err(VaultError::BombDetected(format!(
                "'{}' compression ratio exceeds {}",
                entry.name, config.max_compression_ratio
            )));
        }

        summary.file_count += 1;
        summary.total_uncompressed = summary.total_uncompressed.saturating_add(uncompressed);
        if summary.total_uncompressed > config.max_uncompressed_bytes {
            return Err(VaultError::BombDetected(format!(
                "declared uncompressed total exceeds {} bytes",
                config.max_uncompressed_bytes
            )));
        }
    }

    Ok(summary)
}
