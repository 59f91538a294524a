use std::io::Read;

use bytes::Bytes;
use common::Side;
use common::storage::ContentHash;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::encoding::NameDecoder;
use super::path::{file_name, is_junk, sanitize_entry_path};
use super::side::{Placement, SideRules};
use super::validator::ValidatedArchive;
use super::ArchiveKind;
use crate::config::ArchiveConfig;
use crate::error::VaultError;

/// Entries in flight between the blocking extractor and the ingestion task.
pub const ENTRY_CHANNEL_CAPACITY: usize = 4;

/// A file entry that passed path checks, with its bytes and hash.
#[derive(Debug, Clone)]
pub struct ExtractedEntry {
    pub install_path: String,
    pub filename: String,
    pub side: Side,
    pub hash: ContentHash,
    pub data: Bytes,
}

/// Counters for one extraction run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub accepted: usize,
    pub skipped_unsafe: usize,
    pub skipped_junk: usize,
}

impl ExtractionStats {
    pub fn skipped(&self) -> usize {
        self.skipped_unsafe + self.skipped_junk
    }
}

/// Extract on the blocking pool, delivering entries over a bounded channel.
///
/// The task stops early if the receiver is dropped.
pub fn extract_entries(
    archive: ValidatedArchive,
    config: ArchiveConfig,
    rules: SideRules,
) -> (
    mpsc::Receiver<ExtractedEntry>,
    JoinHandle<Result<ExtractionStats, VaultError>>,
) {
    let (tx, rx) = mpsc::channel(ENTRY_CHANNEL_CAPACITY);
    let handle = tokio::task::spawn_blocking(move || {
        for_each_entry(archive, &config, &rules, |entry| {
            tx.blocking_send(entry)
                .map_err(|_| VaultError::Internal("entry receiver closed".into()))
        })
    });
    (rx, handle)
}

/// Walk every file entry in archive order, handing accepted ones to `sink`.
///
/// Blocking. Unsafe and junk entries are skipped; read failures are fatal.
pub fn for_each_entry<F>(
    archive: ValidatedArchive,
    config: &ArchiveConfig,
    rules: &SideRules,
    mut sink: F,
) -> Result<ExtractionStats, VaultError>
where
    F: FnMut(ExtractedEntry) -> Result<(), VaultError>,
{
    let mut run = ExtractionRun {
        rules,
        remaining: archive
            .summary
            .total_uncompressed
            .min(config.max_uncompressed_bytes),
        stats: ExtractionStats::default(),
    };

    match archive.kind {
        ArchiveKind::Zip => {
            let decoder = NameDecoder::new(&config.legacy_name_encoding)?;
            extract_zip(archive, &decoder, &mut run, &mut sink)?
        }
        ArchiveKind::Rar4 | ArchiveKind::Rar5 => extract_rar(archive, &mut run, &mut sink)?,
    }

    Ok(run.stats)
}

struct ExtractionRun<'a> {
    rules: &'a SideRules,
    /// Declared uncompressed bytes not yet produced.
    remaining: u64,
    stats: ExtractionStats,
}

impl ExtractionRun<'_> {
    fn place(&mut self, decoded: &str) -> Option<Placement> {
        let path = match sanitize_entry_path(decoded) {
            Ok(path) => path,
            Err(reason) => {
                warn!(entry = %decoded, reason = reason.message(), "Skipping unsafe archive entry");
                self.stats.skipped_unsafe += 1;
                return None;
            }
        };

        if is_junk(&path) {
            debug!(entry = %path, "Skipping archiver junk");
            self.stats.skipped_junk += 1;
            return None;
        }

        Some(self.rules.classify(&path))
    }

    fn charge(&mut self, name: &str, len: u64) -> Result<(), VaultError> {
        if len > self.remaining {
            return Err(VaultError::BombDetected(format!(
                "'{name}' inflates past the uncompressed size limit"
            )));
        }
        self.remaining -= len;
        Ok(())
    }

    /// Read one entry, never pulling more than one byte past its declared
    /// size or the archive budget.
    fn read_bounded<R: Read>(
        &mut self,
        reader: R,
        name: &str,
        declared: u64,
    ) -> Result<Vec<u8>, VaultError> {
        let cap = declared.min(self.remaining);
        let mut buf = Vec::with_capacity(cap.min(1 << 20) as usize);
        reader
            .take(cap.saturating_add(1))
            .read_to_end(&mut buf)
            .map_err(|e| VaultError::CorruptArchive(format!("failed to read '{name}': {e}")))?;
        if buf.len() as u64 > declared {
            return Err(VaultError::BombDetected(format!(
                "'{name}' inflates past its declared size of {declared} bytes"
            )));
        }
        self.charge(name, buf.len() as u64)?;
        Ok(buf)
    }

    fn emit<F>(&mut self, placement: Placement, data: Vec<u8>, sink: &mut F) -> Result<(), VaultError>
    where
        F: FnMut(ExtractedEntry) -> Result<(), VaultError>,
    {
        let hash = ContentHash::compute(&data);
        let filename = file_name(&placement.install_path).to_string();
        self.stats.accepted += 1;
        sink(ExtractedEntry {
            install_path: placement.install_path,
            filename,
            side: placement.side,
            hash,
            data: Bytes::from(data),
        })
    }
}

fn extract_zip<F>(
    archive: ValidatedArchive,
    decoder: &NameDecoder,
    run: &mut ExtractionRun<'_>,
    sink: &mut F,
) -> Result<(), VaultError>
where
    F: FnMut(ExtractedEntry) -> Result<(), VaultError>,
{
    let mut zip = zip::ZipArchive::new(archive.spool)
        .map_err(|e| VaultError::CorruptArchive(format!("invalid ZIP directory: {e}")))?;

    for i in 0..zip.len() {
        let mut file = zip
            .by_index(i)
            .map_err(|e| VaultError::CorruptArchive(format!("ZIP entry {i}: {e}")))?;
        if file.is_dir() {
            continue;
        }

        let decoded = decoder.decode(file.name_raw());
        let Some(placement) = run.place(&decoded) else {
            continue;
        };

        let declared = file.size();
        let data = run.read_bounded(&mut file, &decoded, declared)?;
        drop(file);
        run.emit(placement, data, sink)?;
    }

    Ok(())
}

#[cfg(feature = "rar")]
fn extract_rar<F>(
    mut archive: ValidatedArchive,
    run: &mut ExtractionRun<'_>,
    sink: &mut F,
) -> Result<(), VaultError>
where
    F: FnMut(ExtractedEntry) -> Result<(), VaultError>,
{
    use std::io::{Seek, SeekFrom, Write};

    // unrar only opens archives by path.
    let mut copy = tempfile::Builder::new()
        .prefix("modvault-")
        .suffix(".rar")
        .tempfile()?;
    archive.spool.seek(SeekFrom::Start(0))?;
    std::io::copy(&mut archive.spool, &mut copy)?;
    copy.flush()?;
    drop(archive);

    let rar_error = |e: unrar::error::UnrarError| VaultError::CorruptArchive(e.to_string());

    let mut cursor = unrar::Archive::new(copy.path())
        .open_for_processing()
        .map_err(rar_error)?;

    while let Some(header) = cursor.read_header().map_err(rar_error)? {
        let entry = header.entry();
        if !entry.is_file() {
            cursor = header.skip().map_err(rar_error)?;
            continue;
        }

        let decoded = entry.filename.to_string_lossy().into_owned();
        let Some(placement) = run.place(&decoded) else {
            cursor = header.skip().map_err(rar_error)?;
            continue;
        };

        // Unpacking stops at the declared size, which the validator bounded.
        let (data, rest) = header.read().map_err(rar_error)?;
        cursor = rest;
        run.charge(&decoded, data.len() as u64)?;
        run.emit(placement, data, sink)?;
    }

    Ok(())
}

#[cfg(not(feature = "rar"))]
fn extract_rar<F>(
    _archive: ValidatedArchive,
    _run: &mut ExtractionRun<'_>,
    _sink: &mut F,
) -> Result<(), VaultError>
where
    F: FnMut(ExtractedEntry) -> Result<(), VaultError>,
{
    Err(VaultError::UnsupportedFormat)
}
