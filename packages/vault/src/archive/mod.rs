pub mod encoding;
pub mod extractor;
pub mod path;
pub mod rar;
pub mod side;
pub mod validator;

use std::fmt;

pub use extractor::{ExtractedEntry, ExtractionStats, extract_entries, for_each_entry};
pub use side::{Placement, SideRules};
pub use validator::{DirectorySummary, ValidatedArchive, validate_upload};

/// Container format detected from the leading bytes of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    Rar4,
    Rar5,
}

impl ArchiveKind {
    pub fn is_rar(&self) -> bool {
        matches!(self, Self::Rar4 | Self::Rar5)
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Zip => "zip",
            Self::Rar4 => "rar4",
            Self::Rar5 => "rar5",
        })
    }
}

/// One entry of an archive directory, as declared by the archive itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Stored name, lossily decoded. Used for diagnostics only.
    pub name: String,
    pub compressed_size: u64,
    /// `None` when the archive does not declare it.
    pub uncompressed_size: Option<u64>,
    pub is_dir: bool,
}
