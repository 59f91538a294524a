/// Longest accepted install path, in characters.
pub const MAX_PATH_LEN: usize = 500;

const JUNK_FILENAMES: &[&str] = &[".ds_store", "thumbs.db", "desktop.ini"];

/// Reason an entry path was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    TooLong,
    Traversal,
    Absolute,
    /// Drive separator (`:`) or NUL byte.
    ForbiddenCharacter,
    Hidden,
}

impl PathRejection {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Path cannot be empty",
            Self::TooLong => "Path exceeds maximum length of 500 characters",
            Self::Traversal => "Path must not contain '..' segments",
            Self::Absolute => "Path must be relative",
            Self::ForbiddenCharacter => "Path must not contain ':' or null bytes",
            Self::Hidden => "Path must not start with '.'",
        }
    }
}

/// Normalize a decoded entry name into a relative `/`-separated path.
///
/// Backslashes become `/`, leading `./` markers and empty or `.` segments are
/// dropped. Traversal, absolute paths, drive letters, NUL bytes and hidden
/// top-level names are refused.
pub fn sanitize_entry_path(name: &str) -> Result<String, PathRejection> {
    let normalized = name.replace('\\', "/");

    if normalized.trim().is_empty() {
        return Err(PathRejection::Empty);
    }
    if normalized.chars().count() > MAX_PATH_LEN {
        return Err(PathRejection::TooLong);
    }
    if normalized.starts_with('/') {
        return Err(PathRejection::Absolute);
    }
    if normalized.contains(':') || normalized.contains('\0') {
        return Err(PathRejection::ForbiddenCharacter);
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(PathRejection::Traversal);
    }

    let mut rest = normalized.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if rest.starts_with('.') {
        return Err(PathRejection::Hidden);
    }

    let cleaned = rest
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");

    if cleaned.is_empty() {
        return Err(PathRejection::Empty);
    }
    Ok(cleaned)
}

/// Archiver metadata that is never installed.
pub fn is_junk(path: &str) -> bool {
    if path.starts_with("__MACOSX/") || path.contains("/__MACOSX/") {
        return true;
    }
    let filename = path.rsplit('/').next().unwrap_or(path).to_lowercase();
    JUNK_FILENAMES.contains(&filename.as_str())
}

/// Last path component.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
