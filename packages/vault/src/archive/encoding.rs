use encoding_rs::{Encoding, WINDOWS_1251};

use crate::error::VaultError;

/// Decodes stored entry names from archives without a reliable UTF-8 flag.
#[derive(Debug, Clone, Copy)]
pub struct NameDecoder {
    legacy: &'static Encoding,
}

impl NameDecoder {
    /// `label` is a WHATWG encoding label such as "ibm866" or "windows-1251".
    pub fn new(label: &str) -> Result<Self, VaultError> {
        let legacy = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            VaultError::Internal(format!("unknown legacy name encoding '{label}'"))
        })?;
        Ok(Self { legacy })
    }

    /// Raw UTF-8 if valid, else the legacy codepage, else lossy UTF-8.
    pub fn decode(&self, raw: &[u8]) -> String {
        if let Ok(name) = std::str::from_utf8(raw) {
            return name.to_string();
        }

        let (decoded, had_errors) = self.legacy.decode_without_bom_handling(raw);
        if !had_errors {
            return decoded.into_owned();
        }

        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Decode a text file for editing: UTF-8 first, then Windows-1251.
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.strip_prefix('\u{feff}').unwrap_or(text).to_string(),
        Err(_) => WINDOWS_1251.decode_without_bom_handling(bytes).0.into_owned(),
    }
}
