//! RAR block header walker.
//!
//! Reads only the header chain of RAR 4.x and RAR 5.0 archives, seeking over
//! packed data, so a validator can inspect declared sizes without unpacking.

use std::io::{self, Read, Seek, SeekFrom};

use super::{ArchiveKind, EntryHeader};
use crate::error::VaultError;

pub const RAR4_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x00";
pub const RAR5_SIGNATURE: &[u8] = b"Rar!\x1a\x07\x01\x00";

const RAR4_BASE_HEADER: u64 = 7;
const RAR4_MAIN_HEADER: u8 = 0x73;
const RAR4_FILE_HEADER: u8 = 0x74;
const RAR4_END_HEADER: u8 = 0x7B;
const RAR4_MAIN_ENCRYPTED_HEADERS: u16 = 0x0080;
const RAR4_FILE_LARGE: u16 = 0x0100;
const RAR4_FILE_DIRECTORY: u16 = 0x00E0;
const RAR4_LONG_BLOCK: u16 = 0x8000;

const RAR5_MAX_HEADER: u64 = 2 * 1024 * 1024;
const RAR5_FILE_HEADER: u64 = 2;
const RAR5_ENCRYPTION_HEADER: u64 = 4;
const RAR5_END_HEADER: u64 = 5;
const RAR5_HAS_EXTRA: u64 = 0x0001;
const RAR5_HAS_DATA: u64 = 0x0002;
const RAR5_FILE_DIRECTORY: u64 = 0x0001;
const RAR5_FILE_MTIME: u64 = 0x0002;
const RAR5_FILE_CRC: u64 = 0x0004;
const RAR5_FILE_UNKNOWN_SIZE: u64 = 0x0008;

fn corrupt(msg: impl Into<String>) -> VaultError {
    VaultError::CorruptArchive(msg.into())
}

fn read_failure(e: io::Error) -> VaultError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        corrupt("truncated RAR header")
    } else {
        VaultError::Internal(format!("failed to read spooled upload: {e}"))
    }
}

/// Walk every block header and return the file entries in archive order.
pub fn read_directory<R: Read + Seek>(
    reader: &mut R,
    kind: ArchiveKind,
) -> Result<Vec<EntryHeader>, VaultError> {
    let len = reader.seek(SeekFrom::End(0))?;
    match kind {
        ArchiveKind::Rar4 => read_rar4(reader, len),
        ArchiveKind::Rar5 => read_rar5(reader, len),
        ArchiveKind::Zip => Err(VaultError::Internal("not a RAR archive".into())),
    }
}

fn read_rar4<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Vec<EntryHeader>, VaultError> {
    let mut entries = Vec::new();
    let mut pos = RAR4_SIGNATURE.len() as u64;

    while pos < len {
        if len - pos < RAR4_BASE_HEADER {
            return Err(corrupt("truncated RAR block"));
        }
        reader.seek(SeekFrom::Start(pos))?;

        let mut base = [0u8; RAR4_BASE_HEADER as usize];
        reader.read_exact(&mut base).map_err(read_failure)?;
        let head_type = base[2];
        let flags = u16::from_le_bytes([base[3], base[4]]);
        let head_size = u16::from_le_bytes([base[5], base[6]]) as u64;

        if head_size < RAR4_BASE_HEADER {
            return Err(corrupt(format!("RAR block at offset {pos} has invalid size")));
        }
        if pos + head_size > len {
            return Err(corrupt("truncated RAR block"));
        }

        let mut header = base.to_vec();
        header.resize(head_size as usize, 0);
        reader
            .read_exact(&mut header[RAR4_BASE_HEADER as usize..])
            .map_err(read_failure)?;

        let data_size = match head_type {
            RAR4_MAIN_HEADER => {
                if flags & RAR4_MAIN_ENCRYPTED_HEADERS != 0 {
                    return Err(corrupt("RAR headers are encrypted"));
                }
                0
            }
            RAR4_FILE_HEADER => {
                let entry = parse_rar4_file(&header, flags)?;
                let packed = entry.compressed_size;
                entries.push(entry);
                packed
            }
            RAR4_END_HEADER => break,
            _ if flags & RAR4_LONG_BLOCK != 0 => {
                if header.len() < 11 {
                    return Err(corrupt("RAR block too short for its data size"));
                }
                u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as u64
            }
            _ => 0,
        };

        pos = pos
            .checked_add(head_size)
            .and_then(|p| p.checked_add(data_size))
            .ok_or_else(|| corrupt("RAR block size overflow"))?;
        if pos > len {
            return Err(corrupt("RAR packed data runs past end of archive"));
        }
    }

    Ok(entries)
}

fn parse_rar4_file(header: &[u8], flags: u16) -> Result<EntryHeader, VaultError> {
    let mut fields = FieldReader::new(&header[RAR4_BASE_HEADER as usize..]);

    let pack_low = fields.u32()? as u64;
    let unp_low = fields.u32()? as u64;
    fields.skip(1 + 4 + 4 + 1 + 1)?; // host os, crc, mtime, version, method
    let name_size = fields.u16()? as usize;
    fields.skip(4)?; // attributes

    let (pack_high, unp_high) = if flags & RAR4_FILE_LARGE != 0 {
        (fields.u32()? as u64, fields.u32()? as u64)
    } else {
        (0, 0)
    };

    let raw_name = fields.bytes(name_size)?;
    // Unicode names are stored as "<ascii>\0<packed unicode>".
    let raw_name = raw_name.split(|b| *b == 0).next().unwrap_or(raw_name);

    Ok(EntryHeader {
        name: String::from_utf8_lossy(raw_name).replace('\\', "/"),
        compressed_size: (pack_high << 32) | pack_low,
        uncompressed_size: Some((unp_high << 32) | unp_low),
        is_dir: flags & RAR4_FILE_DIRECTORY == RAR4_FILE_DIRECTORY,
    })
}

fn read_rar5<R: Read + Seek>(reader: &mut R, len: u64) -> Result<Vec<EntryHeader>, VaultError> {
    let mut entries = Vec::new();
    let mut pos = RAR5_SIGNATURE.len() as u64;

    while pos < len {
        reader.seek(SeekFrom::Start(pos))?;

        let mut crc = [0u8; 4];
        reader.read_exact(&mut crc).map_err(read_failure)?;
        let (header_size, vint_len) = read_stream_vint(reader)?;

        if header_size == 0 || header_size > RAR5_MAX_HEADER {
            return Err(corrupt(format!("RAR5 header at offset {pos} has invalid size")));
        }
        let header_start = pos + 4 + vint_len;
        if header_start + header_size > len {
            return Err(corrupt("truncated RAR5 header"));
        }

        let mut header = vec![0u8; header_size as usize];
        reader.read_exact(&mut header).map_err(read_failure)?;

        let mut fields = FieldReader::new(&header);
        let head_type = fields.vint()?;
        let head_flags = fields.vint()?;
        if head_flags & RAR5_HAS_EXTRA != 0 {
            fields.vint()?;
        }
        let data_size = if head_flags & RAR5_HAS_DATA != 0 {
            fields.vint()?
        } else {
            0
        };

        match head_type {
            RAR5_FILE_HEADER => entries.push(parse_rar5_file(&mut fields, data_size)?),
            RAR5_ENCRYPTION_HEADER => return Err(corrupt("RAR headers are encrypted")),
            RAR5_END_HEADER => break,
            _ => {}
        }

        pos = header_start
            .checked_add(header_size)
            .and_then(|p| p.checked_add(data_size))
            .ok_or_else(|| corrupt("RAR5 block size overflow"))?;
        if pos > len {
            return Err(corrupt("RAR5 packed data runs past end of archive"));
        }
    }

    Ok(entries)
}

fn parse_rar5_file(fields: &mut FieldReader<'_>, data_size: u64) -> Result<EntryHeader, VaultError> {
    let file_flags = fields.vint()?;
    let unpacked = fields.vint()?;
    fields.vint()?; // attributes
    if file_flags & RAR5_FILE_MTIME != 0 {
        fields.skip(4)?;
    }
    if file_flags & RAR5_FILE_CRC != 0 {
        fields.skip(4)?;
    }
    fields.vint()?; // compression info
    fields.vint()?; // host os
    let name_len = fields.vint()? as usize;
    let raw_name = fields.bytes(name_len)?;

    Ok(EntryHeader {
        name: String::from_utf8_lossy(raw_name).into_owned(),
        compressed_size: data_size,
        uncompressed_size: (file_flags & RAR5_FILE_UNKNOWN_SIZE == 0).then_some(unpacked),
        is_dir: file_flags & RAR5_FILE_DIRECTORY != 0,
    })
}

/// Read a RAR5 variable-length integer from the stream, returning it with its encoded length.
fn read_stream_vint<R: Read>(reader: &mut R) -> Result<(u64, u64), VaultError> {
    let mut value = 0u64;
    for i in 0..10u64 {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).map_err(read_failure)?;
        value |= ((byte[0] & 0x7F) as u64) << (7 * i);
        if byte[0] & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(corrupt("RAR5 integer too long"))
}

/// Bounds-checked little-endian field reader over one header.
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8], VaultError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| corrupt("RAR header field runs past header end"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), VaultError> {
        self.bytes(n).map(|_| ())
    }

    fn u16(&mut self) -> Result<u16, VaultError> {
        let b = self.bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, VaultError> {
        let b = self.bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn vint(&mut self) -> Result<u64, VaultError> {
        let mut value = 0u64;
        for i in 0..10 {
            let byte = self.bytes(1)?[0];
            value |= ((byte & 0x7F) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(corrupt("RAR5 integer too long"))
    }
}
