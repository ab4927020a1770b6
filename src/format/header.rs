// ebook-drm-check - DRM detection for eBook libraries
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Fixed-offset binary header reads
//!
//! Pure structural decoding: nothing in here decides whether a file is
//! protected. Every function opens its own file handle and drops it before
//! returning.
//!
//! # Layouts
//!
//! ## PalmDB container header (offset 0)
//! | Offset | Size | Field                |
//! |--------|------|----------------------|
//! | 60     | 8    | type + creator       |
//! | 76     | 2    | record count (BE)    |
//! | 78     | 4    | record 0 offset (BE) |
//!
//! ## MOBI header (at record 0)
//! | Offset | Size | Field                   |
//! |--------|------|-------------------------|
//! | 16     | 4    | `"MOBI"`                |
//! | 20     | 4    | header length           |
//! | 128    | 4    | EXTH flags (bit `0x40`) |
//! | 168    | 4    | DRM offset              |
//! | 172    | 4    | DRM count               |
//! | 176    | 4    | DRM size                |
//! | 180    | 4    | DRM flags               |
//!
//! ## EXTH block
//! `"EXTH"`, total length (BE u32), record count (BE u32), then records of
//! `type (u32) | length (u32, includes these 8 bytes) | payload`.

use crate::error::{DrmCheckError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, SeekFrom};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

// ============================================================================
// ZIP SIGNATURES
// ============================================================================

/// `PK\x03\x04` read as little-endian (standard archive)
pub const ZIP_LOCAL_HEADER_MAGIC: u32 = 0x04034B50;
/// `PK\x05\x06` read as little-endian (empty archive)
pub const ZIP_EMPTY_ARCHIVE_MAGIC: u32 = 0x06054B50;
/// `PK\x07\x08` read as little-endian (spanned archive)
pub const ZIP_SPANNED_MAGIC: u32 = 0x08074B50;
/// Returned by [`read_zip_magic`] when the signature cannot be read
pub const ZIP_MAGIC_NONE: u32 = 0;

// ============================================================================
// PALMDB / MOBI OFFSETS
// ============================================================================

/// Bytes read for the PalmDOC identity check
pub const PALMDOC_PROBE_LEN: usize = 232;
/// Shortest prefix that still contains the PalmDB header
pub const PALMDB_HEADER_LEN: usize = 78;
/// Offset of the 8-byte type/creator field
pub const TYPE_CREATOR_OFFSET: usize = 60;

const CONTAINER_PROBE_LEN: usize = 1024;
const RECORD_COUNT_OFFSET: usize = 76;
const FIRST_RECORD_OFFSET: usize = 78;

/// Bytes of record 0 decoded as the MOBI header
pub const MOBI_HEADER_PROBE_LEN: usize = 232;
const MOBI_SIGNATURE_OFFSET: usize = 16;
const MOBI_HEADER_LENGTH_OFFSET: usize = 20;
const EXTH_FLAGS_OFFSET: usize = 128;
const DRM_OFFSET_OFFSET: usize = 168;
const DRM_COUNT_OFFSET: usize = 172;
const DRM_SIZE_OFFSET: usize = 176;
const DRM_FLAGS_OFFSET: usize = 180;

/// Bit in the EXTH flags word announcing an EXTH block
pub const EXTH_PRESENT_FLAG: u32 = 0x40;

/// The PalmDOC record 0 header preceding the MOBI header
pub const PALMDOC_RECORD_HEADER_LEN: u64 = 16;

const EXTH_HEADER_LEN: usize = 12;
const EXTH_RECORD_HEADER_LEN: usize = 8;

// ============================================================================
// DECODED STRUCTURES
// ============================================================================

/// Decoded MOBI header fields
///
/// Read fresh for every detection call; files can change between scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MobiHeaderInfo {
    /// Number of PalmDB records
    pub record_count: u16,
    /// Absolute offset of record 0 (where the MOBI header lives)
    pub first_record_offset: u32,
    /// Declared MOBI header length, counted from the `"MOBI"` signature
    pub mobi_header_length: u32,
    /// Offset of the DRM block, `0xFFFFFFFF` when absent
    pub drm_offset: u32,
    /// Number of DRM vouchers
    pub drm_count: u32,
    /// Size of the DRM block in bytes
    pub drm_size: u32,
    /// DRM flags word
    pub drm_flags: u32,
    /// EXTH block announced by the flags word
    pub has_exth: bool,
}

impl MobiHeaderInfo {
    /// Absolute file offset of the EXTH block
    pub fn exth_offset(&self) -> u64 {
        u64::from(self.first_record_offset)
            + u64::from(self.mobi_header_length)
            + PALMDOC_RECORD_HEADER_LEN
    }
}

/// Parsed EXTH block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExthRecords {
    /// Record count declared in the EXTH header
    pub declared_count: u32,
    /// Accepted records keyed by type code, last occurrence wins
    pub records: BTreeMap<u32, Vec<u8>>,
}

// ============================================================================
// LOW-LEVEL READS
// ============================================================================

/// Read up to `len` bytes at `offset`; a short file yields a short buffer
async fn read_window(file: &mut File, offset: u64, len: usize) -> io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = Vec::new();
    (&mut *file).take(len as u64).read_to_end(&mut buf).await?;
    Ok(buf)
}

fn be_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn be_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

// ============================================================================
// ZIP
// ============================================================================

/// Read the first four bytes as a little-endian integer
///
/// Returns [`ZIP_MAGIC_NONE`] if the file cannot be opened or is shorter
/// than four bytes. Never fails.
pub async fn read_zip_magic(path: &Path) -> u32 {
    let Ok(mut file) = File::open(path).await else {
        return ZIP_MAGIC_NONE;
    };

    match read_window(&mut file, 0, 4).await {
        Ok(buf) if buf.len() == 4 => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        _ => ZIP_MAGIC_NONE,
    }
}

/// Whether `magic` is one of the accepted ZIP signatures
pub fn is_zip_signature(magic: u32) -> bool {
    matches!(
        magic,
        ZIP_LOCAL_HEADER_MAGIC | ZIP_EMPTY_ARCHIVE_MAGIC | ZIP_SPANNED_MAGIC
    )
}

/// Check the ZIP signature of a file
pub async fn is_valid_zip(path: &Path) -> bool {
    is_zip_signature(read_zip_magic(path).await)
}

// ============================================================================
// PALMDOC / MOBI
// ============================================================================

/// Read the 8-byte PalmDB type/creator field
///
/// Returns `None` when fewer than [`PALMDB_HEADER_LEN`] bytes are present.
pub async fn read_type_creator(path: &Path) -> io::Result<Option<[u8; 8]>> {
    let mut file = File::open(path).await?;
    let buf = read_window(&mut file, 0, PALMDOC_PROBE_LEN).await?;

    if buf.len() < PALMDB_HEADER_LEN {
        return Ok(None);
    }

    let mut field = [0u8; 8];
    field.copy_from_slice(&buf[TYPE_CREATOR_OFFSET..TYPE_CREATOR_OFFSET + 8]);
    Ok(Some(field))
}

/// Decode the PalmDB and MOBI headers
///
/// # Errors
/// - [`DrmCheckError::InvalidHeader`] for files too small, truncated record 0,
///   or a missing `"MOBI"` signature
/// - [`DrmCheckError::Io`] if the file cannot be read
pub async fn read_mobi_header(path: &Path) -> Result<MobiHeaderInfo> {
    let mut file = File::open(path).await?;

    let container = read_window(&mut file, 0, CONTAINER_PROBE_LEN).await?;
    if container.len() < MOBI_HEADER_PROBE_LEN {
        return Err(DrmCheckError::invalid_header("File too small to be valid MOBI"));
    }

    let record_count = be_u16(&container, RECORD_COUNT_OFFSET);
    let first_record_offset = be_u32(&container, FIRST_RECORD_OFFSET);

    let mobi = read_window(&mut file, u64::from(first_record_offset), MOBI_HEADER_PROBE_LEN).await?;
    if mobi.len() < MOBI_HEADER_PROBE_LEN {
        return Err(DrmCheckError::invalid_header("Cannot read MOBI header"));
    }

    if &mobi[MOBI_SIGNATURE_OFFSET..MOBI_SIGNATURE_OFFSET + 4] != b"MOBI" {
        return Err(DrmCheckError::invalid_header("Invalid MOBI signature"));
    }

    Ok(MobiHeaderInfo {
        record_count,
        first_record_offset,
        mobi_header_length: be_u32(&mobi, MOBI_HEADER_LENGTH_OFFSET),
        drm_offset: be_u32(&mobi, DRM_OFFSET_OFFSET),
        drm_count: be_u32(&mobi, DRM_COUNT_OFFSET),
        drm_size: be_u32(&mobi, DRM_SIZE_OFFSET),
        drm_flags: be_u32(&mobi, DRM_FLAGS_OFFSET),
        has_exth: be_u32(&mobi, EXTH_FLAGS_OFFSET) & EXTH_PRESENT_FLAG != 0,
    })
}

/// Parse the EXTH block at `exth_offset`
///
/// Truncated or undersized trailing records are dropped without error.
///
/// # Errors
/// - [`DrmCheckError::InvalidHeader`] for a bad signature or a declared
///   length shorter than the EXTH header itself
/// - [`DrmCheckError::Io`] if the file cannot be read
pub async fn read_exth_records(path: &Path, exth_offset: u64) -> Result<ExthRecords> {
    let mut file = File::open(path).await?;

    let header = read_window(&mut file, exth_offset, EXTH_HEADER_LEN).await?;
    if header.len() < EXTH_HEADER_LEN || &header[0..4] != b"EXTH" {
        return Err(DrmCheckError::invalid_header("Invalid EXTH signature"));
    }

    let declared_length = be_u32(&header, 4) as usize;
    let declared_count = be_u32(&header, 8);
    if declared_length < EXTH_HEADER_LEN {
        return Err(DrmCheckError::invalid_header("Invalid EXTH length"));
    }

    let body = read_window(
        &mut file,
        exth_offset + EXTH_HEADER_LEN as u64,
        declared_length - EXTH_HEADER_LEN,
    )
    .await?;

    Ok(ExthRecords {
        declared_count,
        records: parse_exth_body(&body, declared_count),
    })
}

/// Walk the EXTH record stream
fn parse_exth_body(body: &[u8], declared_count: u32) -> BTreeMap<u32, Vec<u8>> {
    let mut records = BTreeMap::new();
    let mut offset = 0usize;

    for _ in 0..declared_count {
        if offset + EXTH_RECORD_HEADER_LEN >= body.len() {
            break;
        }

        let record_type = be_u32(body, offset);
        let record_len = be_u32(body, offset + 4) as usize;

        // A length below the record header cannot move the cursor forward
        if record_len < EXTH_RECORD_HEADER_LEN {
            break;
        }

        if record_len > EXTH_RECORD_HEADER_LEN && offset + record_len <= body.len() {
            let payload = &body[offset + EXTH_RECORD_HEADER_LEN..offset + record_len];
            records.insert(record_type, payload.to_vec());
        }

        offset += record_len;
    }

    records
}
