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


//! Fixture builders for integration tests
//!
//! Produces minimal EPUB archives and PalmDOC/MOBI files on disk so the
//! detector can be exercised end to end without shipping binary samples.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

pub const CONTENT_OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0"></package>"#;

/// Entries of the smallest EPUB the detector accepts as clean
pub fn minimal_epub_entries() -> Vec<(&'static str, &'static str)> {
    vec![
        ("mimetype", "application/epub+zip"),
        ("META-INF/container.xml", CONTAINER_XML),
        ("OEBPS/content.opf", CONTENT_OPF),
    ]
}

/// Write a stored (uncompressed) ZIP archive
pub fn write_epub(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for (entry, content) in entries {
        writer.start_file(*entry, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// Raw bytes written as-is
pub fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, bytes).unwrap();
    path
}

/// MOBI header fields a fixture can vary
#[derive(Debug, Clone)]
pub struct MobiFixture {
    pub drm_offset: u32,
    pub drm_count: u32,
    pub drm_size: u32,
    pub drm_flags: u32,
    pub exth: Option<Vec<u8>>,
}

impl Default for MobiFixture {
    fn default() -> Self {
        Self {
            drm_offset: 0xFFFF_FFFF,
            drm_count: 0,
            drm_size: 0,
            drm_flags: 0,
            exth: None,
        }
    }
}

const RECORD0: usize = 256;
const MOBI_HEADER_LEN: u32 = 232;

impl MobiFixture {
    pub fn with_exth(mut self, records: &[(u32, &[u8])]) -> Self {
        self.exth = Some(exth_block(records));
        self
    }

    /// PalmDB header, one record, MOBI header at 256, EXTH right after
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; 1024];
        buf[0..9].copy_from_slice(b"Test Book");
        buf[60..68].copy_from_slice(b"BOOKMOBI");
        buf[76..78].copy_from_slice(&1u16.to_be_bytes());
        buf[78..82].copy_from_slice(&(RECORD0 as u32).to_be_bytes());

        let r0 = RECORD0;
        buf[r0 + 16..r0 + 20].copy_from_slice(b"MOBI");
        buf[r0 + 20..r0 + 24].copy_from_slice(&MOBI_HEADER_LEN.to_be_bytes());
        buf[r0 + 168..r0 + 172].copy_from_slice(&self.drm_offset.to_be_bytes());
        buf[r0 + 172..r0 + 176].copy_from_slice(&self.drm_count.to_be_bytes());
        buf[r0 + 176..r0 + 180].copy_from_slice(&self.drm_size.to_be_bytes());
        buf[r0 + 180..r0 + 184].copy_from_slice(&self.drm_flags.to_be_bytes());

        if let Some(exth) = &self.exth {
            buf[r0 + 128..r0 + 132].copy_from_slice(&0x40u32.to_be_bytes());
            let start = r0 + 16 + MOBI_HEADER_LEN as usize;
            buf.truncate(start);
            buf.extend_from_slice(exth);
            buf.resize(buf.len().max(1024), 0);
        }
        buf
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        write_bytes(dir, name, &self.to_bytes())
    }
}

/// EXTH block with a correct length and record count
pub fn exth_block(records: &[(u32, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (record_type, payload) in records {
        body.extend_from_slice(&record_type.to_be_bytes());
        body.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
        body.extend_from_slice(payload);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"EXTH");
    out.extend_from_slice(&((body.len() + 12) as u32).to_be_bytes());
    out.extend_from_slice(&(records.len() as u32).to_be_bytes());
    out.extend_from_slice(&body);
    out
}
