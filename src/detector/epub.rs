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


//! EPUB DRM analysis
//!
//! # Rules (first match wins)
//! 1. `META-INF/encryption.xml` - Adobe ADEPT font/content encryption
//! 2. `META-INF/rights.xml` - Adobe ADEPT rights file
//! 3. Entry names hinting at licenses (`.acsm`, `drm`, `license`)
//! 4. - 9. Container structure: `container.xml` must exist, be readable and
//!    non-empty, look like an OCF container, and point at an OPF that exists
//!
//! An archive the `zip` crate refuses to open because it is malformed or
//! encrypted is itself treated as DRM evidence. Any other archive failure is
//! returned to the caller.
//!
//! # References
//! - EPUB Open Container Format 3.3, section 4.2 (`META-INF` reserved files)

use super::evidence::{keys, Evidence};
use super::result::{DetectionResult, DrmCategory};
use crate::error::Result;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{Read, Seek};
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

pub const ENCRYPTION_XML: &str = "META-INF/encryption.xml";
pub const RIGHTS_XML: &str = "META-INF/rights.xml";
pub const CONTAINER_XML: &str = "META-INF/container.xml";

/// OCF container namespace
pub const CONTAINER_NAMESPACE: &str = "urn:oasis:names:tc:opendocument:xmlns:container";
/// OPF package media type
pub const OPF_MEDIA_TYPE: &str = "application/oebps-package+xml";

lazy_static! {
    static ref OPF_FULL_PATH: Regex =
        Regex::new(r#"full-path=["']([^"']+\.opf)["']"#).expect("OPF full-path pattern is valid");
}

/// Entry names that hint at a license or DRM payload
pub fn is_suspicious_entry(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains(".acsm")
        || lower.contains("drm")
        || lower.contains("license")
        || lower.ends_with(".epub.acsm")
}

/// Pull the first `full-path="….opf"` value out of container.xml
pub fn extract_opf_path(container: &str) -> Option<String> {
    OPF_FULL_PATH
        .captures(container)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Analyze an EPUB archive
///
/// # Errors
/// Archive failures other than a malformed or encrypted structure
/// (for example an I/O error mid-read) are returned unclassified.
pub fn analyze_epub<R: Read + Seek>(reader: R) -> Result<DetectionResult> {
    let mut archive = match ZipArchive::new(reader) {
        Ok(archive) => archive,
        Err(err @ (ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_))) => {
            debug!(error = %err, "archive rejected, treating as encrypted or corrupted");
            return Ok(DetectionResult::new(DrmCategory::AdobeDrm, "Encrypted or corrupted EPUB")
                .with_evidence(Evidence::new().with(keys::ARCHIVE_ERROR, err.to_string())));
        }
        Err(err) => return Err(err.into()),
    };

    let names: Vec<String> = archive.file_names().map(str::to_owned).collect();

    if let Some(result) = screen_entries(&names) {
        return Ok(result);
    }

    if !names.iter().any(|n| n == CONTAINER_XML) {
        return Ok(DetectionResult::new(
            DrmCategory::StructurallyInvalid,
            "Missing container.xml",
        ));
    }

    let container = match read_entry(&mut archive, CONTAINER_XML) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) => {
            return Ok(DetectionResult::new(
                DrmCategory::StructurallyInvalid,
                "Unreadable container.xml",
            )
            .with_evidence(Evidence::new().with(keys::CONTAINER_ERROR, err.to_string())));
        }
    };

    Ok(check_container(&container, &names))
}

/// Rules 1-3: DRM marker entries
fn screen_entries(names: &[String]) -> Option<DetectionResult> {
    if names.iter().any(|n| n == ENCRYPTION_XML) {
        return Some(
            DetectionResult::new(DrmCategory::AdobeDrm, "Adobe DRM (encryption.xml found)")
                .with_evidence(Evidence::new().with(keys::ENCRYPTION_FILE, true)),
        );
    }

    if names.iter().any(|n| n == RIGHTS_XML) {
        return Some(
            DetectionResult::new(DrmCategory::AdobeDrm, "Adobe DRM (rights.xml found)")
                .with_evidence(Evidence::new().with(keys::RIGHTS_FILE, true)),
        );
    }

    let mut suspicious: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| is_suspicious_entry(n))
        .collect();
    if !suspicious.is_empty() {
        suspicious.sort_unstable();
        return Some(
            DetectionResult::new(DrmCategory::AdobeDrm, "Suspicious DRM files detected")
                .with_evidence(Evidence::new().with(keys::SUSPICIOUS_FILES, suspicious)),
        );
    }

    None
}

/// Rules 6-10: container.xml content and the OPF it references
fn check_container(container: &str, names: &[String]) -> DetectionResult {
    if container.is_empty() {
        return DetectionResult::new(DrmCategory::StructurallyInvalid, "Empty container.xml");
    }

    if !container.contains(CONTAINER_NAMESPACE) && !container.contains(OPF_MEDIA_TYPE) {
        return DetectionResult::new(DrmCategory::StructurallyInvalid, "Invalid container.xml");
    }

    let Some(opf_path) = extract_opf_path(container) else {
        return DetectionResult::new(
            DrmCategory::StructurallyInvalid,
            "container.xml does not reference an OPF file",
        );
    };

    if !names.iter().any(|n| *n == opf_path) {
        return DetectionResult::new(
            DrmCategory::StructurallyInvalid,
            format!("Missing OPF file: {} not found", opf_path),
        )
        .with_evidence(Evidence::new().with(keys::OPF_PATH, opf_path));
    }

    DetectionResult::no_drm().with_evidence(
        Evidence::new()
            .with(keys::CONTAINER_VALID, true)
            .with(keys::OPF_PATH, opf_path),
    )
}

fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
) -> std::result::Result<Vec<u8>, ZipError> {
    let mut entry = archive.by_name(name)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}
