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


//! MOBI / AZW / AZW3 DRM analysis
//!
//! Two independent checks:
//!
//! 1. **Header fields** - DRM offset/count, flags and size in the MOBI header.
//! 2. **EXTH records** - DRM-related metadata records (401-407, 501).
//!
//! Either check can flag the file. The header check runs first, so its reason
//! wins when both fire; evidence from both is kept.
//!
//! Plain presence of a DRM record type over-flags clean books: Kindle
//! tooling writes book-type tags (`EBOK`, `PDOC`) into 501 and zero padding
//! into the 40x range. The suppression thresholds below were tuned against
//! real libraries and must stay as they are.

use super::evidence::{keys, Evidence};
use super::result::{DetectionResult, DrmCategory};
use crate::format::{ExthRecords, MobiHeaderInfo};
use serde_json::{json, Value};

// ============================================================================
// HEADER FIELD THRESHOLDS
// ============================================================================

/// "No DRM block" marker for offset and size fields
pub const DRM_SENTINEL: u32 = 0xFFFF_FFFF;
/// Bit 0 of the DRM flags word marks an encrypted book
pub const DRM_FLAG_ENCRYPTED: u32 = 0x01;
/// A key blob is larger than this; smaller sizes are header noise
pub const MIN_DRM_BLOB_SIZE: u32 = 32;
/// A key blob is smaller than this; larger sizes are garbage
pub const MAX_DRM_BLOB_SIZE: u32 = 10_000;

// ============================================================================
// EXTH THRESHOLDS
// ============================================================================

/// CDE content type record
pub const EXTH_CDE_TYPE: u32 = 501;
/// DRM-related EXTH record types (strict list)
pub const DRM_EXTH_TYPES: &[u32] = &[401, 402, 403, 404, 405, 406, 407, EXTH_CDE_TYPE];
/// 501 payloads shorter than this are book-type tags
pub const MIN_CDE_PAYLOAD_LEN: usize = 10;
/// 401-407 payloads shorter than this are flags, not key material
pub const MIN_DRM_PAYLOAD_LEN: usize = 8;
/// Bytes below this are control characters
pub const CONTROL_BYTE_LIMIT: u8 = 32;
/// Characters of decoded text kept in evidence
pub const PREVIEW_CHARS: usize = 50;
/// Payload bytes kept as hex in evidence
pub const PREVIEW_HEX_BYTES: usize = 16;

/// Book-type markers that appear in DRM record slots on clean files
const BOOK_TYPE_MARKERS: &[&str] = &["d", "EBOK", "PDOC"];

/// Human label for a DRM-related EXTH record type
pub fn exth_label(record_type: u32) -> &'static str {
    match record_type {
        401 => "Clipping limit",
        402 => "Publisher limit",
        404 => "Text-to-speech flag",
        405 => "Rental flag",
        406 => "Rental expiration",
        403 | 407 => "Unknown DRM field",
        501 => "CDE content type",
        _ => "Unknown",
    }
}

/// An EXTH record that survived suppression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrmRecord {
    pub record_type: u32,
    pub label: &'static str,
    pub size: usize,
    pub preview: String,
    pub hex: String,
}

impl DrmRecord {
    fn from_payload(record_type: u32, payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        Self {
            record_type,
            label: exth_label(record_type),
            size: payload.len(),
            preview: text.chars().take(PREVIEW_CHARS).collect(),
            hex: hex::encode(&payload[..payload.len().min(PREVIEW_HEX_BYTES)]),
        }
    }

    fn to_value(&self) -> Value {
        json!({
            "type": self.record_type,
            "label": self.label,
            "size": self.size,
            "preview": self.preview,
            "hex": self.hex,
        })
    }
}

// ============================================================================
// HEADER FIELD CHECK
// ============================================================================

/// Outcome of the header-field check
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFieldVerdict {
    /// Reason when DRM was found
    pub reason: Option<&'static str>,
    /// Raw field values, recorded whatever the verdict
    pub evidence: Evidence,
}

/// Inspect the DRM fields of the MOBI header
pub fn check_header_fields(info: &MobiHeaderInfo) -> HeaderFieldVerdict {
    let evidence = Evidence::new()
        .with(keys::DRM_OFFSET, info.drm_offset)
        .with(keys::DRM_COUNT, info.drm_count)
        .with(keys::DRM_SIZE, info.drm_size)
        .with(keys::DRM_FLAGS, info.drm_flags);

    let reason = if info.drm_offset != 0 && info.drm_offset != DRM_SENTINEL && info.drm_count > 0 {
        Some("DRM offset present")
    } else if info.drm_flags & DRM_FLAG_ENCRYPTED != 0 {
        Some("DRM flags set")
    } else if info.drm_size > 0
        && info.drm_size < DRM_SENTINEL
        && info.drm_size > MIN_DRM_BLOB_SIZE
        && info.drm_size < MAX_DRM_BLOB_SIZE
    {
        Some("DRM size present")
    } else {
        None
    };

    HeaderFieldVerdict { reason, evidence }
}

// ============================================================================
// EXTH CHECK
// ============================================================================

/// Whether a DRM-typed record is benign filler
fn is_suppressed(record_type: u32, payload: &[u8]) -> bool {
    let text = String::from_utf8_lossy(payload);
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return true;
    }
    if BOOK_TYPE_MARKERS.contains(&trimmed) {
        return true;
    }
    // Zero padding
    if payload.iter().all(|&b| b == 0) {
        return true;
    }
    if record_type == EXTH_CDE_TYPE && payload.len() < MIN_CDE_PAYLOAD_LEN {
        return true;
    }
    if (401..=407).contains(&record_type)
        && (payload.len() < MIN_DRM_PAYLOAD_LEN
            || payload.iter().all(|&b| b < CONTROL_BYTE_LIMIT))
    {
        return true;
    }

    false
}

/// Collect DRM-related EXTH records that survive suppression
pub fn check_exth_records(exth: &ExthRecords) -> Vec<DrmRecord> {
    exth.records
        .iter()
        .filter(|&(record_type, payload)| {
            DRM_EXTH_TYPES.contains(record_type) && !is_suppressed(*record_type, payload)
        })
        .map(|(record_type, payload)| DrmRecord::from_payload(*record_type, payload))
        .collect()
}

// ============================================================================
// MERGE
// ============================================================================

/// Combine header and EXTH findings into one verdict
pub fn analyze(info: &MobiHeaderInfo, exth: Option<&ExthRecords>) -> DetectionResult {
    let header = check_header_fields(info);

    let mut evidence = header
        .evidence
        .with(keys::RECORD_COUNT, info.record_count)
        .with(keys::FIRST_RECORD_OFFSET, info.first_record_offset)
        .with(keys::MOBI_HEADER_LENGTH, info.mobi_header_length)
        .with(keys::HAS_EXTH, info.has_exth);

    let drm_records = exth.map(check_exth_records).unwrap_or_default();
    if let Some(exth) = exth {
        evidence.insert(keys::EXTH_OFFSET, info.exth_offset());
        evidence.insert(keys::EXTH_RECORD_COUNT, exth.declared_count);
    }
    if !drm_records.is_empty() {
        evidence.insert(
            keys::DRM_RECORDS,
            Value::Array(drm_records.iter().map(DrmRecord::to_value).collect()),
        );
    }

    let result = match header.reason {
        Some(reason) => DetectionResult::new(DrmCategory::AmazonDrm, reason),
        None if !drm_records.is_empty() => {
            let types: Vec<String> = drm_records.iter().map(|r| r.record_type.to_string()).collect();
            DetectionResult::new(
                DrmCategory::AmazonDrm,
                format!("DRM EXTH records found (types {})", types.join(", ")),
            )
        }
        None => DetectionResult::no_drm(),
    };

    result.with_evidence(evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn header(drm_offset: u32, drm_count: u32, drm_size: u32, drm_flags: u32) -> MobiHeaderInfo {
        MobiHeaderInfo {
            record_count: 3,
            first_record_offset: 256,
            mobi_header_length: 232,
            drm_offset,
            drm_count,
            drm_size,
            drm_flags,
            has_exth: false,
        }
    }

    fn exth(records: &[(u32, &[u8])]) -> ExthRecords {
        ExthRecords {
            declared_count: records.len() as u32,
            records: records
                .iter()
                .map(|(t, p)| (*t, p.to_vec()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_sentinel_offset_is_not_drm() {
        let verdict = check_header_fields(&header(DRM_SENTINEL, 0, 0, 0));
        assert_eq!(verdict.reason, None);
        assert_eq!(verdict.evidence.get(keys::DRM_OFFSET), Some(&json!(0xFFFF_FFFFu32)));
    }

    #[test]
    fn test_sentinel_offset_with_count_is_not_drm() {
        let verdict = check_header_fields(&header(DRM_SENTINEL, 1, 0, 0));
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_drm_offset_present() {
        let result = analyze(&header(400, 1, 0, 0), None);
        assert_eq!(result.category(), DrmCategory::AmazonDrm);
        assert_eq!(result.reason(), "DRM offset present");
        assert_eq!(result.evidence().get(keys::DRM_OFFSET), Some(&json!(400)));
    }

    #[test]
    fn test_drm_offset_without_count_falls_through() {
        let verdict = check_header_fields(&header(400, 0, 0, 0));
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_drm_flags_set() {
        let verdict = check_header_fields(&header(DRM_SENTINEL, 0, 0, 0x03));
        assert_eq!(verdict.reason, Some("DRM flags set"));

        let verdict = check_header_fields(&header(DRM_SENTINEL, 0, 0, 0x02));
        assert_eq!(verdict.reason, None);
    }

    #[test]
    fn test_drm_size_range() {
        assert_eq!(check_header_fields(&header(0, 0, 32, 0)).reason, None);
        assert_eq!(check_header_fields(&header(0, 0, 33, 0)).reason, Some("DRM size present"));
        assert_eq!(check_header_fields(&header(0, 0, 9_999, 0)).reason, Some("DRM size present"));
        assert_eq!(check_header_fields(&header(0, 0, 10_000, 0)).reason, None);
        assert_eq!(check_header_fields(&header(0, 0, DRM_SENTINEL, 0)).reason, None);
    }

    #[test]
    fn test_exth_book_type_markers_suppressed() {
        let records = exth(&[(501, &b"EBOK"[..]), (501, &b"PDOC"[..])]);
        assert!(check_exth_records(&records).is_empty());

        let records = exth(&[(403, &b"d"[..])]);
        assert!(check_exth_records(&records).is_empty());
    }

    #[test]
    fn test_exth_cde_key_data_flags() {
        let records = exth(&[(501, &b"USER_SPECIFIC_KEY_DATA_1234"[..])]);
        let found = check_exth_records(&records);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].record_type, 501);
        assert_eq!(found[0].label, "CDE content type");
        assert_eq!(found[0].size, 27);
        assert_eq!(found[0].preview, "USER_SPECIFIC_KEY_DATA_1234");
    }

    #[test]
    fn test_exth_short_cde_payload_suppressed() {
        let records = exth(&[(501, &b"SHORTVAL1"[..])]);
        assert!(check_exth_records(&records).is_empty());
    }

    #[test]
    fn test_exth_zero_padding_and_whitespace_suppressed() {
        let records = exth(&[(401, &[0u8; 16][..]), (402, &b"          "[..]), (406, &b"\t\n  "[..])]);
        assert!(check_exth_records(&records).is_empty());
    }

    #[test]
    fn test_exth_40x_control_bytes_suppressed() {
        let records = exth(&[(404, &[1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10][..]), (405, &b"ABCDEFG"[..])]);
        assert!(check_exth_records(&records).is_empty());
    }

    #[test]
    fn test_exth_40x_printable_payload_flags() {
        let records = exth(&[(402, &b"publisher-limit-blob"[..])]);
        let found = check_exth_records(&records);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].label, "Publisher limit");
    }

    #[test]
    fn test_exth_non_drm_types_ignored() {
        let records = exth(&[(100, &b"Some Author Name"[..]), (450, &b"loose-range-value"[..])]);
        assert!(check_exth_records(&records).is_empty());
    }

    #[test]
    fn test_exth_preview_truncated_to_fifty_chars() {
        let payload = "K".repeat(80);
        let records = exth(&[(501, payload.as_bytes())]);
        let found = check_exth_records(&records);

        assert_eq!(found[0].preview.chars().count(), PREVIEW_CHARS);
        assert_eq!(found[0].size, 80);
        assert_eq!(found[0].hex.len(), PREVIEW_HEX_BYTES * 2);
    }

    #[test]
    fn test_analyze_exth_only() {
        let mut info = header(DRM_SENTINEL, 0, 0, 0);
        info.has_exth = true;
        let records = exth(&[(501, &b"USER_SPECIFIC_KEY_DATA_1234"[..])]);

        let result = analyze(&info, Some(&records));
        assert_eq!(result.category(), DrmCategory::AmazonDrm);
        assert!(result.reason().contains("EXTH records"));
        assert!(result.evidence().contains_key(keys::DRM_RECORDS));
        assert_eq!(result.evidence().get(keys::EXTH_OFFSET), Some(&json!(256 + 232 + 16)));
    }

    #[test]
    fn test_analyze_header_reason_wins_and_exth_evidence_kept() {
        let mut info = header(0, 0, 0, 1);
        info.has_exth = true;
        let records = exth(&[(501, &b"USER_SPECIFIC_KEY_DATA_1234"[..])]);

        let result = analyze(&info, Some(&records));
        assert_eq!(result.reason(), "DRM flags set");
        assert!(result.evidence().contains_key(keys::DRM_RECORDS));
    }

    #[test]
    fn test_analyze_clean_book() {
        let mut info = header(DRM_SENTINEL, 0, 0, 0);
        info.has_exth = true;
        let records = exth(&[(100, &b"Author"[..]), (501, &b"EBOK"[..])]);

        let result = analyze(&info, Some(&records));
        assert_eq!(result.category(), DrmCategory::NoDrm);
        assert!(!result.is_protected());
        assert!(!result.evidence().contains_key(keys::DRM_RECORDS));
        assert_eq!(result.evidence().get(keys::DRM_FLAGS), Some(&json!(0)));
    }
}
