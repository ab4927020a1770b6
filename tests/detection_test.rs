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


//! End-to-end detection tests over on-disk fixtures

mod helpers;

use ebook_drm_check::detector::keys;
use ebook_drm_check::{check_drm, ContainerFormat, DrmCategory, DrmDetector};
use helpers::{minimal_epub_entries, write_bytes, write_epub, MobiFixture};
use tempfile::TempDir;

#[tokio::test]
async fn test_minimal_epub_is_readable() {
    let dir = TempDir::new().unwrap();
    let path = write_epub(dir.path(), "clean.epub", &minimal_epub_entries());

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::NoDrm);
    assert!(!result.is_protected());
    assert_eq!(
        result.evidence().get(keys::OPF_PATH).and_then(|v| v.as_str()),
        Some("OEBPS/content.opf")
    );
    assert_eq!(
        result.evidence().get(keys::FORMAT).and_then(|v| v.as_str()),
        Some(ContainerFormat::Epub.as_str())
    );
}

#[tokio::test]
async fn test_epub_with_encryption_xml_is_adobe_drm() {
    let dir = TempDir::new().unwrap();
    let mut entries = minimal_epub_entries();
    entries.push(("META-INF/encryption.xml", "<encryption/>"));
    let path = write_epub(dir.path(), "locked.epub", &entries);

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::AdobeDrm);
    assert!(result.is_protected());
    assert!(result.evidence().contains_key(keys::ENCRYPTION_FILE));
}

#[tokio::test]
async fn test_epub_missing_opf_is_structurally_invalid() {
    let dir = TempDir::new().unwrap();
    let entries: Vec<_> = minimal_epub_entries()
        .into_iter()
        .filter(|(name, _)| !name.ends_with(".opf"))
        .collect();
    let path = write_epub(dir.path(), "broken.epub", &entries);

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::StructurallyInvalid);
    assert_eq!(result.reason(), "Missing OPF file: OEBPS/content.opf not found");
}

#[tokio::test]
async fn test_non_zip_epub_is_unsupported_not_drm() {
    let dir = TempDir::new().unwrap();
    let path = write_bytes(dir.path(), "fake.epub", b"<html>not an archive</html>");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::UnsupportedFormat);
    assert!(result.is_protected());
    assert_ne!(result.category(), DrmCategory::AdobeDrm);
}

#[tokio::test]
async fn test_zip_signature_with_garbage_body_is_adobe_drm() {
    let dir = TempDir::new().unwrap();
    let mut bytes = b"PK\x03\x04".to_vec();
    bytes.extend_from_slice(&[0xAB; 64]);
    let path = write_bytes(dir.path(), "mangled.epub", &bytes);

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::AdobeDrm);
    assert_eq!(result.reason(), "Encrypted or corrupted EPUB");
    assert!(result.evidence().contains_key(keys::ARCHIVE_ERROR));
}

#[tokio::test]
async fn test_mobi_sentinel_offset_is_clean() {
    let dir = TempDir::new().unwrap();
    let path = MobiFixture::default().write(dir.path(), "clean.mobi");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::NoDrm);
    assert_eq!(
        result.evidence().get(keys::DRM_OFFSET).and_then(|v| v.as_u64()),
        Some(0xFFFF_FFFF)
    );
}

#[tokio::test]
async fn test_mobi_drm_offset_is_amazon_drm() {
    let dir = TempDir::new().unwrap();
    let fixture = MobiFixture {
        drm_offset: 400,
        drm_count: 1,
        ..MobiFixture::default()
    };
    let path = fixture.write(dir.path(), "locked.azw3");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::AmazonDrm);
    assert_eq!(result.reason(), "DRM offset present");
    assert_eq!(
        result.evidence().get(keys::DRM_OFFSET).and_then(|v| v.as_u64()),
        Some(400)
    );
}

#[tokio::test]
async fn test_mobi_encrypted_flag_is_amazon_drm() {
    let dir = TempDir::new().unwrap();
    let fixture = MobiFixture {
        drm_flags: 1,
        ..MobiFixture::default()
    };
    let path = fixture.write(dir.path(), "flagged.azw");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::AmazonDrm);
    assert_eq!(result.reason(), "DRM flags set");
}

#[tokio::test]
async fn test_exth_book_type_marker_is_not_drm() {
    let dir = TempDir::new().unwrap();
    let path = MobiFixture::default()
        .with_exth(&[(501, &b"EBOK"[..])])
        .write(dir.path(), "ebok.mobi");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::NoDrm);
    assert_eq!(
        result.evidence().get(keys::HAS_EXTH).and_then(|v| v.as_bool()),
        Some(true)
    );
}

#[tokio::test]
async fn test_exth_key_payload_is_amazon_drm() {
    let dir = TempDir::new().unwrap();
    let path = MobiFixture::default()
        .with_exth(&[(100, &b"Some Author"[..]), (501, &b"USER_SPECIFIC_KEY_DATA_1234"[..])])
        .write(dir.path(), "keyed.mobi");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::AmazonDrm);
    assert!(result.reason().contains("501"), "{}", result.reason());

    let records = result.evidence().get(keys::DRM_RECORDS).unwrap();
    assert_eq!(records.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_bad_exth_signature_is_recorded_not_flagged() {
    let dir = TempDir::new().unwrap();
    let fixture = MobiFixture {
        exth: Some(b"NOPE\x00\x00\x00\x0c\x00\x00\x00\x00".to_vec()),
        ..MobiFixture::default()
    };
    let path = fixture.write(dir.path(), "odd.mobi");

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::NoDrm);
    assert_eq!(
        result.evidence().get(keys::EXTH_ERROR).and_then(|v| v.as_str()),
        Some("Invalid EXTH signature")
    );
}

#[tokio::test]
async fn test_mobi_without_signature_is_structurally_invalid() {
    let dir = TempDir::new().unwrap();
    let mut bytes = MobiFixture::default().to_bytes();
    bytes[256 + 16..256 + 20].copy_from_slice(b"XXXX");
    let path = write_bytes(dir.path(), "nosig.mobi", &bytes);

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::StructurallyInvalid);
    assert_eq!(result.reason(), "Invalid MOBI signature");
}

#[tokio::test]
async fn test_mobi_extension_with_wrong_type_is_unsupported() {
    let dir = TempDir::new().unwrap();
    let path = write_bytes(dir.path(), "text.mobi", &[b'a'; 512]);

    let result = check_drm(&path).await;
    assert_eq!(result.category(), DrmCategory::UnsupportedFormat);
}

#[tokio::test]
async fn test_missing_file_is_access_error() {
    let dir = TempDir::new().unwrap();
    let result = check_drm(dir.path().join("nowhere.azw3")).await;

    assert_eq!(result.category(), DrmCategory::AccessError);
    assert!(result.is_protected());
}

#[tokio::test]
async fn test_detection_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let epub = write_epub(dir.path(), "clean.epub", &minimal_epub_entries());
    let mobi = MobiFixture {
        drm_offset: 400,
        drm_count: 1,
        ..MobiFixture::default()
    }
    .write(dir.path(), "locked.mobi");

    let detector = DrmDetector::new();
    for path in [&epub, &mobi] {
        let first = detector.check_drm(path).await;
        let second = detector.check_drm(path).await;
        assert_eq!(first, second);
    }
}

#[tokio::test]
async fn test_concurrent_checks_share_one_detector() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<_> = (0..8)
        .map(|i| write_epub(dir.path(), &format!("book{}.epub", i), &minimal_epub_entries()))
        .collect();

    let detector = DrmDetector::new();
    let results = futures_util::future::join_all(paths.iter().map(|p| detector.check_drm(p))).await;
    assert!(results.iter().all(|r| r.category() == DrmCategory::NoDrm));
}
