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


//! DRM detection
//!
//! [`DrmDetector::check_drm`] routes one file through the format sniffer and
//! exactly one analyzer:
//!
//! ```text
//! stat ──► detect_format ──┬─ epub ──► ZIP pre-check ──► epub::analyze_epub
//!                          ├─ mobi/azw/azw3 ──► read_mobi_header ──► mobi::analyze
//!                          │                        └─ has EXTH ──► read_exth_records
//!                          └─ unknown ──► UnsupportedFormat
//! ```
//!
//! # Policy
//! Fail closed. A file is only reported readable when an analyzer positively
//! confirms it. Structural defects become `StructurallyInvalid`; I/O failures
//! and unexpected archive errors become `AccessError` and are never
//! re-labelled as DRM.

pub mod epub;
pub mod evidence;
pub mod mobi;
pub mod result;

pub use evidence::{keys, Evidence};
pub use result::{DetectionResult, DrmCategory};

use crate::error::{DrmCheckError, Result};
use crate::format::{self, header, ContainerFormat};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// Stateless DRM detector
///
/// Holds no per-file state, so one instance can serve any number of
/// concurrent [`DrmDetector::check_drm`] calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrmDetector;

impl DrmDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classify a single file
    ///
    /// Never fails; every error is folded into the returned verdict.
    ///
    /// # Example
    /// ```no_run
    /// # async fn example() {
    /// use ebook_drm_check::DrmDetector;
    ///
    /// let result = DrmDetector::new().check_drm("library/book.epub").await;
    /// println!("{}: {}", result.category(), result.reason());
    /// # }
    /// ```
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn check_drm(&self, path: impl AsRef<Path>) -> DetectionResult {
        let path = path.as_ref();

        match self.try_check(path).await {
            Ok(result) => {
                debug!(category = ?result.category(), reason = result.reason(), "detection finished");
                result
            }
            Err(err) => {
                warn!(error = %err, "detection failed, reporting access error");
                let message = match err {
                    DrmCheckError::Io(io) => io.to_string(),
                    other => other.to_string(),
                };
                DetectionResult::access_error(message)
            }
        }
    }

    async fn try_check(&self, path: &Path) -> Result<DetectionResult> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(DrmCheckError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let format = format::detect_format(path).await;

        let mut result = match format {
            ContainerFormat::Epub => self.check_epub(path).await?,
            ContainerFormat::Mobi | ContainerFormat::Azw3 | ContainerFormat::Azw => {
                self.check_mobi(path).await?
            }
            ContainerFormat::Unknown => DetectionResult::new(
                DrmCategory::UnsupportedFormat,
                "Unsupported or corrupted file format",
            ),
        };

        result.evidence_mut().insert(keys::FORMAT, format.as_str());
        Ok(result)
    }

    async fn check_epub(&self, path: &Path) -> Result<DetectionResult> {
        // The file may have changed since sniffing
        if !header::is_valid_zip(path).await {
            return Ok(DetectionResult::new(
                DrmCategory::StructurallyInvalid,
                "Invalid ZIP structure: file is not a valid ZIP archive",
            ));
        }

        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = std::fs::File::open(&owned)?;
            epub::analyze_epub(BufReader::new(file))
        })
        .await?
    }

    async fn check_mobi(&self, path: &Path) -> Result<DetectionResult> {
        let info = match header::read_mobi_header(path).await {
            Ok(info) => info,
            Err(err) if err.is_structural() => {
                return Ok(DetectionResult::new(DrmCategory::StructurallyInvalid, err.to_string()));
            }
            Err(err) => return Err(err),
        };

        if !info.has_exth {
            return Ok(mobi::analyze(&info, None));
        }

        match header::read_exth_records(path, info.exth_offset()).await {
            Ok(exth) => Ok(mobi::analyze(&info, Some(&exth))),
            Err(err) if err.is_structural() => {
                debug!(exth_offset = info.exth_offset(), error = %err, "EXTH block unusable");
                let mut result = mobi::analyze(&info, None);
                result.evidence_mut().insert(keys::EXTH_ERROR, err.to_string());
                Ok(result)
            }
            Err(err) => Err(err),
        }
    }
}

/// Classify a single file with a default [`DrmDetector`]
pub async fn check_drm(path: impl AsRef<Path>) -> DetectionResult {
    DrmDetector::new().check_drm(path).await
}
