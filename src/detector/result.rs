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


//! Detection verdict types

use super::evidence::{keys, Evidence};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of verdict a file received
///
/// Only [`DrmCategory::NoDrm`] means the file is safe to read as-is.
/// Everything else is treated as protected, including files we simply
/// could not confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DrmCategory {
    /// Openly readable
    NoDrm,
    /// Adobe ADEPT markers, suspicious license entries, or an unreadable archive
    AdobeDrm,
    /// Kindle DRM header fields or DRM EXTH records
    AmazonDrm,
    /// File claims a format but fails its required structure
    StructurallyInvalid,
    /// Extension and magic bytes match no known container
    UnsupportedFormat,
    /// File could not be read at all
    AccessError,
}

impl DrmCategory {
    /// Fail-closed: anything but a confirmed clean file is protected
    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::NoDrm)
    }

    /// Label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoDrm => "No DRM",
            Self::AdobeDrm => "Adobe DRM",
            Self::AmazonDrm => "Amazon DRM",
            Self::StructurallyInvalid => "Structurally invalid",
            Self::UnsupportedFormat => "Unsupported or corrupted file format",
            Self::AccessError => "File access error",
        }
    }
}

impl fmt::Display for DrmCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Verdict for one file
///
/// `is_protected` is derived from `category` at construction and cannot be
/// set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    is_protected: bool,
    category: DrmCategory,
    reason: String,
    evidence: Evidence,
}

impl DetectionResult {
    pub fn new(category: DrmCategory, reason: impl Into<String>) -> Self {
        Self {
            is_protected: category.is_protected(),
            category,
            reason: reason.into(),
            evidence: Evidence::new(),
        }
    }

    /// Clean verdict
    pub fn no_drm() -> Self {
        Self::new(DrmCategory::NoDrm, "No DRM detected")
    }

    /// I/O-level failure, carrying the raw error text
    pub fn access_error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(DrmCategory::AccessError, message.clone())
            .with_evidence(Evidence::new().with(keys::ERROR, message))
    }

    /// Merge `evidence` into this result
    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.merge(evidence);
        self
    }

    pub fn is_protected(&self) -> bool {
        self.is_protected
    }

    pub fn category(&self) -> DrmCategory {
        self.category
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }

    pub fn evidence_mut(&mut self) -> &mut Evidence {
        &mut self.evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_follows_category() {
        assert!(!DetectionResult::no_drm().is_protected());

        for category in [
            DrmCategory::AdobeDrm,
            DrmCategory::AmazonDrm,
            DrmCategory::StructurallyInvalid,
            DrmCategory::UnsupportedFormat,
            DrmCategory::AccessError,
        ] {
            assert!(DetectionResult::new(category, "x").is_protected(), "{:?}", category);
        }
    }

    #[test]
    fn test_access_error_keeps_raw_message() {
        let result = DetectionResult::access_error("No such file or directory (os error 2)");
        assert_eq!(result.category(), DrmCategory::AccessError);
        assert_eq!(result.reason(), "No such file or directory (os error 2)");
        assert!(result.evidence().contains_key(keys::ERROR));
    }

    #[test]
    fn test_serialized_shape() {
        let result = DetectionResult::new(DrmCategory::AmazonDrm, "DRM flags set");
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["is_protected"], true);
        assert_eq!(value["category"], "AmazonDrm");
        assert_eq!(value["reason"], "DRM flags set");
        assert!(value["evidence"].is_object());
    }
}
