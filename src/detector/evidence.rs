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


//! Diagnostic evidence attached to a verdict
//!
//! Evidence is for audit only; no code path branches on it. Each analysis
//! stage adds named keys from [`keys`].

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Evidence keys, grouped by the stage that writes them
pub mod keys {
    // ------------------------------------------------------------------------
    // Every result
    // ------------------------------------------------------------------------
    /// Sniffed container format
    pub const FORMAT: &str = "format";

    // ------------------------------------------------------------------------
    // EPUB analyzer
    // ------------------------------------------------------------------------
    pub const ENCRYPTION_FILE: &str = "encryption_file";
    pub const RIGHTS_FILE: &str = "rights_file";
    /// Entry names matching the suspicious-name patterns
    pub const SUSPICIOUS_FILES: &str = "suspicious_files";
    /// Archive open failure message
    pub const ARCHIVE_ERROR: &str = "archive_error";
    /// container.xml read failure message
    pub const CONTAINER_ERROR: &str = "container_error";
    pub const CONTAINER_VALID: &str = "container_valid";
    pub const OPF_PATH: &str = "opf_path";

    // ------------------------------------------------------------------------
    // MOBI analyzer
    // ------------------------------------------------------------------------
    pub const RECORD_COUNT: &str = "record_count";
    pub const FIRST_RECORD_OFFSET: &str = "first_record_offset";
    pub const MOBI_HEADER_LENGTH: &str = "mobi_header_length";
    pub const DRM_OFFSET: &str = "drm_offset";
    pub const DRM_COUNT: &str = "drm_count";
    pub const DRM_SIZE: &str = "drm_size";
    pub const DRM_FLAGS: &str = "drm_flags";
    pub const HAS_EXTH: &str = "has_exth";
    pub const EXTH_OFFSET: &str = "exth_offset";
    pub const EXTH_RECORD_COUNT: &str = "exth_record_count";
    /// Surviving DRM-related EXTH records
    pub const DRM_RECORDS: &str = "drm_records";
    pub const EXTH_ERROR: &str = "exth_error";

    // ------------------------------------------------------------------------
    // Access errors
    // ------------------------------------------------------------------------
    pub const ERROR: &str = "error";
}

/// Ordered key/value facts supporting a verdict
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Evidence(BTreeMap<String, Value>);

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a fact
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Builder form of [`Evidence::insert`]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Copy every fact from `other`, overwriting duplicates
    pub fn merge(&mut self, other: Evidence) {
        self.0.extend(other.0);
    }
}
