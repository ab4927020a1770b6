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


//! Scanner configuration
//!
//! | Field         | Default                    | Valid range                  |
//! |---------------|----------------------------|------------------------------|
//! | `recursive`   | `true`                     |                              |
//! | `concurrency` | `10`                       | `1..=256`                    |
//! | `verbose`     | `false`                    |                              |
//! | `extensions`  | `epub, mobi, azw3, azw`    | non-empty, no leading dot    |

use crate::error::{DrmCheckError, Result};
use crate::format::SUPPORTED_EXTENSIONS;
use serde::{Deserialize, Serialize};

/// Default number of files checked at once
pub const DEFAULT_CONCURRENCY: usize = 10;
/// Upper bound on concurrent checks; each one holds an open file descriptor
pub const MAX_CONCURRENCY: usize = 256;

/// Batch scan options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Descend into subdirectories
    pub recursive: bool,
    /// Maximum number of files checked at the same time
    pub concurrency: usize,
    /// Log every protected file as it is found
    pub verbose: bool,
    /// Lower-case file extensions (without dot) to pick up
    pub extensions: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            concurrency: DEFAULT_CONCURRENCY,
            verbose: false,
            extensions: SUPPORTED_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ScanConfig {
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Reject values outside their documented range
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(DrmCheckError::InvalidConfig(format!(
                "concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }

        if self.extensions.is_empty() {
            return Err(DrmCheckError::InvalidConfig(
                "at least one file extension is required".to_string(),
            ));
        }

        if let Some(bad) = self.extensions.iter().find(|e| e.is_empty() || e.starts_with('.')) {
            return Err(DrmCheckError::InvalidConfig(format!(
                "extension {:?} must be non-empty and given without a leading dot",
                bad
            )));
        }

        Ok(())
    }

    /// Whether `extension` (already lower-cased) is scanned
    pub fn accepts_extension(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }
}
