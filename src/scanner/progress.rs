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


//! Scan progress tracking and reporting

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Scan progress information
///
/// Passed to progress callbacks after every finished file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Files checked so far
    pub completed: usize,

    /// Files discovered for this scan
    pub total: usize,

    /// Name of the file that just finished
    pub current_file: String,

    /// Progress as a percentage (0.0 - 100.0)
    pub percentage: f64,
}

impl ScanProgress {
    /// Create a new progress report
    pub fn new(completed: usize, total: usize, current_file: impl Into<String>) -> Self {
        let percentage = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Self {
            completed,
            total,
            current_file: current_file.into(),
            percentage,
        }
    }

    /// Check if every discovered file has been checked
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total && self.total > 0
    }

    /// Get progress as a fraction (0.0 - 1.0)
    pub fn as_fraction(&self) -> f64 {
        self.percentage / 100.0
    }

    /// File name shortened for a single status line
    pub fn display_name(&self, max_chars: usize) -> String {
        if self.current_file.chars().count() <= max_chars {
            self.current_file.clone()
        } else {
            let head: String = self.current_file.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self::new(0, 0, String::new())
    }
}

/// Type alias for progress callback functions
///
/// Uses Arc instead of Box so the scanner stays Clone
pub type ProgressCallback = Arc<dyn Fn(ScanProgress) + Send + Sync>;
