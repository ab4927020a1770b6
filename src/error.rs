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


//! Error types shared across the crate
//!
//! Detection itself never fails: [`crate::detector::DrmDetector::check_drm`]
//! folds every error into a [`crate::detector::DetectionResult`]. The error
//! type is used by the lower layers (header reader, analyzers, scanner,
//! reporter) and tells the orchestrator *which kind* of failure happened so
//! structural defects and I/O failures land in different categories.

use thiserror::Error;

/// Errors produced while reading or classifying eBook files
#[derive(Error, Debug)]
pub enum DrmCheckError {
    /// File system failure (open, read, seek, stat)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive failure that is not a recognized corruption/encryption signal
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Binary header failed a structural check
    ///
    /// The message is shown to the user as-is, so it carries no prefix.
    #[error("{0}")]
    InvalidHeader(String),

    /// Configuration value out of its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Caller supplied something that cannot be scanned
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Report serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blocking worker panicked or was cancelled
    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl DrmCheckError {
    /// Shorthand for a structural header defect
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader(message.into())
    }

    /// True when the error describes a malformed file rather than a failed read
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::InvalidHeader(_))
    }
}

impl From<tokio::task::JoinError> for DrmCheckError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskFailed(err.to_string())
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, DrmCheckError>;
