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


//! Batch scanning of eBook libraries
//!
//! Finds candidate files by extension, then runs the detector over them with
//! at most [`ScanConfig::concurrency`] checks in flight. The bound keeps the
//! number of open file descriptors and buffered archive directories in check
//! on large libraries.
//!
//! Results are independent of each other; they are sorted by path before
//! being returned so reports are stable between runs.

pub mod progress;

pub use progress::{ProgressCallback, ScanProgress};

use crate::config::ScanConfig;
use crate::detector::{DetectionResult, DrmCategory, DrmDetector};
use crate::error::Result;
use crate::format::extension_of;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Outcome of checking one file during a scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub file_path: PathBuf,
    pub file_name: String,
    pub file_size: u64,
    pub result: DetectionResult,
    /// Set when the file could not be stat'ed or read
    pub error: Option<String>,
    pub check_time: DateTime<Utc>,
}

impl ScanResult {
    pub fn is_protected(&self) -> bool {
        self.result.is_protected()
    }

    /// Not protected and no error
    pub fn is_readable(&self) -> bool {
        !self.is_protected() && self.error.is_none()
    }
}

/// Aggregate counts over a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub protected: usize,
    pub readable: usize,
    pub errors: usize,
}

impl ScanSummary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        Self {
            total: results.len(),
            protected: results.iter().filter(|r| r.is_protected()).count(),
            readable: results.iter().filter(|r| r.is_readable()).count(),
            errors: results.iter().filter(|r| r.error.is_some()).count(),
        }
    }
}

/// Directory scanner
#[derive(Clone)]
pub struct Scanner {
    config: ScanConfig,
    detector: DrmDetector,
    progress_callback: Option<ProgressCallback>,
}

impl Scanner {
    /// Create a scanner
    ///
    /// # Errors
    /// Returns [`crate::DrmCheckError::InvalidConfig`] if `config` is out of range
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detector: DrmDetector::new(),
            progress_callback: None,
        })
    }

    /// Register a callback invoked after each checked file
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Find candidate files under `directory`
    ///
    /// A subdirectory that cannot be listed, or that fails part-way through
    /// listing, is skipped with a warning. Only a failure on `directory`
    /// itself is an error.
    pub async fn find_ebook_files(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        let (mut files, mut pending) = self.list_directory(directory).await?;

        while let Some(dir) = pending.pop() {
            match self.list_directory(&dir).await {
                Ok((dir_files, subdirs)) => {
                    files.extend(dir_files);
                    pending.extend(subdirs);
                }
                Err(err) => {
                    warn!(directory = %dir.display(), error = %err, "cannot access directory, skipping");
                }
            }
        }

        files.sort();
        debug!(directory = %directory.display(), count = files.len(), "discovered eBook files");
        Ok(files)
    }

    /// Candidate files and (when recursive) subdirectories of one directory
    async fn list_directory(&self, dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut files = Vec::new();
        let mut subdirs = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if file_type.is_dir() {
                if self.config.recursive {
                    subdirs.push(path);
                }
            } else if file_type.is_file()
                && extension_of(&path).is_some_and(|ext| self.config.accepts_extension(&ext))
            {
                files.push(path);
            }
        }

        Ok((files, subdirs))
    }

    /// Check a single file and attach scan metadata
    pub async fn check_file(&self, path: &Path) -> ScanResult {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (file_size, result, error) = match tokio::fs::metadata(path).await {
            Ok(metadata) => {
                let result = self.detector.check_drm(path).await;
                // Read failures are errors, not verdicts
                let error = (result.category() == DrmCategory::AccessError)
                    .then(|| result.reason().to_string());
                (metadata.len(), result, error)
            }
            Err(err) => {
                let message = err.to_string();
                (0, DetectionResult::access_error(message.clone()), Some(message))
            }
        };

        if self.config.verbose && result.is_protected() && error.is_none() {
            info!(file = %file_name, category = %result.category(), reason = result.reason(), "DRM detected");
        }

        ScanResult {
            file_path: path.to_path_buf(),
            file_name,
            file_size,
            result,
            error,
            check_time: Utc::now(),
        }
    }

    /// Scan `directory` and check every candidate file
    pub async fn scan(&self, directory: impl AsRef<Path>) -> Result<Vec<ScanResult>> {
        let directory = directory.as_ref();
        let files = self.find_ebook_files(directory).await?;
        if files.is_empty() {
            info!(directory = %directory.display(), "no eBook files found");
            return Ok(Vec::new());
        }

        let total = files.len();
        info!(total, concurrency = self.config.concurrency, "checking eBook files");

        let completed = AtomicUsize::new(0);
        let mut results: Vec<ScanResult> = stream::iter(files)
            .map(|path| {
                let completed = &completed;
                async move {
                    let scanned = self.check_file(&path).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(callback) = &self.progress_callback {
                        callback(ScanProgress::new(done, total, scanned.file_name.clone()));
                    }
                    scanned
                }
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        results.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        Ok(results)
    }
}
