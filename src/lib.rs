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


//! DRM detection for eBook libraries
//!
//! Classifies EPUB, MOBI, AZW and AZW3 files as openly readable or
//! protected by inspecting their container structure. Nothing is decrypted
//! and no file is modified.
//!
//! # Modules
//! - [`format`] - extension and magic-byte sniffing, PalmDOC/MOBI/EXTH header readers
//! - [`detector`] - EPUB and MOBI analyzers plus the [`DrmDetector`] orchestrator
//! - [`scanner`] - bounded-concurrency directory scans
//! - [`report`] - JSON, CSV, text and console reports
//!
//! # Example
//! ```no_run
//! # async fn example() -> ebook_drm_check::Result<()> {
//! use ebook_drm_check::{Reporter, ScanConfig, Scanner};
//!
//! let scanner = Scanner::new(ScanConfig::default().with_concurrency(4))?;
//! let results = scanner.scan("/srv/library").await?;
//! println!("{}", Reporter::default().generate_txt(&results));
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod detector;
pub mod error;
pub mod format;
pub mod report;
pub mod scanner;

// Re-export commonly used types for convenience
pub use config::{ScanConfig, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use detector::{check_drm, DetectionResult, DrmCategory, DrmDetector, Evidence};
pub use error::{DrmCheckError, Result};
pub use format::ContainerFormat;
pub use report::{ReportFormat, Reporter};
pub use scanner::{ProgressCallback, ScanProgress, ScanResult, ScanSummary, Scanner};
