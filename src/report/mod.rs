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


//! Scan reports
//!
//! Renders a list of [`ScanResult`]s as JSON, CSV or plain text, or prints a
//! grouped overview to the console.

pub mod format;

pub use format::{escape_csv, format_file_size, ReportFormat};

use crate::detector::{DrmCategory, Evidence};
use crate::error::Result;
use crate::scanner::{ScanResult, ScanSummary};
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

const CSV_HEADERS: [&str; 9] = [
    "File Name",
    "File Path",
    "File Size (Bytes)",
    "File Size",
    "DRM Protected",
    "DRM Type",
    "Reason",
    "Error",
    "Check Time",
];

// ============================================================================
// JSON report shape
// ============================================================================

#[derive(Serialize)]
struct JsonReport<'a> {
    scan_date: DateTime<Utc>,
    summary: ScanSummary,
    files: Vec<JsonFileEntry<'a>>,
}

#[derive(Serialize)]
struct JsonFileEntry<'a> {
    file_name: &'a str,
    file_path: String,
    file_size: u64,
    file_size_formatted: String,
    is_protected: bool,
    category: DrmCategory,
    drm_type: &'static str,
    reason: &'a str,
    evidence: &'a Evidence,
    error: Option<&'a str>,
    check_time: DateTime<Utc>,
}

impl<'a> From<&'a ScanResult> for JsonFileEntry<'a> {
    fn from(scanned: &'a ScanResult) -> Self {
        Self {
            file_name: &scanned.file_name,
            file_path: scanned.file_path.display().to_string(),
            file_size: scanned.file_size,
            file_size_formatted: format_file_size(scanned.file_size),
            is_protected: scanned.is_protected(),
            category: scanned.result.category(),
            drm_type: scanned.result.category().label(),
            reason: scanned.result.reason(),
            evidence: scanned.result.evidence(),
            error: scanned.error.as_deref(),
            check_time: scanned.check_time,
        }
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Report renderer
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Render `results` in the given format
    pub fn render(&self, results: &[ScanResult], format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Json => self.generate_json(results),
            ReportFormat::Csv => Ok(self.generate_csv(results)),
            ReportFormat::Txt => Ok(self.generate_txt(results)),
        }
    }

    pub fn generate_json(&self, results: &[ScanResult]) -> Result<String> {
        let report = JsonReport {
            scan_date: Utc::now(),
            summary: ScanSummary::from_results(results),
            files: results.iter().map(JsonFileEntry::from).collect(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn generate_csv(&self, results: &[ScanResult]) -> String {
        let mut lines = Vec::with_capacity(results.len() + 1);
        lines.push(CSV_HEADERS.join(","));

        for scanned in results {
            let row = [
                escape_csv(&scanned.file_name),
                escape_csv(&scanned.file_path.display().to_string()),
                scanned.file_size.to_string(),
                escape_csv(&format_file_size(scanned.file_size)),
                if scanned.is_protected() { "Yes" } else { "No" }.to_string(),
                escape_csv(scanned.result.category().label()),
                escape_csv(scanned.result.reason()),
                escape_csv(scanned.error.as_deref().unwrap_or("")),
                escape_csv(&scanned.check_time.to_rfc3339()),
            ];
            lines.push(row.join(","));
        }

        lines.join("\n")
    }

    pub fn generate_txt(&self, results: &[ScanResult]) -> String {
        let summary = ScanSummary::from_results(results);
        let mut lines = vec![
            "eBook DRM Check Report".to_string(),
            "=".repeat(50),
            format!("Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
            String::new(),
            "SUMMARY:".to_string(),
            format!("  Total eBook files: {}", summary.total),
            format!("  DRM-protected: {}", summary.protected),
            format!("  Readable: {}", summary.readable),
            format!("  Errors: {}", summary.errors),
            String::new(),
        ];

        let protected: Vec<&ScanResult> = results
            .iter()
            .filter(|r| r.is_protected() && r.error.is_none())
            .collect();
        if !protected.is_empty() {
            lines.push("DRM-PROTECTED FILES:".to_string());
            lines.push("-".repeat(30));
            for (index, scanned) in protected.iter().enumerate() {
                lines.push(format!("{}. {}", index + 1, scanned.file_name));
                lines.push(format!("   Path: {}", scanned.file_path.display()));
                lines.push(format!("   Size: {}", format_file_size(scanned.file_size)));
                lines.push(format!("   DRM Type: {}", scanned.result.category()));
                lines.push(format!("   Reason: {}", scanned.result.reason()));
                lines.push(String::new());
            }
        }

        let errors: Vec<&ScanResult> = results.iter().filter(|r| r.error.is_some()).collect();
        if !errors.is_empty() {
            lines.push("FILES WITH ERRORS:".to_string());
            lines.push("-".repeat(30));
            for (index, scanned) in errors.iter().enumerate() {
                lines.push(format!("{}. {}", index + 1, scanned.file_name));
                lines.push(format!("   Path: {}", scanned.file_path.display()));
                lines.push(format!("   Error: {}", scanned.error.as_deref().unwrap_or_default()));
                lines.push(String::new());
            }
        }

        if summary.readable > 0 {
            lines.push("READABLE FILES:".to_string());
            lines.push("-".repeat(30));
            lines.push(format!(
                "{} files are readable and not DRM-protected.",
                summary.readable
            ));
            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// Write a report to `output`
    ///
    /// A `.json`, `.csv` or `.txt` extension on `output` takes precedence over
    /// the configured format. Returns the format actually written.
    pub async fn save_to_file(
        &self,
        results: &[ScanResult],
        output: impl AsRef<Path>,
    ) -> Result<ReportFormat> {
        let output = output.as_ref();
        let format = ReportFormat::from_path_extension(output).unwrap_or(self.format);
        let content = self.render(results, format)?;

        tokio::fs::write(output, content).await?;
        debug!(path = %output.display(), %format, files = results.len(), "report written");
        Ok(format)
    }

    /// Grouped overview for a terminal
    pub fn write_console<W: Write>(&self, results: &[ScanResult], out: &mut W) -> io::Result<()> {
        writeln!(out, "\nScan Results:\n")?;

        if results.is_empty() {
            writeln!(out, "No eBook files found.")?;
            return Ok(());
        }

        let protected = results.iter().filter(|r| r.is_protected() && r.error.is_none());
        for (index, scanned) in protected.enumerate() {
            if index == 0 {
                writeln!(out, "DRM-Protected Files:")?;
            }
            writeln!(out, "  {}. {}", index + 1, scanned.file_name)?;
            writeln!(out, "     Path: {}", scanned.file_path.display())?;
            writeln!(out, "     Size: {}", format_file_size(scanned.file_size))?;
            writeln!(out, "     DRM Type: {}", scanned.result.category())?;
            writeln!(out, "     Reason: {}", scanned.result.reason())?;
            writeln!(out)?;
        }
        let readable = results.iter().filter(|r| r.is_readable()).count();
        if readable > 0 {
            writeln!(out, "Readable Files: {}", readable)?;
            writeln!(out)?;
        }

        let errors = results.iter().filter_map(|r| r.error.as_deref().map(|e| (r, e)));
        for (index, (scanned, error)) in errors.enumerate() {
            if index == 0 {
                writeln!(out, "Files with Errors:")?;
            }
            writeln!(out, "  {}. {}", index + 1, scanned.file_name)?;
            writeln!(out, "     Error: {}", error)?;
            writeln!(out)?;
        }

        Ok(())
    }

    pub fn print_to_console(&self, results: &[ScanResult]) -> io::Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        self.write_console(results, &mut handle)
    }
}
