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


//! `ebook-drm-check` command line tool
//!
//! ```text
//! ebook-drm-check ~/Books -o report.csv -c 16
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use ebook_drm_check::{
    ReportFormat, Reporter, ScanConfig, ScanProgress, ScanSummary, Scanner,
    DEFAULT_CONCURRENCY,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const PROGRESS_NAME_CHARS: usize = 40;

#[derive(Parser, Debug)]
#[command(
    name = "ebook-drm-check",
    version,
    about = "Detect DRM-protected EPUB, MOBI, AZW and AZW3 files"
)]
struct Cli {
    /// Directory to scan for eBook files
    directory: PathBuf,

    /// Only scan the top-level directory
    #[arg(long)]
    no_recursive: bool,

    /// Write the report to a file instead of the console
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format (overridden by the output file extension)
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Txt)]
    format: ReportFormat,

    /// Number of files checked at the same time
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Debug logging and a log line for every protected file
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "ebook_drm_check=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_summary(summary: &ScanSummary) {
    println!("\nSummary:");
    println!("  Total eBook files: {}", summary.total);
    println!("  DRM-protected: {}", summary.protected);
    println!("  Readable: {}", summary.readable);
    if summary.errors > 0 {
        println!("  Errors: {}", summary.errors);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let metadata = tokio::fs::metadata(&cli.directory)
        .await
        .with_context(|| format!("cannot access {}", cli.directory.display()))?;
    if !metadata.is_dir() {
        bail!("{} is not a directory", cli.directory.display());
    }

    let config = ScanConfig::default()
        .with_recursive(!cli.no_recursive)
        .with_concurrency(cli.concurrency)
        .with_verbose(cli.verbose);

    let reporter = Reporter::new(cli.format);
    let scanner = Scanner::new(config)?.with_progress(Arc::new(|progress: ScanProgress| {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r\x1b[2K[{}/{}] {:5.1}% {}",
            progress.completed,
            progress.total,
            progress.percentage,
            progress.display_name(PROGRESS_NAME_CHARS)
        );
        if progress.is_complete() {
            let _ = writeln!(stderr);
        }
    }));

    println!("Scanning directory: {}", cli.directory.display());
    println!(
        "Options: recursive={}, concurrency={}, format={}",
        scanner.config().recursive,
        scanner.config().concurrency,
        reporter.format()
    );

    let results = scanner
        .scan(&cli.directory)
        .await
        .with_context(|| format!("scan of {} failed", cli.directory.display()))?;

    match &cli.output {
        Some(output) => {
            let written = reporter
                .save_to_file(&results, output)
                .await
                .with_context(|| format!("cannot write report to {}", output.display()))?;
            println!("\nReport ({}) saved to: {}", written, output.display());
        }
        None => reporter.print_to_console(&results)?,
    }

    print_summary(&ScanSummary::from_results(&results));
    Ok(())
}
