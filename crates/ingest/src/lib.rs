//! Ingestion pipeline for LLM benchmark runs.
//!
//! This crate takes raw benchmark output from an archive or a directory of
//! run files to a combined, summarized metrics table and a durable dataset.
//!
//! # Quick Start
//!
//! ```no_run
//! use llm_metrics_ingest::{process_archive, io::DatasetFormat};
//! use std::path::Path;
//!
//! let batch = process_archive(
//!     Path::new("benchmark_files.zip"),
//!     Path::new("./extracted_files"),
//!     "2024-12".parse().unwrap(),
//! )?;
//! let path = llm_metrics_ingest::io::write_dataset(
//!     &batch.aggregation.table,
//!     Path::new("./processed_data"),
//!     DatasetFormat::Csv,
//! )?;
//! println!("{} rows written to {}", batch.aggregation.table.len(), path.display());
//! # Ok::<(), llm_metrics_ingest::IngestError>(())
//! ```
//!
//! # Modules
//!
//! - [`archive`] - Safe archive extraction
//! - [`batch`] - Run-file discovery and per-file processing
//! - [`io`] - Dataset reading and writing
//! - [`markdown`] - Markdown summary generation

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod archive;
pub mod batch;
pub mod error;
pub mod io;
pub mod markdown;

pub use archive::{extract_archive, ArchiveFormat, ExtractedArchive};
pub use batch::{ingest_directory, BatchReport, FileOutcome, FileReport, IngestedBatch};
pub use error::{IngestError, Result};

use llm_metrics_core::{aggregate, Aggregation, RunPeriod};
use std::path::Path;

/// A fully processed ingestion batch.
#[derive(Debug, Clone)]
pub struct ProcessedBatch {
    /// Combined table and grouped summary.
    pub aggregation: Aggregation,
    /// Per-file outcomes.
    pub report: BatchReport,
}

/// Ingest and aggregate every run file below `root`.
///
/// # Errors
///
/// Returns [`IngestError::NoData`] when no file produced a row, or
/// [`IngestError::Io`] when `root` cannot be walked.
pub fn process_directory(root: &Path, period: RunPeriod) -> Result<ProcessedBatch> {
    let batch = ingest_directory(root, period)?;
    if batch.rows.is_empty() {
        return Err(batch.report.no_data());
    }
    let aggregation = aggregate(batch.rows)?;
    Ok(ProcessedBatch {
        aggregation,
        report: batch.report,
    })
}

/// Extract `archive` into `extract_dir`, then ingest and aggregate it.
///
/// # Errors
///
/// Returns [`IngestError::Archive`] when extraction fails, otherwise the
/// errors of [`process_directory`].
pub fn process_archive(
    archive: &Path,
    extract_dir: &Path,
    period: RunPeriod,
) -> Result<ProcessedBatch> {
    let extracted = extract_archive(archive, extract_dir)?;
    process_directory(&extracted.root, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_process_directory_without_files_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let err = process_directory(dir.path(), "2024-12".parse().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::NoData {
                files_seen: 0,
                files_failed: 0,
                records_skipped: 0
            }
        ));
    }

    #[test]
    fn test_process_directory_with_only_bad_files_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sglang_xx_8.jsonl"), "{}\n").unwrap();
        fs::write(dir.path().join("sglang_05_8.jsonl"), "not json\n").unwrap();
        let err = process_directory(dir.path(), "2024-12".parse().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            IngestError::NoData {
                files_seen: 2,
                files_failed: 2,
                records_skipped: 1
            }
        ));
    }
}
