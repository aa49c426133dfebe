// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run-file discovery and per-file processing for one ingestion batch.
//!
//! Failures are scoped: a bad record is skipped inside its file, a bad file
//! is recorded in the [`BatchReport`] and the batch moves on. Only a batch
//! that yields no rows at all fails, with [`IngestError::NoData`].

use crate::error::{IngestError, Result};
use llm_metrics_core::{
    normalize_run, resolve_run_key, CanonicalMetricRow, CoreError, NormalizedFile, RunFileName,
    RunPeriod, RUN_FILE_EXTENSION,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Outcome of processing one run file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file yielded rows.
    Processed {
        /// Rows produced.
        rows: usize,
        /// Records skipped.
        skipped: usize,
    },
    /// The file was rejected as a whole.
    Failed {
        /// Human-readable cause.
        reason: String,
        /// Records skipped before the file was rejected.
        skipped: usize,
    },
}

/// Per-file entry of a [`BatchReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Run file path.
    pub path: PathBuf,
    /// What happened to it.
    pub outcome: FileOutcome,
}

/// Counts and per-file outcomes of one ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// One entry per discovered run file, in processing order.
    pub files: Vec<FileReport>,
}

impl BatchReport {
    /// Run files discovered.
    pub fn files_seen(&self) -> usize {
        self.files.len()
    }

    /// Run files that produced rows.
    pub fn files_processed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.outcome, FileOutcome::Processed { .. }))
            .count()
    }

    /// Run files that were rejected.
    pub fn files_failed(&self) -> usize {
        self.files_seen() - self.files_processed()
    }

    /// Rows produced across all files.
    pub fn rows(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Processed { rows, .. } => rows,
                FileOutcome::Failed { .. } => 0,
            })
            .sum()
    }

    /// Records skipped across all files.
    pub fn records_skipped(&self) -> usize {
        self.files
            .iter()
            .map(|f| match f.outcome {
                FileOutcome::Processed { skipped, .. } | FileOutcome::Failed { skipped, .. } => {
                    skipped
                }
            })
            .sum()
    }

    /// The [`IngestError::NoData`] describing this report.
    pub fn no_data(&self) -> IngestError {
        IngestError::NoData {
            files_seen: self.files_seen(),
            files_failed: self.files_failed(),
            records_skipped: self.records_skipped(),
        }
    }
}

/// Rows and report of one ingestion sweep.
#[derive(Debug, Clone, Default)]
pub struct IngestedBatch {
    /// Canonical rows in file order, then line order.
    pub rows: Vec<CanonicalMetricRow>,
    /// Per-file outcomes.
    pub report: BatchReport,
}

/// Find every `*.jsonl` file below `root`, sorted by path.
///
/// # Errors
///
/// Returns [`IngestError::Io`] when the directory cannot be walked.
pub fn discover_run_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            IngestError::io(path, e.into())
        })?;
        let is_run_file = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(RUN_FILE_EXTENSION);
        if is_run_file {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Decode one run file into canonical rows.
///
/// # Errors
///
/// Returns [`CoreError::MalformedFilename`] or [`CoreError::EmptyFile`]
/// wrapped in [`IngestError::Core`], or [`IngestError::Io`] when the file
/// cannot be read.
pub fn process_run_file(path: &Path, period: RunPeriod) -> Result<NormalizedFile> {
    let name = RunFileName::from_path(path)?;
    let key = resolve_run_key(&name, period)?;
    let contents = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    Ok(normalize_run(&contents, &key)?)
}

/// Process every run file below `root`.
///
/// Never fails because of an individual file; inspect
/// [`IngestedBatch::report`] for per-file outcomes.
///
/// # Errors
///
/// Returns [`IngestError::Io`] when `root` cannot be walked.
#[tracing::instrument(skip_all, fields(root = %root.display(), %period))]
pub fn ingest_directory(root: &Path, period: RunPeriod) -> Result<IngestedBatch> {
    let paths = discover_run_files(root)?;
    info!(files = paths.len(), "found run files");

    let mut batch = IngestedBatch::default();
    for path in paths {
        let outcome = match process_run_file(&path, period) {
            Ok(normalized) => {
                let rows = normalized.rows.len();
                let skipped = normalized.skipped.len();
                for record in normalized.skipped {
                    let err = CoreError::from(record);
                    warn!(file = %path.display(), %err, "skipped record");
                }
                info!(file = %path.display(), rows, skipped, "processed run file");
                batch.rows.extend(normalized.rows);
                FileOutcome::Processed { rows, skipped }
            }
            Err(err) => {
                let skipped = match &err {
                    IngestError::Core(CoreError::EmptyFile { skipped }) => *skipped,
                    _ => 0,
                };
                warn!(file = %path.display(), %err, "run file failed");
                FileOutcome::Failed {
                    reason: err.to_string(),
                    skipped,
                }
            }
        };
        batch.report.files.push(FileReport { path, outcome });
    }

    info!(
        files_processed = batch.report.files_processed(),
        files_failed = batch.report.files_failed(),
        rows = batch.report.rows(),
        records_skipped = batch.report.records_skipped(),
        "ingestion sweep complete"
    );
    Ok(batch)
}
