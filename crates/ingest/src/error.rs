// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Errors raised while extracting archives, ingesting run files and writing datasets.

use llm_metrics_core::CoreError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The archive could not be read, or an entry would land outside the target.
    #[error("archive error for '{path}': {reason}")]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Filename grammar, record or aggregation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A full batch produced zero usable rows.
    #[error(
        "no data: {files_seen} run files found, {files_failed} failed, \
         {records_skipped} records skipped"
    )]
    NoData {
        /// Run files discovered.
        files_seen: usize,
        /// Run files that failed.
        files_failed: usize,
        /// Records skipped across all files.
        records_skipped: usize,
    },

    /// The tabular dataset could not be written or read.
    #[error("dataset error for '{path}': {reason}")]
    Dataset {
        /// Dataset file or directory.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Filesystem failure.
    #[error("I/O error for '{path}': {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

impl IngestError {
    pub(crate) fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IngestError::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn dataset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IngestError::Dataset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
