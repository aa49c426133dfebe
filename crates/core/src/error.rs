// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error kinds raised by the normalization and aggregation core.

use thiserror::Error;

/// Errors that can occur while decoding run files and aggregating rows.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The run filename does not follow `<server>_<day>_<rate>[_<model_type>]`.
    #[error("malformed filename '{name}': {reason}")]
    MalformedFilename {
        /// The offending filename.
        name: String,
        /// Which part of the grammar was violated.
        reason: String,
    },

    /// A single JSONL record could not be decoded.
    #[error("record parse error at line {line}: {reason}")]
    RecordParse {
        /// 1-based line number within the run file.
        line: usize,
        /// Decoder message.
        reason: String,
    },

    /// A run file yielded no usable records.
    #[error("run file produced no usable records ({skipped} skipped)")]
    EmptyFile {
        /// Number of records that failed to decode.
        skipped: usize,
    },

    /// Aggregation was asked to combine zero rows.
    #[error("no data: aggregation requires at least one row")]
    NoData,

    /// The caller-supplied month/year context is not usable.
    #[error("invalid run period '{0}': expected YYYY-MM")]
    InvalidPeriod(String),
}

impl CoreError {
    /// Build a [`CoreError::MalformedFilename`].
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CoreError::MalformedFilename {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
