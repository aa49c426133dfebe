// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage errors.

use thiserror::Error;

/// Errors that can occur while provisioning or writing the metrics store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A row in the batch is missing a required field; nothing was written.
    #[error(
        "schema violation in row {index} of {batch_size} ({run}): {reason}; no rows were written"
    )]
    SchemaViolation {
        /// 0-based position of the offending row in the batch.
        index: usize,
        /// Rows in the rejected batch.
        batch_size: usize,
        /// `server/date/request_rate/model_type` of the offending row.
        run: String,
        /// Which requirement was violated.
        reason: String,
    },

    /// The relational store rejected an operation.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store URL or options are not usable.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
