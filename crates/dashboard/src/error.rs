// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dashboard export errors.

use thiserror::Error;

/// Errors that can occur while exporting a dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The dashboard service answered with a non-success status.
    #[error("dashboard service returned {status}: {body}")]
    ExternalService {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The request could not be sent or the response could not be read.
    #[error("dashboard request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Client settings are unusable.
    #[error("invalid dashboard configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for dashboard operations.
pub type Result<T> = std::result::Result<T, DashboardError>;
