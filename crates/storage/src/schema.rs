// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed table layout and batch validation shared by every backend.

use crate::error::{Result, StoreError};
use llm_metrics_core::{CanonicalMetricRow, RunKey, METRICS_TABLE};
use std::collections::BTreeSet;

/// Table holding canonical rows.
pub const TABLE: &str = METRICS_TABLE;

/// Width of the `server` and `model_type` columns.
pub const KEY_COLUMN_WIDTH: usize = 50;

/// Rows per multi-row `INSERT`, well under every backend's bind limit.
pub(crate) const INSERT_CHUNK: usize = 500;

/// Data columns in insert order. `id` and `ingested_at` are store-assigned.
pub const COLUMNS: [&str; 16] = [
    "server",
    "date",
    "request_rate",
    "model_type",
    "dataset",
    "input_tokens",
    "output_tokens",
    "output_tokens_retokenized",
    "mean_latency",
    "median_latency",
    "median_ttft",
    "median_itl",
    "throughput",
    "duration",
    "completed_requests",
    "tokens_per_second",
];

/// Index name → indexed columns.
pub const INDEXES: [(&str, &str); 3] = [
    ("idx_llm_metrics_date", "date"),
    ("idx_llm_metrics_server", "server"),
    ("idx_llm_metrics_server_model", "server, model_type"),
];

/// `CREATE INDEX IF NOT EXISTS` statements for [`INDEXES`].
pub(crate) fn index_statements() -> Vec<String> {
    INDEXES
        .iter()
        .map(|(name, columns)| format!("CREATE INDEX IF NOT EXISTS {name} ON {TABLE} ({columns})"))
        .collect()
}

/// `INSERT INTO llm_metrics (...) ` prefix for a query builder.
pub(crate) fn insert_prefix() -> String {
    format!("INSERT INTO {TABLE} ({}) ", COLUMNS.join(", "))
}

/// Check every row's required fields before anything is written.
///
/// # Errors
///
/// Returns [`StoreError::SchemaViolation`] for the first offending row.
pub fn validate_batch(rows: &[CanonicalMetricRow]) -> Result<()> {
    for (index, row) in rows.iter().enumerate() {
        if let Some(reason) = violation(row) {
            return Err(StoreError::SchemaViolation {
                index,
                batch_size: rows.len(),
                run: format!(
                    "{}/{}/{}/{}",
                    row.server, row.date, row.request_rate, row.model_type
                ),
                reason,
            });
        }
    }
    Ok(())
}

fn violation(row: &CanonicalMetricRow) -> Option<String> {
    let server = row.server.as_str();
    if server.trim().is_empty() {
        return Some("server is missing".to_string());
    }
    if server.len() > KEY_COLUMN_WIDTH {
        return Some(format!("server exceeds {KEY_COLUMN_WIDTH} characters"));
    }
    if row.model_type.trim().is_empty() {
        return Some("model_type is missing".to_string());
    }
    if row.model_type.len() > KEY_COLUMN_WIDTH {
        return Some(format!("model_type exceeds {KEY_COLUMN_WIDTH} characters"));
    }
    if row.request_rate == 0 || i32::try_from(row.request_rate).is_err() {
        return Some(format!("request_rate {} is out of range", row.request_rate));
    }
    None
}

/// Whether `name` can be spliced into DDL as a database name.
pub(crate) fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Distinct natural keys of a batch.
pub(crate) fn run_keys(rows: &[CanonicalMetricRow]) -> BTreeSet<RunKey> {
    rows.iter().map(CanonicalMetricRow::run_key).collect()
}

/// Bind one row's columns, in [`COLUMNS`] order, onto a `push_values` separator.
///
/// Callers must have run [`validate_batch`]; `request_rate` is known to fit `i32`.
macro_rules! bind_row {
    ($builder:expr, $row:expr) => {{
        let row = $row;
        $builder
            .push_bind(row.server.as_str())
            .push_bind(row.date)
            .push_bind(i32::try_from(row.request_rate).unwrap_or(i32::MAX))
            .push_bind(row.model_type.as_str())
            .push_bind(row.dataset.as_deref())
            .push_bind(row.input_tokens)
            .push_bind(row.output_tokens)
            .push_bind(row.output_tokens_retokenized)
            .push_bind(row.mean_latency)
            .push_bind(row.median_latency)
            .push_bind(row.median_ttft)
            .push_bind(row.median_itl)
            .push_bind(row.throughput)
            .push_bind(row.duration)
            .push_bind(row.completed_requests)
            .push_bind(row.tokens_per_second);
    }};
}
pub(crate) use bind_row;
