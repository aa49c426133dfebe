// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Relational persistence for canonical benchmark rows.
//!
//! A [`MetricsStore`] provisions the fixed `llm_metrics` table and appends
//! batches to it all-or-nothing: the whole batch is validated before any
//! row is written, and rows are inserted inside one transaction.
//!
//! Three backends are provided: [`PostgresStore`] and [`MySqlStore`] for
//! shared deployments and [`SqliteStore`] for local runs. [`open_store`]
//! picks one from the URL scheme.
//!
//! Stores build their connection pools lazily, but the pools belong to the
//! Tokio runtime: construct them from within a runtime context.
//!
//! # Duplicate handling
//!
//! Appending a batch never looks at rows from earlier batches unless the
//! store is configured with [`DuplicatePolicy::ReplaceRunKeys`], which first
//! deletes stored rows sharing a natural key with the new batch.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod error;
pub mod mysql;
pub mod postgres;
pub mod schema;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use mysql::MySqlStore;
pub use postgres::PostgresStore;
pub use schema::validate_batch;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use llm_metrics_core::CanonicalMetricRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What `append` does about rows already stored for the same run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Insert unconditionally; re-ingesting a period duplicates its rows.
    #[default]
    Append,
    /// Delete stored rows whose `(server, date, request_rate, model_type)`
    /// appears in the batch, then insert, in one transaction.
    ReplaceRunKeys,
}

impl FromStr for DuplicatePolicy {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "append" => Ok(Self::Append),
            "replace_run_keys" | "replace" => Ok(Self::ReplaceRunKeys),
            other => Err(StoreError::InvalidConfig(format!(
                "unknown duplicate policy '{other}' (expected append or replace_run_keys)"
            ))),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Append => "append",
            Self::ReplaceRunKeys => "replace_run_keys",
        })
    }
}

/// Backend-independent store settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Handling of rows already stored for a run in the batch.
    pub duplicate_policy: DuplicatePolicy,
    /// Create the database (PostgreSQL) or file (SQLite) when missing.
    pub create_database: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Append,
            create_database: true,
        }
    }
}

/// Rows touched by one `append` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Rows inserted.
    pub inserted: u64,
    /// Previously stored rows deleted under [`DuplicatePolicy::ReplaceRunKeys`].
    pub replaced: u64,
}

/// Per-`(server, model_type)` totals of everything in the store.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct StoredSummary {
    /// Producer identifier.
    pub server: String,
    /// Cache mode or `"default"`.
    pub model_type: String,
    /// Stored rows.
    pub count: i64,
    /// Mean `median_latency`.
    pub avg_latency: Option<f64>,
    /// Mean `throughput`.
    pub avg_throughput: Option<f64>,
}

/// A relational store for canonical rows.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Create the database (where the backend supports it), the table and
    /// its indexes if absent. Never alters an existing table.
    async fn ensure_schema(&self) -> Result<()>;

    /// Insert every row of `rows`, or none of them.
    ///
    /// Fails with [`StoreError::SchemaViolation`] before writing anything
    /// when a row is missing a required field.
    async fn append(&self, rows: &[CanonicalMetricRow]) -> Result<AppendOutcome>;

    /// Stored row counts and means grouped by `(server, model_type)`.
    async fn summarize(&self) -> Result<Vec<StoredSummary>>;
}

/// SQL shared by [`MetricsStore::summarize`] implementations.
pub(crate) const SUMMARY_QUERY: &str = "SELECT server, model_type, COUNT(*) AS count, \
     AVG(median_latency) AS avg_latency, AVG(throughput) AS avg_throughput \
     FROM llm_metrics GROUP BY server, model_type ORDER BY server, model_type";

/// Open a store from a URL: `postgres://` / `postgresql://`, `mysql://` or
/// `sqlite:`.
///
/// The connection is established lazily on first use. Must be called from
/// within a Tokio runtime; the pool spawns its maintenance task there.
///
/// # Errors
///
/// Returns [`StoreError::InvalidConfig`] for unsupported schemes and
/// [`StoreError::Database`] for malformed URLs.
pub fn open_store(url: &str, options: StoreOptions) -> Result<Box<dyn MetricsStore>> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(Box::new(PostgresStore::connect_lazy(url, options)?))
    } else if url.starts_with("mysql://") {
        Ok(Box::new(MySqlStore::connect_lazy(url, options)?))
    } else if url.starts_with("sqlite:") {
        Ok(Box::new(SqliteStore::connect_lazy(url, options)?))
    } else {
        Err(StoreError::InvalidConfig(
            "database url must start with postgres://, postgresql://, mysql:// or sqlite:"
                .to_string(),
        ))
    }
}
