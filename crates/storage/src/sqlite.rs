// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! SQLite backend for local runs and tests.

use crate::error::Result;
use crate::schema::{self, bind_row, INSERT_CHUNK, TABLE};
use crate::{
    AppendOutcome, DuplicatePolicy, MetricsStore, StoreOptions, StoredSummary, SUMMARY_QUERY,
};
use async_trait::async_trait;
use llm_metrics_core::CanonicalMetricRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Metrics store backed by a SQLite file, or memory for `sqlite::memory:`.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    policy: DuplicatePolicy,
}

impl SqliteStore {
    /// Build a store from a `sqlite:` URL without connecting yet.
    ///
    /// With `create_database` the file is created on first connection if
    /// missing. The pool holds a single long-lived connection so an in-memory database
    /// survives between calls. Must be called from within a Tokio runtime.
    pub fn connect_lazy(url: &str, store: StoreOptions) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(url)?.create_if_missing(store.create_database);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(options);
        Ok(Self {
            pool,
            policy: store.duplicate_policy,
        })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn create_table_statement() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            server VARCHAR(50) NOT NULL,
            date TEXT NOT NULL,
            request_rate INTEGER NOT NULL,
            model_type VARCHAR(50) NOT NULL,
            dataset TEXT,
            input_tokens INTEGER,
            output_tokens INTEGER,
            output_tokens_retokenized INTEGER,
            mean_latency REAL,
            median_latency REAL,
            median_ttft REAL,
            median_itl REAL,
            throughput REAL,
            duration REAL,
            completed_requests INTEGER,
            tokens_per_second REAL,
            ingested_at TEXT DEFAULT CURRENT_TIMESTAMP
        )"
    )
}

#[async_trait]
impl MetricsStore for SqliteStore {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(&create_table_statement())
            .execute(&self.pool)
            .await?;
        for statement in schema::index_statements() {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        info!(table = TABLE, "Schema ready");
        Ok(())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len(), policy = %self.policy))]
    async fn append(&self, rows: &[CanonicalMetricRow]) -> Result<AppendOutcome> {
        schema::validate_batch(rows)?;
        if rows.is_empty() {
            return Ok(AppendOutcome::default());
        }

        let mut outcome = AppendOutcome::default();
        let mut tx = self.pool.begin().await?;

        if self.policy == DuplicatePolicy::ReplaceRunKeys {
            let delete = format!(
                "DELETE FROM {TABLE} \
                 WHERE server = ? AND date = ? AND request_rate = ? AND model_type = ?"
            );
            for key in schema::run_keys(rows) {
                let result = sqlx::query(&delete)
                    .bind(key.server.as_str())
                    .bind(key.date)
                    .bind(i32::try_from(key.request_rate).unwrap_or(i32::MAX))
                    .bind(key.model_type.as_str())
                    .execute(&mut *tx)
                    .await?;
                outcome.replaced += result.rows_affected();
            }
        }

        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut builder = QueryBuilder::<Sqlite>::new(schema::insert_prefix());
            builder.push_values(chunk, |mut b, row| bind_row!(b, row));
            let result = builder.build().execute(&mut *tx).await?;
            outcome.inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            "Batch committed"
        );
        Ok(outcome)
    }

    async fn summarize(&self) -> Result<Vec<StoredSummary>> {
        Ok(sqlx::query_as::<_, StoredSummary>(SUMMARY_QUERY)
            .fetch_all(&self.pool)
            .await?)
    }
}
