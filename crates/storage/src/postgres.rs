// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! PostgreSQL backend.

use crate::error::{Result, StoreError};
use crate::schema::{self, bind_row, is_plain_identifier, INSERT_CHUNK, TABLE};
use crate::{
    AppendOutcome, DuplicatePolicy, MetricsStore, StoreOptions, StoredSummary, SUMMARY_QUERY,
};
use async_trait::async_trait;
use llm_metrics_core::CanonicalMetricRow;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Database used to check for and create the target database.
const MAINTENANCE_DATABASE: &str = "postgres";

/// Metrics store backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    options: PgConnectOptions,
    policy: DuplicatePolicy,
    create_database: bool,
}

impl PostgresStore {
    /// Build a store from a `postgres://` URL without connecting yet.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(url: &str, store: StoreOptions) -> Result<Self> {
        let options = PgConnectOptions::from_str(url)?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(options.clone());
        Ok(Self {
            pool,
            options,
            policy: store.duplicate_policy,
            create_database: store.create_database,
        })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn ensure_database(&self) -> Result<()> {
        let Some(name) = self.options.get_database().map(str::to_string) else {
            return Ok(());
        };
        if !is_plain_identifier(&name) {
            return Err(StoreError::InvalidConfig(format!(
                "database name '{name}' must contain only letters, digits and underscores"
            )));
        }

        let maintenance = self.options.clone().database(MAINTENANCE_DATABASE);
        let mut conn = match PgConnection::connect_with(&maintenance).await {
            Ok(conn) => conn,
            Err(e) => {
                // Without access to the maintenance database, assume the
                // target exists; connecting to it will say otherwise.
                warn!(database = %name, error = %e, "Cannot reach maintenance database");
                return Ok(());
            }
        };

        let exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM pg_database WHERE datname = $1")
                .bind(&name)
                .fetch_optional(&mut conn)
                .await?;
        if exists.is_none() {
            sqlx::query(&format!("CREATE DATABASE \"{name}\""))
                .execute(&mut conn)
                .await?;
            info!(database = %name, "Created database");
        }
        conn.close().await?;
        Ok(())
    }
}

fn create_table_statement() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            id BIGSERIAL PRIMARY KEY,
            server VARCHAR(50) NOT NULL,
            date DATE NOT NULL,
            request_rate INTEGER NOT NULL,
            model_type VARCHAR(50) NOT NULL,
            dataset TEXT,
            input_tokens BIGINT,
            output_tokens BIGINT,
            output_tokens_retokenized BIGINT,
            mean_latency DOUBLE PRECISION,
            median_latency DOUBLE PRECISION,
            median_ttft DOUBLE PRECISION,
            median_itl DOUBLE PRECISION,
            throughput DOUBLE PRECISION,
            duration DOUBLE PRECISION,
            completed_requests BIGINT,
            tokens_per_second DOUBLE PRECISION,
            ingested_at TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP
        )"
    )
}

#[async_trait]
impl MetricsStore for PostgresStore {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        if self.create_database {
            self.ensure_database().await?;
        }

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
                 WHERE server = $1 AND date = $2 AND request_rate = $3 AND model_type = $4"
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
            let mut builder = QueryBuilder::<Postgres>::new(schema::insert_prefix());
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
