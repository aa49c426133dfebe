// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! MySQL backend.

use crate::error::{Result, StoreError};
use crate::schema::{self, bind_row, is_plain_identifier, INDEXES, INSERT_CHUNK, TABLE};
use crate::{
    AppendOutcome, DuplicatePolicy, MetricsStore, StoreOptions, StoredSummary, SUMMARY_QUERY,
};
use async_trait::async_trait;
use llm_metrics_core::CanonicalMetricRow;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::{Connection, MySql, MySqlConnection, QueryBuilder};
use std::str::FromStr;
use tracing::{debug, info, instrument};

/// Metrics store backed by MySQL.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    /// Options for the server without a default database.
    server: MySqlConnectOptions,
    database: Option<String>,
    policy: DuplicatePolicy,
    create_database: bool,
}

/// Split a `mysql://` URL into the server URL and its database name.
fn split_database(url: &str) -> (String, Option<String>) {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (url, None),
    };
    let authority_start = base.find("://").map_or(0, |i| i + 3);
    let (server, database) = match base[authority_start..].find('/') {
        Some(slash) => {
            let slash = authority_start + slash;
            let name = &base[slash + 1..];
            (&base[..slash], (!name.is_empty()).then(|| name.to_string()))
        }
        None => (base, None),
    };
    let server = match query {
        Some(query) => format!("{server}?{query}"),
        None => server.to_string(),
    };
    (server, database)
}

impl MySqlStore {
    /// Build a store from a `mysql://` URL without connecting yet.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(url: &str, store: StoreOptions) -> Result<Self> {
        let options = MySqlConnectOptions::from_str(url)?;
        let (server_url, database) = split_database(url);
        let server = MySqlConnectOptions::from_str(&server_url)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect_lazy_with(options);
        Ok(Self {
            pool,
            server,
            database,
            policy: store.duplicate_policy,
            create_database: store.create_database,
        })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn ensure_database(&self) -> Result<()> {
        let Some(name) = self.database.as_deref() else {
            return Ok(());
        };
        if !is_plain_identifier(name) {
            return Err(StoreError::InvalidConfig(format!(
                "database name '{name}' must contain only letters, digits and underscores"
            )));
        }

        let mut conn = MySqlConnection::connect_with(&self.server).await?;
        sqlx::query(&format!("CREATE DATABASE IF NOT EXISTS `{name}`"))
            .execute(&mut conn)
            .await?;
        conn.close().await?;
        debug!(database = %name, "Database ready");
        Ok(())
    }

    async fn ensure_indexes(&self) -> Result<()> {
        for (name, columns) in INDEXES {
            let existing: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM information_schema.statistics \
                 WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?",
            )
            .bind(TABLE)
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
            if existing == 0 {
                sqlx::query(&format!("CREATE INDEX {name} ON {TABLE} ({columns})"))
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }
}

fn create_table_statement() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            id BIGINT AUTO_INCREMENT PRIMARY KEY,
            server VARCHAR(50) NOT NULL,
            date DATE NOT NULL,
            request_rate INT NOT NULL,
            model_type VARCHAR(50) NOT NULL,
            dataset TEXT,
            input_tokens BIGINT,
            output_tokens BIGINT,
            output_tokens_retokenized BIGINT,
            mean_latency DOUBLE,
            median_latency DOUBLE,
            median_ttft DOUBLE,
            median_itl DOUBLE,
            throughput DOUBLE,
            duration DOUBLE,
            completed_requests BIGINT,
            tokens_per_second DOUBLE,
            ingested_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )"
    )
}

#[async_trait]
impl MetricsStore for MySqlStore {
    #[instrument(skip(self))]
    async fn ensure_schema(&self) -> Result<()> {
        if self.create_database {
            self.ensure_database().await?;
        }

        sqlx::query(&create_table_statement())
            .execute(&self.pool)
            .await?;
        self.ensure_indexes().await?;

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
            let mut builder = QueryBuilder::<MySql>::new(schema::insert_prefix());
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
