// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Command implementations.
//!
//! Every failure is wrapped with the progress made before it, so an abort
//! says how many files and rows were handled.

use crate::config::AppConfig;
use anyhow::{anyhow, bail, Context, Result};
use llm_metrics_core::{CanonicalMetricRow, MetricsTable};
use llm_metrics_dashboard::{build_dashboard, GrafanaClient, UpsertResponse};
use llm_metrics_ingest::io::{latest_dataset, read_dataset_csv, write_dataset};
use llm_metrics_ingest::markdown::{generate_batch_report, generate_summary};
use llm_metrics_ingest::{process_archive, process_directory, ProcessedBatch};
use llm_metrics_storage::{open_store, AppendOutcome, MetricsStore};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Result of `process`.
#[derive(Debug)]
pub struct ProcessOutput {
    /// The aggregated batch.
    pub batch: ProcessedBatch,
    /// Dataset file written.
    pub dataset: PathBuf,
}

fn progress(batch: &ProcessedBatch) -> String {
    format!(
        "{} rows from {} of {} files",
        batch.report.rows(),
        batch.report.files_processed(),
        batch.report.files_seen()
    )
}

/// Extract, ingest and aggregate `archive`, then write the dataset.
pub fn process(config: &AppConfig, archive: &Path) -> Result<ProcessOutput> {
    let period = config.ingest.require_period()?;
    let batch = process_archive(archive, &config.ingest.extract_dir, period)
        .with_context(|| format!("failed to process archive {}", archive.display()))?;

    let dataset = write_dataset(
        &batch.aggregation.table,
        &config.ingest.output_dir,
        config.ingest.format,
    )
    .with_context(|| format!("processed {} but could not write the dataset", progress(&batch)))?;

    info!(
        rows = batch.report.rows(),
        files = batch.report.files_processed(),
        failed = batch.report.files_failed(),
        skipped = batch.report.records_skipped(),
        dataset = %dataset.display(),
        "Processing complete"
    );
    Ok(ProcessOutput { batch, dataset })
}

/// Print the batch report and summary tables.
pub fn print_report(batch: &ProcessedBatch) {
    println!("{}", generate_batch_report(&batch.report));
    println!("{}", generate_summary(&batch.aggregation.summary));
}

fn open_configured_store(config: &AppConfig) -> Result<Box<dyn MetricsStore>> {
    let url = config.database.require_url()?;
    open_store(url, config.database.store_options()).context("failed to open metrics store")
}

/// Provision the database, table and indexes.
pub async fn init_db(config: &AppConfig) -> Result<()> {
    let store = open_configured_store(config)?;
    store
        .ensure_schema()
        .await
        .context("failed to provision metrics store")
}

/// Append `rows` and log what the store now holds.
pub async fn load_rows(
    store: &dyn MetricsStore,
    rows: &[CanonicalMetricRow],
) -> Result<AppendOutcome> {
    let outcome = store
        .append(rows)
        .await
        .with_context(|| format!("failed to load {} rows; nothing was written", rows.len()))?;
    info!(
        inserted = outcome.inserted,
        replaced = outcome.replaced,
        "Rows loaded"
    );

    for group in store
        .summarize()
        .await
        .context("rows were loaded but the stored summary could not be read")?
    {
        info!(
            server = %group.server,
            model_type = %group.model_type,
            count = group.count,
            avg_latency = ?group.avg_latency,
            avg_throughput = ?group.avg_throughput,
            "Stored summary"
        );
    }
    Ok(outcome)
}

/// Load a CSV dataset, or the newest one in the output directory.
pub async fn load(config: &AppConfig, csv: Option<&Path>) -> Result<AppendOutcome> {
    let path = match csv {
        Some(path) => path.to_path_buf(),
        None => latest_dataset(&config.ingest.output_dir).with_context(|| {
            format!(
                "no dataset given and none found in {}",
                config.ingest.output_dir.display()
            )
        })?,
    };
    let rows = read_dataset_csv(&path)
        .with_context(|| format!("failed to read dataset {}", path.display()))?;
    if rows.is_empty() {
        bail!("dataset {} contains no rows", path.display());
    }
    info!(dataset = %path.display(), rows = rows.len(), "Loading dataset");

    let store = open_configured_store(config)?;
    store
        .ensure_schema()
        .await
        .context("failed to provision metrics store")?;
    load_rows(store.as_ref(), &rows).await
}

/// Build the Grafana client; missing credentials are a startup failure.
pub fn grafana_client(config: &AppConfig) -> Result<GrafanaClient> {
    let (url, api_key) = config
        .dashboard
        .require_credentials()
        .context("dashboard export is not configured")?;
    GrafanaClient::new(url, api_key, config.dashboard.timeout())
        .context("failed to build dashboard client")
}

/// Upsert the dashboard for `table`.
pub async fn export(
    client: &GrafanaClient,
    config: &AppConfig,
    table: &MetricsTable,
) -> Result<UpsertResponse> {
    let request = build_dashboard(table, &config.dashboard.settings(), chrono::Utc::now());
    client
        .upsert(&request)
        .await
        .with_context(|| format!("failed to export dashboard for {} rows", table.len()))
}

/// Ingest the source-data directory and export the dashboard.
pub async fn dashboard(config: &AppConfig) -> Result<UpsertResponse> {
    let client = grafana_client(config)?;
    let period = config.ingest.require_period()?;
    let data_dir = &config.ingest.data_dir;
    let batch = process_directory(data_dir, period)
        .with_context(|| format!("failed to ingest {}", data_dir.display()))?;

    export(&client, config, &batch.aggregation.table)
        .await
        .with_context(|| format!("ingested {}", progress(&batch)))
}

/// Which sinks `run` feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sinks {
    /// Append to the relational store.
    pub load: bool,
    /// Export the dashboard.
    pub dashboard: bool,
}

/// `process`, then each enabled sink. A failing sink does not stop the other.
pub async fn run(config: &AppConfig, archive: &Path, sinks: Sinks) -> Result<()> {
    // Fail on missing settings before doing any work.
    let client = if sinks.dashboard {
        Some(grafana_client(config)?)
    } else {
        None
    };
    let store = if sinks.load {
        Some(open_configured_store(config)?)
    } else {
        None
    };

    let output = process(config, archive)?;
    print_report(&output.batch);
    let done = format!(
        "processed {}, dataset {}",
        progress(&output.batch),
        output.dataset.display()
    );
    let table = &output.batch.aggregation.table;

    let mut failures = Vec::new();

    if let Some(store) = store {
        let loaded = async {
            store
                .ensure_schema()
                .await
                .context("failed to provision metrics store")?;
            load_rows(store.as_ref(), table.rows()).await
        }
        .await;
        if let Err(e) = loaded {
            error!(error = %format!("{e:#}"), "Load failed");
            failures.push(format!("load: {e:#}"));
        }
    }

    if let Some(client) = client {
        match export(&client, config, table).await {
            Ok(reply) => println!("Dashboard updated: {}", reply.url),
            Err(e) => {
                error!(error = %format!("{e:#}"), "Dashboard export failed");
                failures.push(format!("dashboard: {e:#}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{}", failures.join("; "))).context(done)
    }
}
