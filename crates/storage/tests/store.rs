// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

use chrono::NaiveDate;
use llm_metrics_core::{CanonicalMetricRow, Producer, RunKey};
use llm_metrics_storage::{DuplicatePolicy, MetricsStore, SqliteStore, StoreError, StoreOptions};

fn row(server: &str, day: u32, rate: u32, latency: f64, throughput: f64) -> CanonicalMetricRow {
    let mut row = CanonicalMetricRow::new(RunKey {
        server: Producer::from(server),
        date: NaiveDate::from_ymd_opt(2024, 12, day).unwrap(),
        request_rate: rate,
        model_type: "default".to_string(),
    });
    row.dataset = Some("sharegpt".to_string());
    row.output_tokens = Some(500);
    row.duration = Some(10.0);
    row.median_latency = Some(latency);
    row.throughput = Some(throughput);
    row.compute_derived();
    row
}

fn memory_store(policy: DuplicatePolicy) -> SqliteStore {
    let options = StoreOptions {
        duplicate_policy: policy,
        ..StoreOptions::default()
    };
    SqliteStore::connect_lazy("sqlite::memory:", options).unwrap()
}

async fn schema_object_count(store: &SqliteStore) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE name LIKE '%llm_metrics%'")
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let store = memory_store(DuplicatePolicy::Append);
    store.ensure_schema().await.unwrap();
    let first = schema_object_count(&store).await;
    store.ensure_schema().await.unwrap();

    // table + three indexes
    assert_eq!(first, 4);
    assert_eq!(schema_object_count(&store).await, first);
}

#[tokio::test]
async fn test_invalid_batch_writes_nothing() {
    let store = memory_store(DuplicatePolicy::Append);
    store.ensure_schema().await.unwrap();

    let mut bad = row("shortfin", 5, 8, 100.0, 40.0);
    bad.server = Producer::from("");
    let err = store
        .append(&[row("sglang", 5, 8, 100.0, 40.0), bad])
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::SchemaViolation { index: 1, batch_size: 2, .. }));
    assert!(store.summarize().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_append_then_summarize() {
    let store = memory_store(DuplicatePolicy::Append);
    store.ensure_schema().await.unwrap();

    let outcome = store
        .append(&[
            row("sglang", 5, 8, 100.0, 40.0),
            row("sglang", 6, 8, 200.0, 60.0),
            row("shortfin", 5, 8, 150.0, 30.0),
        ])
        .await
        .unwrap();
    assert_eq!(outcome.inserted, 3);
    assert_eq!(outcome.replaced, 0);

    let summary = store.summarize().await.unwrap();
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].server, "sglang");
    assert_eq!(summary[0].model_type, "default");
    assert_eq!(summary[0].count, 2);
    assert_eq!(summary[0].avg_latency, Some(150.0));
    assert_eq!(summary[0].avg_throughput, Some(50.0));
    assert_eq!(summary[1].server, "shortfin");
    assert_eq!(summary[1].count, 1);
}

#[tokio::test]
async fn test_stored_row_keeps_absent_metrics_null() {
    let store = memory_store(DuplicatePolicy::Append);
    store.ensure_schema().await.unwrap();

    let mut sparse = row("vllm", 7, 2, 0.0, 0.0);
    sparse.median_latency = None;
    sparse.throughput = None;
    store.append(&[sparse]).await.unwrap();

    let (date, tps, median_ttft): (String, Option<f64>, Option<f64>) = sqlx::query_as(
        "SELECT date, tokens_per_second, median_ttft FROM llm_metrics WHERE server = 'vllm'",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(date, "2024-12-07");
    assert_eq!(tps, Some(50.0));
    assert_eq!(median_ttft, None);
}

#[tokio::test]
async fn test_append_policy_duplicates_reingested_runs() {
    let store = memory_store(DuplicatePolicy::Append);
    store.ensure_schema().await.unwrap();

    let batch = [row("sglang", 5, 8, 100.0, 40.0)];
    store.append(&batch).await.unwrap();
    store.append(&batch).await.unwrap();

    assert_eq!(store.summarize().await.unwrap()[0].count, 2);
}

#[tokio::test]
async fn test_replace_policy_keeps_one_copy_per_run() {
    let store = memory_store(DuplicatePolicy::ReplaceRunKeys);
    store.ensure_schema().await.unwrap();

    store
        .append(&[row("sglang", 5, 8, 100.0, 40.0), row("sglang", 5, 16, 120.0, 70.0)])
        .await
        .unwrap();
    let outcome = store
        .append(&[row("sglang", 5, 8, 300.0, 40.0)])
        .await
        .unwrap();

    assert_eq!(outcome.replaced, 1);
    assert_eq!(outcome.inserted, 1);
    let summary = store.summarize().await.unwrap();
    assert_eq!(summary[0].count, 2);
    assert_eq!(summary[0].avg_latency, Some(210.0));
}

#[tokio::test]
async fn test_large_batch_spans_insert_chunks() {
    let store = memory_store(DuplicatePolicy::Append);
    store.ensure_schema().await.unwrap();

    let rows: Vec<_> = (1..=1200u32)
        .map(|rate| row("sglang", 5, rate, 100.0, 40.0))
        .collect();
    let outcome = store.append(&rows).await.unwrap();

    assert_eq!(outcome.inserted, 1200);
    assert_eq!(store.summarize().await.unwrap()[0].count, 1200);
}

#[tokio::test]
async fn test_file_database_is_created_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.db");
    let url = format!("sqlite://{}", path.display());

    let store = llm_metrics_storage::open_store(&url, StoreOptions::default()).unwrap();
    store.ensure_schema().await.unwrap();
    store.append(&[row("sglang", 5, 8, 100.0, 40.0)]).await.unwrap();

    assert!(path.exists());
    assert_eq!(store.summarize().await.unwrap()[0].count, 1);
}
