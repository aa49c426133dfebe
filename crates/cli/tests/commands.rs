// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

use llm_metrics_cli::commands::{self, Sinks};
use llm_metrics_cli::config::AppConfig;
use llm_metrics_storage::{open_store, DuplicatePolicy, StoreOptions};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const RECORD: &str = concat!(
    r#"{"dataset_name": "sharegpt", "median_e2e_latency_ms": 120, "#,
    r#""output_throughput": 50, "duration": 10, "total_output_tokens": 500}"#
);

fn write_archive(path: &Path) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for name in ["runs/sglang_05_8.jsonl", "runs/shortfin_05_8_trie.jsonl"] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(format!("{RECORD}\n").as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

fn scratch_config(scratch: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.ingest.period = Some("2024-12".parse().unwrap());
    config.ingest.extract_dir = scratch.path().join("extracted");
    config.ingest.output_dir = scratch.path().join("processed");
    config.database.url = Some(format!(
        "sqlite://{}",
        scratch.path().join("metrics.db").display()
    ));
    config
}

async fn stored_rows(config: &AppConfig) -> i64 {
    let url = config.database.url.as_deref().unwrap();
    let store = open_store(url, StoreOptions::default()).unwrap();
    store
        .summarize()
        .await
        .unwrap()
        .iter()
        .map(|group| group.count)
        .sum()
}

#[tokio::test]
async fn test_process_then_load_latest_dataset() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("runs.zip");
    write_archive(&archive);
    let config = scratch_config(&scratch);

    let output = commands::process(&config, &archive).unwrap();
    assert_eq!(output.batch.report.rows(), 2);
    assert!(output.dataset.starts_with(&config.ingest.output_dir));

    let outcome = commands::load(&config, None).await.unwrap();
    assert_eq!(outcome.inserted, 2);
    assert_eq!(stored_rows(&config).await, 2);
}

#[tokio::test]
async fn test_reloading_with_replace_policy_does_not_duplicate() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("runs.zip");
    write_archive(&archive);
    let mut config = scratch_config(&scratch);
    config.database.duplicate_policy = DuplicatePolicy::ReplaceRunKeys;

    let output = commands::process(&config, &archive).unwrap();
    commands::load(&config, Some(&output.dataset)).await.unwrap();
    let second = commands::load(&config, Some(&output.dataset)).await.unwrap();

    assert_eq!(second.replaced, 2);
    assert_eq!(stored_rows(&config).await, 2);
}

#[tokio::test]
async fn test_run_without_dashboard_loads_rows() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("runs.zip");
    write_archive(&archive);
    let config = scratch_config(&scratch);

    commands::run(
        &config,
        &archive,
        Sinks {
            load: true,
            dashboard: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(stored_rows(&config).await, 2);
}

#[tokio::test]
async fn test_run_requires_dashboard_credentials_before_processing() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("runs.zip");
    write_archive(&archive);
    let config = scratch_config(&scratch);

    let err = commands::run(
        &config,
        &archive,
        Sinks {
            load: false,
            dashboard: true,
        },
    )
    .await
    .unwrap_err();

    assert!(format!("{err:#}").contains("GRAFANA_URL is not set"));
    assert!(!config.ingest.output_dir.exists());
}

#[test]
fn test_process_requires_period() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("runs.zip");
    write_archive(&archive);
    let mut config = scratch_config(&scratch);
    config.ingest.period = None;

    let err = commands::process(&config, &archive).unwrap_err();
    assert!(err.to_string().contains("no run period configured"));
}

#[test]
fn test_process_reports_no_data_counts() {
    let scratch = tempfile::tempdir().unwrap();
    let archive = scratch.path().join("runs.zip");
    let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
    writer
        .start_file("runs/sglang_99_8.jsonl", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(format!("{RECORD}\n").as_bytes()).unwrap();
    writer.finish().unwrap();

    let err = commands::process(&scratch_config(&scratch), &archive).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("failed to process archive"));
    assert!(message.contains("1 run files found, 1 failed"));
}
