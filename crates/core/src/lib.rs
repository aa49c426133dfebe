// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canonical benchmark metrics for LLM serving runs.
//!
//! This crate holds the pure part of the ingestion pipeline:
//!
//! - [`filename`] - decoding `<server>_<day>_<rate>[_<model_type>]` run names
//! - [`period`] - the month/year context that turns a day into a date
//! - [`payload`] - producer record shapes and the fixed field map
//! - [`normalize`] - mapping records onto [`CanonicalMetricRow`]
//! - [`aggregate`] - the combined table, derived metrics and grouped summary
//!
//! # Example
//!
//! ```
//! use llm_metrics_core::{aggregate, normalize_run, resolve_run_key, RunFileName};
//!
//! let name = RunFileName::parse("sglang_05_8.jsonl").unwrap();
//! let key = resolve_run_key(&name, "2024-12".parse().unwrap()).unwrap();
//! let file = normalize_run(r#"{"total_output_tokens": 500, "duration": 10}"#, &key).unwrap();
//! let aggregation = aggregate(file.rows).unwrap();
//! assert_eq!(aggregation.table.rows()[0].tokens_per_second, Some(50.0));
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod error;
pub mod filename;
pub mod normalize;
pub mod payload;
pub mod period;
pub mod producer;
pub mod row;

pub use aggregate::{aggregate, Aggregation, MetricsTable, Summary, SummaryGroup, SummaryKey};
pub use error::{CoreError, Result};
pub use filename::{RunFileName, DEFAULT_MODEL_TYPE, RUN_FILE_EXTENSION};
pub use normalize::{
    normalize_record, normalize_run, resolve_run_key, NormalizedFile, SkippedRecord,
};
pub use payload::{BenchServingReport, CanonicalField, ProducerPayload, FIELD_MAP};
pub use period::RunPeriod;
pub use producer::Producer;
pub use row::{tokens_per_second, CanonicalMetricRow, RunKey, METRICS_TABLE};
