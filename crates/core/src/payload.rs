// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Producer payload shapes.
//!
//! Both known producers (sglang and shortfin) are driven by the same
//! `bench_serving` harness and emit one [`BenchServingReport`] object per
//! line. Records from producers without a dedicated decoder are kept as an
//! untyped object and read through [`FIELD_MAP`].

use crate::producer::Producer;
use crate::row::CanonicalMetricRow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A canonical metric column populated from producer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    /// `dataset`
    Dataset,
    /// `input_tokens`
    InputTokens,
    /// `output_tokens`
    OutputTokens,
    /// `output_tokens_retokenized`
    OutputTokensRetokenized,
    /// `mean_latency`
    MeanLatency,
    /// `median_latency`
    MedianLatency,
    /// `median_ttft`
    MedianTtft,
    /// `median_itl`
    MedianItl,
    /// `throughput`
    Throughput,
    /// `duration`
    Duration,
    /// `completed_requests`
    CompletedRequests,
}

impl CanonicalField {
    /// Column name in the canonical schema.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Dataset => "dataset",
            Self::InputTokens => "input_tokens",
            Self::OutputTokens => "output_tokens",
            Self::OutputTokensRetokenized => "output_tokens_retokenized",
            Self::MeanLatency => "mean_latency",
            Self::MedianLatency => "median_latency",
            Self::MedianTtft => "median_ttft",
            Self::MedianItl => "median_itl",
            Self::Throughput => "throughput",
            Self::Duration => "duration",
            Self::CompletedRequests => "completed_requests",
        }
    }

    /// Assign a loosely-typed JSON value to this field of `row`.
    ///
    /// Values of the wrong JSON type leave the field absent.
    fn assign(&self, row: &mut CanonicalMetricRow, value: &Value) {
        match self {
            Self::Dataset => row.dataset = value.as_str().map(str::to_string),
            Self::InputTokens => row.input_tokens = value.as_i64(),
            Self::OutputTokens => row.output_tokens = value.as_i64(),
            Self::OutputTokensRetokenized => row.output_tokens_retokenized = value.as_i64(),
            Self::MeanLatency => row.mean_latency = value.as_f64(),
            Self::MedianLatency => row.median_latency = value.as_f64(),
            Self::MedianTtft => row.median_ttft = value.as_f64(),
            Self::MedianItl => row.median_itl = value.as_f64(),
            Self::Throughput => row.throughput = value.as_f64(),
            Self::Duration => row.duration = value.as_f64(),
            Self::CompletedRequests => row.completed_requests = value.as_i64(),
        }
    }
}

/// Producer key → canonical field.
pub const FIELD_MAP: [(&str, CanonicalField); 11] = [
    ("dataset_name", CanonicalField::Dataset),
    ("total_input_tokens", CanonicalField::InputTokens),
    ("total_output_tokens", CanonicalField::OutputTokens),
    ("total_output_tokens_retokenized", CanonicalField::OutputTokensRetokenized),
    ("mean_e2e_latency_ms", CanonicalField::MeanLatency),
    ("median_e2e_latency_ms", CanonicalField::MedianLatency),
    ("median_ttft_ms", CanonicalField::MedianTtft),
    ("median_itl_ms", CanonicalField::MedianItl),
    ("output_throughput", CanonicalField::Throughput),
    ("duration", CanonicalField::Duration),
    ("completed", CanonicalField::CompletedRequests),
];

/// Summary object written by the `bench_serving` harness.
///
/// Keys not listed here are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchServingReport {
    /// Workload name.
    pub dataset_name: Option<String>,
    /// Total prompt tokens.
    pub total_input_tokens: Option<i64>,
    /// Total generated tokens.
    pub total_output_tokens: Option<i64>,
    /// Generated tokens after re-tokenization.
    pub total_output_tokens_retokenized: Option<i64>,
    /// Mean end-to-end latency (ms).
    pub mean_e2e_latency_ms: Option<f64>,
    /// Median end-to-end latency (ms).
    pub median_e2e_latency_ms: Option<f64>,
    /// Median time to first token (ms).
    pub median_ttft_ms: Option<f64>,
    /// Median inter-token latency (ms).
    pub median_itl_ms: Option<f64>,
    /// Output token throughput.
    pub output_throughput: Option<f64>,
    /// Benchmark wall-clock duration (s).
    pub duration: Option<f64>,
    /// Completed requests.
    pub completed: Option<i64>,
}

/// One decoded JSONL record.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerPayload {
    /// Typed `bench_serving` summary from a known producer.
    BenchServing(BenchServingReport),
    /// Untyped object from a producer without a dedicated decoder.
    Unknown(Map<String, Value>),
}

impl ProducerPayload {
    /// Decode one line of a run file produced by `producer`.
    ///
    /// # Errors
    ///
    /// Returns the decoder message when the line is not a JSON object, or
    /// when a known producer's field has the wrong JSON type.
    pub fn decode(producer: &Producer, line: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let Value::Object(object) = value else {
            return Err("expected a JSON object".to_string());
        };

        if producer.is_known() {
            serde_json::from_value(Value::Object(object))
                .map(Self::BenchServing)
                .map_err(|e| e.to_string())
        } else {
            Ok(Self::Unknown(object))
        }
    }

    /// Copy the reported metrics into `row`.
    pub fn apply_to(self, row: &mut CanonicalMetricRow) {
        match self {
            Self::BenchServing(report) => {
                row.dataset = report.dataset_name;
                row.input_tokens = report.total_input_tokens;
                row.output_tokens = report.total_output_tokens;
                row.output_tokens_retokenized = report.total_output_tokens_retokenized;
                row.mean_latency = report.mean_e2e_latency_ms;
                row.median_latency = report.median_e2e_latency_ms;
                row.median_ttft = report.median_ttft_ms;
                row.median_itl = report.median_itl_ms;
                row.throughput = report.output_throughput;
                row.duration = report.duration;
                row.completed_requests = report.completed;
            }
            Self::Unknown(object) => {
                for (key, field) in FIELD_MAP {
                    if let Some(value) = object.get(key) {
                        field.assign(row, value);
                    }
                }
            }
        }
    }
}
