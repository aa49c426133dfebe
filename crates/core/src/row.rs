// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! The canonical metrics row.
//!
//! Every producer record is mapped onto [`CanonicalMetricRow`]. Fields a
//! producer does not report stay `None`; a zero is always a reported value.

use crate::producer::Producer;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Name of the relational table and dashboard data source holding canonical rows.
pub const METRICS_TABLE: &str = "llm_metrics";

/// Run-level metadata shared by every row decoded from one run file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    /// Producer identifier.
    pub server: Producer,
    /// Absolute run date.
    pub date: NaiveDate,
    /// Requested load level.
    pub request_rate: u32,
    /// Cache mode or the `"default"` sentinel.
    pub model_type: String,
}

/// One normalized benchmark record in the unified schema.
///
/// Column order matches the persisted table and the tabular dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetricRow {
    /// Producer identifier.
    pub server: Producer,
    /// Absolute run date.
    pub date: NaiveDate,
    /// Requested load level.
    pub request_rate: u32,
    /// Cache mode or the `"default"` sentinel.
    pub model_type: String,
    /// Workload identifier reported by the producer.
    pub dataset: Option<String>,
    /// Total prompt tokens.
    pub input_tokens: Option<i64>,
    /// Total generated tokens.
    pub output_tokens: Option<i64>,
    /// Generated tokens after re-tokenization.
    pub output_tokens_retokenized: Option<i64>,
    /// Mean end-to-end latency (ms).
    pub mean_latency: Option<f64>,
    /// Median end-to-end latency (ms).
    pub median_latency: Option<f64>,
    /// Median time to first token (ms).
    pub median_ttft: Option<f64>,
    /// Median inter-token latency (ms).
    pub median_itl: Option<f64>,
    /// Reported output throughput.
    pub throughput: Option<f64>,
    /// Wall-clock run duration (s).
    pub duration: Option<f64>,
    /// Requests that finished.
    pub completed_requests: Option<i64>,
    /// Derived: `output_tokens / duration`.
    pub tokens_per_second: Option<f64>,
}

impl CanonicalMetricRow {
    /// Create a row for a run with every metric absent.
    pub fn new(key: RunKey) -> Self {
        Self {
            server: key.server,
            date: key.date,
            request_rate: key.request_rate,
            model_type: key.model_type,
            dataset: None,
            input_tokens: None,
            output_tokens: None,
            output_tokens_retokenized: None,
            mean_latency: None,
            median_latency: None,
            median_ttft: None,
            median_itl: None,
            throughput: None,
            duration: None,
            completed_requests: None,
            tokens_per_second: None,
        }
    }

    /// The natural key `(server, date, request_rate, model_type)`.
    pub fn run_key(&self) -> RunKey {
        RunKey {
            server: self.server.clone(),
            date: self.date,
            request_rate: self.request_rate,
            model_type: self.model_type.clone(),
        }
    }

    /// Recompute [`CanonicalMetricRow::tokens_per_second`] from the row's own fields.
    pub fn compute_derived(&mut self) {
        self.tokens_per_second = tokens_per_second(self.output_tokens, self.duration);
    }
}

/// Output tokens per second of wall-clock time.
///
/// Absent when either input is absent or the duration is exactly zero.
pub fn tokens_per_second(output_tokens: Option<i64>, duration: Option<f64>) -> Option<f64> {
    let duration = duration.filter(|d| *d != 0.0)?;
    let rate = output_tokens? as f64 / duration;
    rate.is_finite().then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_per_second() {
        assert_eq!(tokens_per_second(Some(500), Some(10.0)), Some(50.0));
        assert_eq!(tokens_per_second(Some(500), Some(0.0)), None);
        assert_eq!(tokens_per_second(Some(500), None), None);
        assert_eq!(tokens_per_second(None, Some(10.0)), None);
        assert_eq!(tokens_per_second(Some(0), Some(4.0)), Some(0.0));
    }

    #[test]
    fn test_new_row_has_absent_metrics() {
        let row = CanonicalMetricRow::new(RunKey {
            server: Producer::Sglang,
            date: NaiveDate::from_ymd_opt(2024, 12, 5).unwrap(),
            request_rate: 8,
            model_type: "default".to_string(),
        });
        assert!(row.median_latency.is_none());
        assert!(row.tokens_per_second.is_none());
        assert_eq!(row.run_key().request_rate, 8);
    }
}
