// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Aggregation engine.
//!
//! Combines the rows of one ingestion batch into a [`MetricsTable`], fills in
//! derived metrics and summarizes by `(server, model_type)`.

use crate::error::{CoreError, Result};
use crate::producer::Producer;
use crate::row::CanonicalMetricRow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// The combined canonical table of one ingestion batch.
///
/// Rows keep their insertion order; the position of a row is its batch index.
/// A table always holds at least one row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsTable {
    rows: Vec<CanonicalMetricRow>,
}

impl MetricsTable {
    /// Rows in insertion order.
    pub fn rows(&self) -> &[CanonicalMetricRow] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows. Tables built by [`aggregate`] never do.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct producers present in the table.
    pub fn producers(&self) -> BTreeSet<Producer> {
        self.rows.iter().map(|row| row.server.clone()).collect()
    }

    /// Group rows by `(server, model_type)` and average the headline metrics.
    pub fn summarize(&self) -> Summary {
        let mut accumulators: BTreeMap<SummaryKey, GroupAccumulator> = BTreeMap::new();
        for row in &self.rows {
            let key = SummaryKey {
                server: row.server.clone(),
                model_type: row.model_type.clone(),
            };
            accumulators.entry(key).or_default().push(row);
        }
        accumulators
            .into_iter()
            .map(|(key, acc)| (key, acc.finish()))
            .collect()
    }

    /// Consume the table, returning its rows.
    pub fn into_rows(self) -> Vec<CanonicalMetricRow> {
        self.rows
    }
}

/// Grouping key of a [`SummaryGroup`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SummaryKey {
    /// Producer identifier.
    pub server: Producer,
    /// Cache mode or the `"default"` sentinel.
    pub model_type: String,
}

/// Mean headline metrics of one `(server, model_type)` group.
///
/// Means skip absent values; a mean is absent when no row reported it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryGroup {
    /// Rows in the group.
    pub rows: usize,
    /// Mean of `median_latency`.
    pub median_latency: Option<f64>,
    /// Mean of `throughput`.
    pub throughput: Option<f64>,
    /// Mean of `tokens_per_second`.
    pub tokens_per_second: Option<f64>,
}

/// Summary groups keyed by `(server, model_type)`.
pub type Summary = BTreeMap<SummaryKey, SummaryGroup>;

/// Output of [`aggregate`].
#[derive(Debug, Clone)]
pub struct Aggregation {
    /// Combined table with derived metrics filled in.
    pub table: MetricsTable,
    /// Grouped summary of the table.
    pub summary: Summary,
}

/// Combine all rows of a batch.
///
/// # Errors
///
/// Returns [`CoreError::NoData`] when `rows` is empty.
#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn aggregate(mut rows: Vec<CanonicalMetricRow>) -> Result<Aggregation> {
    if rows.is_empty() {
        return Err(CoreError::NoData);
    }

    for row in &mut rows {
        row.compute_derived();
    }

    let table = MetricsTable { rows };
    let summary = table.summarize();
    info!(groups = summary.len(), "aggregated metrics table");

    Ok(Aggregation { table, summary })
}

#[derive(Debug, Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.count += 1;
        }
    }

    fn finish(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    rows: usize,
    median_latency: Mean,
    throughput: Mean,
    tokens_per_second: Mean,
}

impl GroupAccumulator {
    fn push(&mut self, row: &CanonicalMetricRow) {
        self.rows += 1;
        self.median_latency.push(row.median_latency);
        self.throughput.push(row.throughput);
        self.tokens_per_second.push(row.tokens_per_second);
    }

    fn finish(self) -> SummaryGroup {
        SummaryGroup {
            rows: self.rows,
            median_latency: self.median_latency.finish(),
            throughput: self.throughput.finish(),
            tokens_per_second: self.tokens_per_second.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::RunKey;
    use chrono::NaiveDate;

    fn row(
        server: &str,
        model_type: &str,
        latency: Option<f64>,
        tokens: Option<i64>,
        duration: Option<f64>,
    ) -> CanonicalMetricRow {
        let mut row = CanonicalMetricRow::new(RunKey {
            server: Producer::from(server),
            date: NaiveDate::from_ymd_opt(2024, 12, 5).unwrap(),
            request_rate: 4,
            model_type: model_type.to_string(),
        });
        row.median_latency = latency;
        row.output_tokens = tokens;
        row.duration = duration;
        row.throughput = Some(50.0);
        row
    }

    #[test]
    fn test_empty_input_is_no_data() {
        assert!(matches!(aggregate(Vec::new()), Err(CoreError::NoData)));
    }

    #[test]
    fn test_single_row_summary_equals_row() {
        let single = row("sglang", "default", Some(120.0), Some(500), Some(10.0));
        let aggregation = aggregate(vec![single]).unwrap();
        assert_eq!(aggregation.table.len(), 1);
        let group = &aggregation.summary[&SummaryKey {
            server: Producer::Sglang,
            model_type: "default".to_string(),
        }];
        assert_eq!(group.rows, 1);
        assert_eq!(group.median_latency, Some(120.0));
        assert_eq!(group.throughput, Some(50.0));
        assert_eq!(group.tokens_per_second, Some(50.0));
    }

    #[test]
    fn test_derived_metric_absent_for_zero_duration() {
        let aggregation = aggregate(vec![
            row("sglang", "default", None, Some(500), Some(0.0)),
            row("sglang", "default", None, Some(500), None),
        ])
        .unwrap();
        assert!(aggregation.table.rows().iter().all(|r| r.tokens_per_second.is_none()));
        let group = aggregation.summary.values().next().unwrap();
        assert_eq!(group.tokens_per_second, None);
        assert_eq!(group.median_latency, None);
    }

    #[test]
    fn test_groups_by_server_and_model_type() {
        let aggregation = aggregate(vec![
            row("shortfin", "trie", Some(100.0), None, None),
            row("shortfin", "none", Some(300.0), None, None),
            row("shortfin", "trie", Some(200.0), None, None),
            row("sglang", "default", None, None, None),
        ])
        .unwrap();
        assert_eq!(aggregation.summary.len(), 3);
        let trie = &aggregation.summary[&SummaryKey {
            server: Producer::Shortfin,
            model_type: "trie".to_string(),
        }];
        assert_eq!(trie.rows, 2);
        assert_eq!(trie.median_latency, Some(150.0));
        assert_eq!(aggregation.table.producers().len(), 2);
    }

    #[test]
    fn test_insertion_order_is_preserved() {
        let aggregation = aggregate(vec![
            row("shortfin", "trie", Some(1.0), None, None),
            row("sglang", "default", Some(2.0), None, None),
        ])
        .unwrap();
        let servers: Vec<&str> = aggregation
            .table
            .rows()
            .iter()
            .map(|r| r.server.as_str())
            .collect();
        assert_eq!(servers, ["shortfin", "sglang"]);
    }
}
