// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Panel definitions.
//!
//! Every export renders the same five metrics, in a fixed order, as
//! time-series panels on a two-column grid.

use llm_metrics_core::METRICS_TABLE;
use serde::Serialize;
use serde_json::{json, Value};

/// Panel height in grid units.
pub const PANEL_HEIGHT: u32 = 8;
/// Panel width in grid units; two panels fill a row.
pub const PANEL_WIDTH: u32 = 12;

/// One exported metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricPanel {
    /// Dashboard variable name used in the panel expression.
    pub key: &'static str,
    /// Panel title.
    pub title: &'static str,
    /// Canonical column the panel plots.
    pub column: &'static str,
}

/// Metrics rendered on every dashboard, in panel order.
pub const METRIC_PANELS: [MetricPanel; 5] = [
    MetricPanel {
        key: "e2e_latency",
        title: "Median E2E Latency",
        column: "median_latency",
    },
    MetricPanel {
        key: "ttft",
        title: "Median TTFT",
        column: "median_ttft",
    },
    MetricPanel {
        key: "itl",
        title: "Median ITL",
        column: "median_itl",
    },
    MetricPanel {
        key: "throughput",
        title: "Request Throughput",
        column: "throughput",
    },
    MetricPanel {
        key: "duration",
        title: "Benchmark Duration",
        column: "duration",
    },
];

/// Grid placement of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridPos {
    /// Height.
    pub h: u32,
    /// Width.
    pub w: u32,
    /// Column offset.
    pub x: u32,
    /// Row offset.
    pub y: u32,
}

impl GridPos {
    /// Position of the `index`-th panel (0-based) on the two-column grid.
    pub fn for_index(index: usize) -> Self {
        let index = index as u32;
        Self {
            h: PANEL_HEIGHT,
            w: PANEL_WIDTH,
            x: (index % 2) * PANEL_WIDTH,
            y: (index / 2) * PANEL_HEIGHT,
        }
    }
}

/// A panel's data query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelTarget {
    /// Query identifier within the panel.
    pub ref_id: String,
    /// Variable expression naming the metric.
    pub expr: String,
    /// SQL selecting the metric per `(server, model_type)` series over time.
    pub raw_sql: String,
}

/// One time-series panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelSpec {
    /// 1-based panel id.
    pub id: u32,
    /// Grid placement.
    pub grid_pos: GridPos,
    /// Visualization kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Panel title.
    pub title: String,
    /// Data queries; always exactly one.
    pub targets: Vec<PanelTarget>,
    /// Display options.
    pub field_config: Value,
}

fn metric_query(column: &str) -> String {
    format!(
        "SELECT date AS time, CONCAT(server, '/', model_type) AS metric, AVG({column}) AS value \
         FROM {table} WHERE $__timeFilter(date) \
         GROUP BY date, server, model_type ORDER BY date",
        table = METRICS_TABLE
    )
}

fn field_config() -> Value {
    json!({
        "defaults": {
            "color": { "mode": "palette-classic" },
            "custom": {
                "axisCenteredZero": false,
                "axisColorMode": "text",
                "axisLabel": "",
                "axisPlacement": "auto",
                "barAlignment": 0,
                "drawStyle": "line",
                "fillOpacity": 10,
                "gradientMode": "none",
                "hideFrom": { "legend": false, "tooltip": false, "viz": false },
                "lineInterpolation": "linear",
                "lineWidth": 1,
                "pointSize": 5,
                "scaleDistribution": { "type": "linear" },
                "showPoints": "auto",
                "spanNulls": false,
                "stacking": { "group": "A", "mode": "none" },
                "thresholdsStyle": { "mode": "off" }
            }
        }
    })
}

impl PanelSpec {
    /// Render the `index`-th metric panel.
    pub fn for_metric(index: usize, metric: &MetricPanel) -> Self {
        Self {
            id: index as u32 + 1,
            grid_pos: GridPos::for_index(index),
            kind: "timeseries".to_string(),
            title: metric.title.to_string(),
            targets: vec![PanelTarget {
                ref_id: "A".to_string(),
                expr: format!("${}", metric.key),
                raw_sql: metric_query(metric.column),
            }],
            field_config: field_config(),
        }
    }
}

/// All metric panels, in order.
pub fn build_panels() -> Vec<PanelSpec> {
    METRIC_PANELS
        .iter()
        .enumerate()
        .map(|(index, metric)| PanelSpec::for_metric(index, metric))
        .collect()
}
