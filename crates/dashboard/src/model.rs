// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dashboard body and upsert request.

use crate::panel::{build_panels, PanelSpec};
use chrono::{DateTime, Utc};
use llm_metrics_core::{MetricsTable, Producer, Summary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identity and presentation settings of the exported dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Stable identifier the upsert overwrites.
    pub uid: String,
    /// Dashboard title.
    pub title: String,
    /// Tags added to every export.
    pub tags: Vec<String>,
    /// Auto-refresh interval.
    pub refresh: String,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            uid: "llm-metrics".to_string(),
            title: "LLM Benchmark Metrics".to_string(),
            tags: vec!["llm".to_string(), "benchmarks".to_string()],
            refresh: "5m".to_string(),
        }
    }
}

/// Anything a dashboard can be exported from.
pub trait DashboardSource {
    /// Producers present in the data, added to the dashboard tags.
    fn producers(&self) -> BTreeSet<Producer>;
}

impl DashboardSource for MetricsTable {
    fn producers(&self) -> BTreeSet<Producer> {
        MetricsTable::producers(self)
    }
}

impl DashboardSource for Summary {
    fn producers(&self) -> BTreeSet<Producer> {
        self.keys().map(|key| key.server.clone()).collect()
    }
}

/// The dashboard document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Always `null`; the service matches on `uid`.
    pub id: Option<i64>,
    /// Stable identifier.
    pub uid: String,
    /// Title.
    pub title: String,
    /// Configured tags followed by producer names.
    pub tags: Vec<String>,
    /// Display timezone.
    pub timezone: String,
    /// Metric panels.
    pub panels: Vec<PanelSpec>,
    /// Auto-refresh interval.
    pub refresh: String,
    /// Dashboard JSON schema version.
    pub schema_version: u32,
    /// Document version.
    pub version: u32,
}

/// Body of `POST /api/dashboards/db`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRequest {
    /// The document to store.
    pub dashboard: Dashboard,
    /// Change note.
    pub message: String,
    /// Replace an existing dashboard with the same uid.
    pub overwrite: bool,
}

/// Build the upsert request for `source`, stamped with `exported_at`.
pub fn build_dashboard<S>(
    source: &S,
    settings: &DashboardSettings,
    exported_at: DateTime<Utc>,
) -> DashboardRequest
where
    S: DashboardSource + ?Sized,
{
    let mut tags = settings.tags.clone();
    for producer in source.producers() {
        let tag = producer.as_str().to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    DashboardRequest {
        dashboard: Dashboard {
            id: None,
            uid: settings.uid.clone(),
            title: settings.title.clone(),
            tags,
            timezone: "browser".to_string(),
            panels: build_panels(),
            refresh: settings.refresh.clone(),
            schema_version: 36,
            version: 1,
        },
        message: format!("Dashboard updated at {}", exported_at.to_rfc3339()),
        overwrite: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use llm_metrics_core::{aggregate, CanonicalMetricRow, RunKey};

    fn table() -> MetricsTable {
        let rows = ["shortfin", "sglang", "shortfin"]
            .iter()
            .map(|server| {
                CanonicalMetricRow::new(RunKey {
                    server: Producer::from(*server),
                    date: NaiveDate::from_ymd_opt(2024, 12, 5).unwrap(),
                    request_rate: 8,
                    model_type: "default".to_string(),
                })
            })
            .collect();
        aggregate(rows).unwrap().table
    }

    #[test]
    fn test_body_shape() {
        let exported_at = Utc.with_ymd_and_hms(2024, 12, 6, 3, 0, 0).unwrap();
        let request = build_dashboard(&table(), &DashboardSettings::default(), exported_at);
        let value = serde_json::to_value(&request).unwrap();

        assert!(value["dashboard"]["id"].is_null());
        assert_eq!(value["dashboard"]["uid"], "llm-metrics");
        assert_eq!(value["dashboard"]["timezone"], "browser");
        assert_eq!(value["dashboard"]["refresh"], "5m");
        assert_eq!(value["dashboard"]["schemaVersion"], 36);
        assert_eq!(value["dashboard"]["version"], 1);
        assert_eq!(value["dashboard"]["panels"].as_array().unwrap().len(), 5);
        assert_eq!(value["overwrite"], true);
        assert_eq!(value["message"], "Dashboard updated at 2024-12-06T03:00:00+00:00");
    }

    #[test]
    fn test_tags_include_producers_once() {
        let table = table();
        let from_table = build_dashboard(&table, &DashboardSettings::default(), Utc::now());
        assert_eq!(
            from_table.dashboard.tags,
            vec!["llm", "benchmarks", "sglang", "shortfin"]
        );

        let summary = table.summarize();
        let from_summary = build_dashboard(&summary, &DashboardSettings::default(), Utc::now());
        assert_eq!(from_summary.dashboard.tags, from_table.dashboard.tags);
        assert_eq!(from_summary.dashboard.panels, from_table.dashboard.panels);
    }
}
