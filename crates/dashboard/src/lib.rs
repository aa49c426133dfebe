//! Grafana dashboard export for canonical benchmark metrics.
//!
//! [`build_dashboard`] turns a [`MetricsTable`](llm_metrics_core::MetricsTable)
//! or a [`Summary`](llm_metrics_core::Summary) into an upsert request with the
//! fixed five-panel layout, and [`GrafanaClient::upsert`] submits it.
//!
//! ```no_run
//! # async fn export(table: &llm_metrics_core::MetricsTable) -> llm_metrics_dashboard::Result<()> {
//! use llm_metrics_dashboard::{build_dashboard, DashboardSettings, GrafanaClient};
//! use std::time::Duration;
//!
//! let client = GrafanaClient::new("http://grafana:3000", "api-key", Duration::from_secs(30))?;
//! let request = build_dashboard(table, &DashboardSettings::default(), chrono::Utc::now());
//! let reply = client.upsert(&request).await?;
//! println!("dashboard at {}", reply.url);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod model;
pub mod panel;

pub use client::{GrafanaClient, UpsertResponse, UPSERT_PATH};
pub use error::{DashboardError, Result};
pub use model::{build_dashboard, Dashboard, DashboardRequest, DashboardSettings, DashboardSource};
pub use panel::{build_panels, GridPos, MetricPanel, PanelSpec, PanelTarget, METRIC_PANELS};
