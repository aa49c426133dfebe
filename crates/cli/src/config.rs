// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `LLM_METRICS__<SECTION>__<KEY>` variables, then the well-known
//! `GRAFANA_API_KEY`, `GRAFANA_URL`, `DATA_DIR` and `DATABASE_URL`
//! variables. Command-line flags are applied on top by the caller.

use anyhow::{anyhow, Context, Result};
use ::config::{Config, Environment, File};
use llm_metrics_core::RunPeriod;
use llm_metrics_dashboard::DashboardSettings;
use llm_metrics_ingest::io::DatasetFormat;
use llm_metrics_storage::{DuplicatePolicy, StoreOptions};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of structured environment overrides.
pub const ENV_PREFIX: &str = "LLM_METRICS";

/// Well-known variables and the keys they override.
const WELL_KNOWN_VARS: [(&str, &str); 4] = [
    ("GRAFANA_API_KEY", "dashboard.api_key"),
    ("GRAFANA_URL", "dashboard.url"),
    ("DATA_DIR", "ingest.data_dir"),
    ("DATABASE_URL", "database.url"),
];

/// Complete application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Ingestion settings.
    pub ingest: IngestConfig,
    /// Relational store settings.
    pub database: DatabaseConfig,
    /// Dashboard export settings.
    pub dashboard: DashboardConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Ingestion settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Month and year the run files belong to.
    pub period: Option<RunPeriod>,
    /// Directory of already-extracted run files, scanned by `dashboard`.
    pub data_dir: PathBuf,
    /// Where archives are extracted.
    pub extract_dir: PathBuf,
    /// Where datasets are written.
    pub output_dir: PathBuf,
    /// Dataset format.
    pub format: DatasetFormat,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            period: None,
            data_dir: PathBuf::from("/data/metrics"),
            extract_dir: PathBuf::from("extracted_data"),
            output_dir: PathBuf::from("processed_data"),
            format: DatasetFormat::Csv,
        }
    }
}

impl IngestConfig {
    /// The configured period, which every ingesting command needs.
    pub fn require_period(&self) -> Result<RunPeriod> {
        self.period.ok_or_else(|| {
            anyhow!("no run period configured; pass --period YYYY-MM or set ingest.period")
        })
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `postgres://...` or `sqlite:...`.
    pub url: Option<String>,
    /// Create the database when missing.
    pub create_database: bool,
    /// Handling of re-ingested runs.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let options = StoreOptions::default();
        Self {
            url: None,
            create_database: options.create_database,
            duplicate_policy: options.duplicate_policy,
        }
    }
}

impl DatabaseConfig {
    /// The store URL, which `init-db`, `load` and `run` need.
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| {
                anyhow!("no database url configured; pass --database-url or set DATABASE_URL")
            })
    }

    /// Backend-independent store options.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            duplicate_policy: self.duplicate_policy,
            create_database: self.create_database,
        }
    }
}

/// Dashboard export settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Grafana base URL.
    pub url: Option<String>,
    /// Grafana API key.
    pub api_key: Option<String>,
    /// Dashboard uid.
    pub uid: String,
    /// Dashboard title.
    pub title: String,
    /// Static tags.
    pub tags: Vec<String>,
    /// Auto-refresh interval.
    pub refresh: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let settings = DashboardSettings::default();
        Self {
            url: None,
            api_key: None,
            uid: settings.uid,
            title: settings.title,
            tags: settings.tags,
            refresh: settings.refresh,
            timeout_secs: 30,
        }
    }
}

impl DashboardConfig {
    /// Base URL and API key, both required to export.
    pub fn require_credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow!("GRAFANA_URL is not set"))?;
        let key = self
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("GRAFANA_API_KEY is not set"))?;
        Ok((url, key))
    }

    /// Dashboard identity and presentation.
    pub fn settings(&self) -> DashboardSettings {
        DashboardSettings {
            uid: self.uid.clone(),
            title: self.title.clone(),
            tags: self.tags.clone(),
            refresh: self.refresh.clone(),
        }
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Load configuration from `file` and the process environment.
pub fn load(file: Option<&Path>) -> Result<AppConfig> {
    load_with_env(file, std::env::vars().collect())
}

/// Load configuration from `file` and the given variables.
pub fn load_with_env(file: Option<&Path>, vars: HashMap<String, String>) -> Result<AppConfig> {
    let mut builder = Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(true));
    }

    let well_known: Vec<(&str, Option<String>)> = WELL_KNOWN_VARS
        .iter()
        .map(|(var, key)| (*key, vars.get(*var).cloned()))
        .collect();

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("dashboard.tags")
            .try_parsing(true)
            .source(Some(vars.into_iter().collect())),
    );
    for (key, value) in well_known {
        builder = builder
            .set_override_option(key, value)
            .with_context(|| format!("invalid override for {key}"))?;
    }

    let config = builder.build().context("failed to read configuration")?;
    config
        .try_deserialize()
        .context("configuration does not match the expected layout")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = load_with_env(None, HashMap::new()).unwrap();
        assert!(config.ingest.period.is_none());
        assert_eq!(config.ingest.data_dir, PathBuf::from("/data/metrics"));
        assert_eq!(config.ingest.format, DatasetFormat::Csv);
        assert_eq!(config.database.duplicate_policy, DuplicatePolicy::Append);
        assert!(config.database.create_database);
        assert_eq!(config.dashboard.uid, "llm-metrics");
        assert_eq!(config.logging.level, "info");
        assert!(config.ingest.require_period().is_err());
        assert!(config.database.require_url().is_err());
    }

    #[test]
    fn test_file_then_env_then_well_known() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.toml");
        fs::write(
            &path,
            r#"
[ingest]
period = "2024-12"
format = "json"

[database]
url = "sqlite://from-file.db"
duplicate_policy = "replace_run_keys"

[dashboard]
uid = "from-file"
"#,
        )
        .unwrap();

        let config = load_with_env(
            Some(&path),
            vars(&[
                ("LLM_METRICS__DASHBOARD__UID", "from-env"),
                ("LLM_METRICS__DASHBOARD__TIMEOUT_SECS", "5"),
                ("DATABASE_URL", "postgres://db/llm_metrics"),
                ("GRAFANA_URL", "http://grafana:3000"),
                ("GRAFANA_API_KEY", "key"),
            ]),
        )
        .unwrap();

        assert_eq!(config.ingest.require_period().unwrap().to_string(), "2024-12");
        assert_eq!(config.ingest.format, DatasetFormat::Json);
        assert_eq!(config.database.duplicate_policy, DuplicatePolicy::ReplaceRunKeys);
        assert_eq!(config.database.require_url().unwrap(), "postgres://db/llm_metrics");
        assert_eq!(config.dashboard.uid, "from-env");
        assert_eq!(config.dashboard.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.dashboard.require_credentials().unwrap(),
            ("http://grafana:3000", "key")
        );
    }

    #[test]
    fn test_invalid_period_is_rejected() {
        let env = vars(&[("LLM_METRICS__INGEST__PERIOD", "2024-13")]);
        let err = load_with_env(None, env).unwrap_err();
        assert!(format!("{err:#}").contains("configuration"));
    }

    #[test]
    fn test_missing_dashboard_credentials() {
        let config = load_with_env(None, vars(&[("GRAFANA_URL", "http://grafana:3000")])).unwrap();
        let err = config.dashboard.require_credentials().unwrap_err();
        assert_eq!(err.to_string(), "GRAFANA_API_KEY is not set");
    }
}
