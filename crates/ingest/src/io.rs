//! Durable tabular dataset output.
//!
//! This module writes the combined metrics table to timestamped CSV, JSON or
//! Parquet files and reads CSV datasets back for loading into the store.

use crate::error::{IngestError, Result};
use arrow_array::{
    ArrayRef, Date32Array, Float64Array, Int64Array, RecordBatch, StringArray, UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use chrono::{Datelike, Local};
use llm_metrics_core::{CanonicalMetricRow, MetricsTable};
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

/// File name prefix of dataset files.
pub const DATASET_PREFIX: &str = "llm_metrics";

/// Columns that must hold a value in every dataset row.
pub const REQUIRED_COLUMNS: [&str; 4] = ["server", "date", "request_rate", "model_type"];

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Dataset file formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// Comma-separated values with a header row; absent values are empty cells.
    #[default]
    Csv,
    /// Pretty-printed JSON array of rows; absent values are `null`.
    Json,
    /// Columnar Parquet file; absent values are nulls.
    Parquet,
}

impl DatasetFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Parquet => "parquet",
        }
    }
}

impl FromStr for DatasetFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "parquet" => Ok(Self::Parquet),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Write the table to `<dir>/llm_metrics_<YYYYmmdd_HHMMSS>.<ext>`, creating `dir`.
///
/// Returns the path written.
///
/// # Errors
///
/// Returns [`IngestError::Dataset`] when the file cannot be written.
pub fn write_dataset(table: &MetricsTable, dir: &Path, format: DatasetFormat) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| IngestError::io(dir, e))?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{DATASET_PREFIX}_{timestamp}.{}", format.extension()));

    match format {
        DatasetFormat::Csv => write_csv(table.rows(), &path)?,
        DatasetFormat::Json => write_json(table.rows(), &path)?,
        DatasetFormat::Parquet => write_parquet(table.rows(), &path)?,
    }

    info!(path = %path.display(), rows = table.len(), %format, "saved processed data");
    Ok(path)
}

/// Write rows as CSV with a header row.
///
/// # Errors
///
/// Returns [`IngestError::Dataset`] when the file cannot be written.
pub fn write_csv(rows: &[CanonicalMetricRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| IngestError::dataset(path, e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| IngestError::dataset(path, e))?;
    }
    writer.flush().map_err(|e| IngestError::io(path, e))
}

/// Write rows as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns [`IngestError::Dataset`] when serialization fails.
pub fn write_json(rows: &[CanonicalMetricRow], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(rows).map_err(|e| IngestError::dataset(path, e))?;
    fs::write(path, json).map_err(|e| IngestError::io(path, e))
}

/// Arrow schema of the Parquet dataset, in canonical column order.
pub fn parquet_schema() -> Schema {
    let float = |name: &str| Field::new(name, DataType::Float64, true);
    let int = |name: &str| Field::new(name, DataType::Int64, true);
    Schema::new(vec![
        Field::new("server", DataType::Utf8, false),
        Field::new("date", DataType::Date32, false),
        Field::new("request_rate", DataType::UInt32, false),
        Field::new("model_type", DataType::Utf8, false),
        Field::new("dataset", DataType::Utf8, true),
        int("input_tokens"),
        int("output_tokens"),
        int("output_tokens_retokenized"),
        float("mean_latency"),
        float("median_latency"),
        float("median_ttft"),
        float("median_itl"),
        float("throughput"),
        float("duration"),
        int("completed_requests"),
        float("tokens_per_second"),
    ])
}

/// Write rows as a single-row-group Parquet file.
///
/// # Errors
///
/// Returns [`IngestError::Dataset`] when encoding fails.
pub fn write_parquet(rows: &[CanonicalMetricRow], path: &Path) -> Result<()> {
    let schema = Arc::new(parquet_schema());
    let ints = |value: fn(&CanonicalMetricRow) -> Option<i64>| -> ArrayRef {
        Arc::new(rows.iter().map(value).collect::<Int64Array>())
    };
    let floats = |value: fn(&CanonicalMetricRow) -> Option<f64>| -> ArrayRef {
        Arc::new(rows.iter().map(value).collect::<Float64Array>())
    };
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.server.to_string()),
        )),
        Arc::new(Date32Array::from_iter_values(
            rows.iter()
                .map(|r| r.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
        )),
        Arc::new(UInt32Array::from_iter_values(
            rows.iter().map(|r| r.request_rate),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.model_type.as_str()),
        )),
        Arc::new(
            rows.iter()
                .map(|r| r.dataset.as_deref())
                .collect::<StringArray>(),
        ),
        ints(|r| r.input_tokens),
        ints(|r| r.output_tokens),
        ints(|r| r.output_tokens_retokenized),
        floats(|r| r.mean_latency),
        floats(|r| r.median_latency),
        floats(|r| r.median_ttft),
        floats(|r| r.median_itl),
        floats(|r| r.throughput),
        floats(|r| r.duration),
        ints(|r| r.completed_requests),
        floats(|r| r.tokens_per_second),
    ];

    let batch = RecordBatch::try_new(Arc::clone(&schema), columns)
        .map_err(|e| IngestError::dataset(path, e))?;
    let file = fs::File::create(path).map_err(|e| IngestError::io(path, e))?;
    let mut writer =
        ArrowWriter::try_new(file, schema, None).map_err(|e| IngestError::dataset(path, e))?;
    writer
        .write(&batch)
        .map_err(|e| IngestError::dataset(path, e))?;
    writer.close().map_err(|e| IngestError::dataset(path, e))?;
    Ok(())
}

/// Read a CSV dataset back into canonical rows.
///
/// Every row must carry a value for each of [`REQUIRED_COLUMNS`].
///
/// # Errors
///
/// Returns [`IngestError::Dataset`] naming the offending row when a
/// required column is empty or a row cannot be decoded.
pub fn read_dataset_csv(path: &Path) -> Result<Vec<CanonicalMetricRow>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| IngestError::dataset(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| IngestError::dataset(path, e))?
        .clone();

    let mut required = Vec::with_capacity(REQUIRED_COLUMNS.len());
    for column in REQUIRED_COLUMNS {
        let index = headers.iter().position(|h| h == column).ok_or_else(|| {
            IngestError::dataset(path, format!("missing required column '{column}'"))
        })?;
        required.push((column, index));
    }

    let mut rows = Vec::new();
    for (number, record) in reader.records().enumerate() {
        let record = record.map_err(|e| IngestError::dataset(path, e))?;
        let row = number + 1;
        for &(column, index) in &required {
            if record.get(index).map_or(true, |v| v.trim().is_empty()) {
                return Err(IngestError::dataset(
                    path,
                    format!("schema violation in row {row}: required column '{column}' is empty"),
                ));
            }
        }
        let decoded = record
            .deserialize(Some(&headers))
            .map_err(|e| IngestError::dataset(path, format!("row {row}: {e}")))?;
        rows.push(decoded);
    }
    Ok(rows)
}

/// The most recently modified CSV dataset in `dir`.
///
/// # Errors
///
/// Returns [`IngestError::Dataset`] when `dir` holds no CSV files.
pub fn latest_dataset(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir).map_err(|e| IngestError::io(dir, e))?;

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| IngestError::io(dir, e))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| IngestError::io(&path, e))?;
        if latest.as_ref().map_or(true, |(t, _)| modified > *t) {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| IngestError::dataset(dir, "no processed CSV files found"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<DatasetFormat>().unwrap(), DatasetFormat::Csv);
        assert_eq!("json".parse::<DatasetFormat>().unwrap(), DatasetFormat::Json);
        assert_eq!(
            "Parquet".parse::<DatasetFormat>().unwrap(),
            DatasetFormat::Parquet
        );
        assert!("xlsx".parse::<DatasetFormat>().is_err());
    }

    const HEADER: &str = "server,date,request_rate,model_type,dataset,input_tokens,\
output_tokens,output_tokens_retokenized,mean_latency,median_latency,median_ttft,\
median_itl,throughput,duration,completed_requests,tokens_per_second";

    fn read_single(row: &str) -> Result<Vec<CanonicalMetricRow>> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        fs::write(&path, format!("{HEADER}\n{row}\n")).unwrap();
        read_dataset_csv(&path)
    }

    #[test]
    fn test_required_columns_name_the_row() {
        let cases = [
            (",2024-12-05,8,default,,,,,,,,,,,,", "server"),
            ("sglang,,8,default,,,,,,,,,,,,", "date"),
            ("sglang,2024-12-05,,default,,,,,,,,,,,,", "request_rate"),
            ("sglang,2024-12-05,8,,,,,,,,,,,,,", "model_type"),
        ];
        for (row, column) in cases {
            let message = read_single(row).unwrap_err().to_string();
            assert!(message.contains("row 1"), "{message}");
            assert!(message.contains(&format!("'{column}'")), "{message}");
        }
    }

    #[test]
    fn test_optional_columns_may_be_empty() {
        let rows = read_single("sglang,2024-12-05,8,default,,,,,,,,,,,,").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_rate, 8);
        assert_eq!(rows[0].tokens_per_second, None);
    }

    #[test]
    fn test_latest_dataset_requires_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        assert!(matches!(
            latest_dataset(dir.path()),
            Err(IngestError::Dataset { .. })
        ));
    }
}
