// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Record normalizer.
//!
//! Turns the JSONL body of one run file into canonical rows. A record that
//! fails to decode is skipped and counted; it never aborts the file. A file
//! whose every record fails is reported as [`CoreError::EmptyFile`].

use crate::error::{CoreError, Result};
use crate::filename::RunFileName;
use crate::payload::ProducerPayload;
use crate::period::RunPeriod;
use crate::row::{CanonicalMetricRow, RunKey};
use tracing::debug;

/// Combine a decoded filename with the batch's month/year context.
///
/// # Errors
///
/// Returns [`CoreError::MalformedFilename`] when the filename's day does not
/// exist in `period`.
pub fn resolve_run_key(name: &RunFileName, period: RunPeriod) -> Result<RunKey> {
    let date = period.resolve_day(name.calendar_day).ok_or_else(|| {
        CoreError::malformed(
            name.to_string(),
            format!("day {:02} does not exist in {period}", name.calendar_day),
        )
    })?;

    Ok(RunKey {
        server: name.server.clone(),
        date,
        request_rate: name.request_rate,
        model_type: name.model_type.clone(),
    })
}

/// Map one decoded record onto the canonical schema.
pub fn normalize_record(payload: ProducerPayload, key: &RunKey) -> CanonicalMetricRow {
    let mut row = CanonicalMetricRow::new(key.clone());
    payload.apply_to(&mut row);
    row
}

/// A record that was skipped while normalizing a run file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based line number.
    pub line: usize,
    /// Decoder message.
    pub reason: String,
}

impl From<SkippedRecord> for CoreError {
    fn from(skipped: SkippedRecord) -> Self {
        CoreError::RecordParse {
            line: skipped.line,
            reason: skipped.reason,
        }
    }
}

/// Rows decoded from one run file.
#[derive(Debug, Clone, Default)]
pub struct NormalizedFile {
    /// Canonical rows in line order.
    pub rows: Vec<CanonicalMetricRow>,
    /// Records that could not be decoded.
    pub skipped: Vec<SkippedRecord>,
}

/// Normalize every non-blank line of a run file body.
///
/// # Errors
///
/// Returns [`CoreError::EmptyFile`] when no line yields a row.
pub fn normalize_run(contents: &str, key: &RunKey) -> Result<NormalizedFile> {
    let mut normalized = NormalizedFile::default();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match ProducerPayload::decode(&key.server, line) {
            Ok(payload) => normalized.rows.push(normalize_record(payload, key)),
            Err(reason) => {
                debug!(line = index + 1, %reason, "skipping undecodable record");
                normalized.skipped.push(SkippedRecord {
                    line: index + 1,
                    reason,
                });
            }
        }
    }

    if normalized.rows.is_empty() {
        return Err(CoreError::EmptyFile {
            skipped: normalized.skipped.len(),
        });
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::DEFAULT_MODEL_TYPE;
    use crate::producer::Producer;
    use chrono::NaiveDate;

    fn key(server: Producer) -> RunKey {
        RunKey {
            server,
            date: NaiveDate::from_ymd_opt(2024, 12, 5).unwrap(),
            request_rate: 8,
            model_type: DEFAULT_MODEL_TYPE.to_string(),
        }
    }

    #[test]
    fn test_resolve_run_key() {
        let name = RunFileName::parse("shortfin_05_8_trie.jsonl").unwrap();
        let key = resolve_run_key(&name, "2024-12".parse().unwrap()).unwrap();
        assert_eq!(key.date, NaiveDate::from_ymd_opt(2024, 12, 5).unwrap());
        assert_eq!(key.model_type, "trie");
    }

    #[test]
    fn test_resolve_run_key_rejects_missing_day() {
        let name = RunFileName::parse("sglang_31_8.jsonl").unwrap();
        let err = resolve_run_key(&name, "2024-04".parse().unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::MalformedFilename { .. }));
    }

    #[test]
    fn test_missing_fields_stay_absent() {
        let body = r#"{"median_e2e_latency_ms": 0, "dataset_name": "sharegpt"}"#;
        let file = normalize_run(body, &key(Producer::Sglang)).unwrap();
        let row = &file.rows[0];
        assert_eq!(row.median_latency, Some(0.0));
        assert_eq!(row.dataset.as_deref(), Some("sharegpt"));
        assert_eq!(row.mean_latency, None);
        assert_eq!(row.throughput, None);
        assert_eq!(row.completed_requests, None);
    }

    #[test]
    fn test_bad_lines_are_skipped_and_counted() {
        let body = "{\"duration\": 10}\nnot json\n\n{\"duration\": \"x\"}\n{\"duration\": 20}\n";
        let file = normalize_run(body, &key(Producer::Shortfin)).unwrap();
        assert_eq!(file.rows.len(), 2);
        assert_eq!(file.skipped.len(), 2);
        assert_eq!(file.skipped[0].line, 2);
        assert_eq!(file.skipped[1].line, 4);
    }

    #[test]
    fn test_file_without_usable_records_is_empty() {
        let err = normalize_run("garbage\n[]\n", &key(Producer::Sglang)).unwrap_err();
        assert!(matches!(err, CoreError::EmptyFile { skipped: 2 }));

        let err = normalize_run("\n\n", &key(Producer::Sglang)).unwrap_err();
        assert!(matches!(err, CoreError::EmptyFile { skipped: 0 }));
    }

    #[test]
    fn test_unknown_producer_uses_field_map() {
        let body = r#"{"output_throughput": 12.5, "total_output_tokens": 40, "duration": "n/a"}"#;
        let file = normalize_run(body, &key(Producer::from("vllm"))).unwrap();
        let row = &file.rows[0];
        assert_eq!(row.throughput, Some(12.5));
        assert_eq!(row.output_tokens, Some(40));
        assert_eq!(row.duration, None);
    }
}
