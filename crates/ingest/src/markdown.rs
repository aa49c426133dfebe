//! Markdown output generation for batch summaries.
//!
//! This module renders the grouped performance summary and the per-file
//! outcome of an ingestion batch.

use crate::batch::{BatchReport, FileOutcome};
use llm_metrics_core::Summary;
use std::fmt::{self, Write};

/// Render the grouped summary as a markdown table.
///
/// Means are rounded to two decimals; absent means render as `-`.
pub fn generate_summary(summary: &Summary) -> String {
    let mut output = String::new();
    // Writes into a String are infallible.
    let _ = write_summary(&mut output, summary);
    output
}

fn write_summary(output: &mut String, summary: &Summary) -> fmt::Result {
    writeln!(output, "## Performance Summary")?;
    writeln!(output)?;
    writeln!(
        output,
        "| Server | Model Type | Runs | Median Latency (ms) | Throughput | Tokens/s |"
    )?;
    writeln!(
        output,
        "|--------|------------|------|---------------------|------------|----------|"
    )?;

    for (key, group) in summary {
        writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} |",
            key.server,
            key.model_type,
            group.rows,
            fmt_mean(group.median_latency),
            fmt_mean(group.throughput),
            fmt_mean(group.tokens_per_second),
        )?;
    }
    Ok(())
}

/// Render the per-file outcomes of a batch.
pub fn generate_batch_report(report: &BatchReport) -> String {
    let mut output = String::new();
    let _ = write_batch_report(&mut output, report);
    output
}

fn write_batch_report(output: &mut String, report: &BatchReport) -> fmt::Result {
    writeln!(output, "## Ingestion Report")?;
    writeln!(output)?;
    writeln!(
        output,
        "Files: {} seen, {} processed, {} failed. Rows: {}. Records skipped: {}.",
        report.files_seen(),
        report.files_processed(),
        report.files_failed(),
        report.rows(),
        report.records_skipped(),
    )?;
    writeln!(output)?;

    let failed: Vec<_> = report
        .files
        .iter()
        .filter_map(|file| match &file.outcome {
            FileOutcome::Failed { reason, .. } => Some((file, reason)),
            FileOutcome::Processed { .. } => None,
        })
        .collect();

    if !failed.is_empty() {
        writeln!(output, "### Failed files")?;
        writeln!(output)?;
        for (file, reason) in failed {
            writeln!(output, "- `{}`: {}", file.path.display(), reason)?;
        }
    }
    Ok(())
}

fn fmt_mean(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::FileReport;
    use llm_metrics_core::{Producer, SummaryGroup, SummaryKey};
    use std::path::PathBuf;

    #[test]
    fn test_summary_table_rounds_and_marks_absent() {
        let mut summary = Summary::new();
        summary.insert(
            SummaryKey {
                server: Producer::Shortfin,
                model_type: "trie".to_string(),
            },
            SummaryGroup {
                rows: 2,
                median_latency: Some(120.456),
                throughput: None,
                tokens_per_second: Some(50.0),
            },
        );
        let markdown = generate_summary(&summary);
        assert!(markdown.contains("| shortfin | trie | 2 | 120.46 | - | 50.00 |"));
    }

    #[test]
    fn test_batch_report_lists_failures() {
        let report = BatchReport {
            files: vec![FileReport {
                path: PathBuf::from("sglang_xx_1.jsonl"),
                outcome: FileOutcome::Failed {
                    reason: "malformed filename".to_string(),
                    skipped: 0,
                },
            }],
        };
        let markdown = generate_batch_report(&report);
        assert!(markdown.contains("1 failed"));
        assert!(markdown.contains("`sglang_xx_1.jsonl`: malformed filename"));
    }
}
