// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run filename grammar.
//!
//! Benchmark harnesses encode run metadata in the file name:
//!
//! ```text
//! <server>_<day>_<rate>[_<model_type>].jsonl
//! ```
//!
//! `day` is a two-digit day of month with no month or year attached, `rate`
//! is the requested load level and the optional `model_type` is a cache mode
//! tag (for example `trie` or `none` for shortfin runs).

use crate::error::{CoreError, Result};
use crate::producer::Producer;
use std::fmt;
use std::path::Path;

/// Sentinel model type used when a run has no cache-mode tag.
pub const DEFAULT_MODEL_TYPE: &str = "default";

/// Extension carried by run files.
pub const RUN_FILE_EXTENSION: &str = "jsonl";

/// Run metadata decoded from a run filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFileName {
    /// Producer that generated the file.
    pub server: Producer,
    /// Day of month (1-31).
    pub calendar_day: u8,
    /// Requested load level.
    pub request_rate: u32,
    /// Cache mode tag, or [`DEFAULT_MODEL_TYPE`].
    pub model_type: String,
}

impl RunFileName {
    /// Parse a filename, with or without the `.jsonl` extension.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedFilename`] when any segment violates the
    /// grammar.
    pub fn parse(file_name: &str) -> Result<Self> {
        let stem = file_name.strip_suffix(".jsonl").unwrap_or(file_name);

        let segments: Vec<&str> = stem.split('_').collect();
        if !(3..=4).contains(&segments.len()) {
            return Err(CoreError::malformed(
                file_name,
                format!("expected 3 or 4 '_'-separated segments, found {}", segments.len()),
            ));
        }

        let server = segments[0];
        if server.is_empty() {
            return Err(CoreError::malformed(file_name, "empty server segment"));
        }

        let calendar_day = parse_day(segments[1]).ok_or_else(|| {
            CoreError::malformed(file_name, format!("invalid day '{}'", segments[1]))
        })?;

        let request_rate = parse_rate(segments[2]).ok_or_else(|| {
            CoreError::malformed(file_name, format!("invalid request rate '{}'", segments[2]))
        })?;

        let model_type = match segments.get(3) {
            Some(tag) if tag.is_empty() => {
                return Err(CoreError::malformed(file_name, "empty model type segment"));
            }
            Some(tag) => (*tag).to_string(),
            None => DEFAULT_MODEL_TYPE.to_string(),
        };

        Ok(Self {
            server: Producer::from(server),
            calendar_day,
            request_rate,
            model_type,
        })
    }

    /// Parse the final component of a path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedFilename`] when the path has no UTF-8
    /// file name or the name violates the grammar.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CoreError::malformed(path.display().to_string(), "no file name"))?;
        Self::parse(name)
    }
}

impl fmt::Display for RunFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:02}_{}", self.server, self.calendar_day, self.request_rate)?;
        if self.model_type != DEFAULT_MODEL_TYPE {
            write!(f, "_{}", self.model_type)?;
        }
        Ok(())
    }
}

/// Two ASCII digits in 01..=31.
fn parse_day(segment: &str) -> Option<u8> {
    if segment.len() != 2 || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let day: u8 = segment.parse().ok()?;
    (1..=31).contains(&day).then_some(day)
}

/// Positive decimal integer; signs and whitespace are rejected.
fn parse_rate(segment: &str) -> Option<u32> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse::<u32>().ok().filter(|rate| *rate > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_model_type() {
        let parsed = RunFileName::parse("sglang_05_8.jsonl").unwrap();
        assert_eq!(parsed.server, Producer::Sglang);
        assert_eq!(parsed.calendar_day, 5);
        assert_eq!(parsed.request_rate, 8);
        assert_eq!(parsed.model_type, DEFAULT_MODEL_TYPE);
    }

    #[test]
    fn test_parse_with_model_type() {
        let parsed = RunFileName::parse("shortfin_10_32_trie.jsonl").unwrap();
        assert_eq!(parsed.server, Producer::Shortfin);
        assert_eq!(parsed.calendar_day, 10);
        assert_eq!(parsed.request_rate, 32);
        assert_eq!(parsed.model_type, "trie");
    }

    #[test]
    fn test_parse_stripped_extension() {
        let parsed = RunFileName::parse("shortfin_10_1_none").unwrap();
        assert_eq!(parsed.model_type, "none");
    }

    #[test]
    fn test_unknown_server_passes_through() {
        let parsed = RunFileName::parse("vllm_03_4.jsonl").unwrap();
        assert_eq!(parsed.server, Producer::Other("vllm".to_string()));
    }

    #[test]
    fn test_from_path_uses_file_name() {
        let path = Path::new("extracted/benchmark_files/sglang_05_8.jsonl");
        let parsed = RunFileName::from_path(path).unwrap();
        assert_eq!(parsed.request_rate, 8);
    }

    #[test]
    fn test_rejects_malformed_names() {
        for name in [
            "sglang.jsonl",
            "sglang_05.jsonl",
            "sglang_5_8.jsonl",
            "sglang_005_8.jsonl",
            "sglang_00_8.jsonl",
            "sglang_32_8.jsonl",
            "sglang_ab_8.jsonl",
            "sglang_05_x.jsonl",
            "sglang_05_0.jsonl",
            "sglang_05_-8.jsonl",
            "sglang_05_+8.jsonl",
            "sglang_05_8_.jsonl",
            "_05_8.jsonl",
            "shortfin_05_8_trie_extra.jsonl",
        ] {
            let err = RunFileName::parse(name).unwrap_err();
            assert!(
                matches!(err, CoreError::MalformedFilename { .. }),
                "{name} should be malformed"
            );
        }
    }

    #[test]
    fn test_display_reencodes() {
        let parsed = RunFileName::parse("shortfin_05_8_trie.jsonl").unwrap();
        assert_eq!(parsed.to_string(), "shortfin_05_8_trie");
        let parsed = RunFileName::parse("sglang_05_8.jsonl").unwrap();
        assert_eq!(parsed.to_string(), "sglang_05_8");
    }
}
