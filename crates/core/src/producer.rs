// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark producer identifiers.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// The load-testing harness (system under test) that produced a run file.
///
/// Unrecognized identifiers are carried verbatim in [`Producer::Other`] so new
/// systems can be ingested before they get a dedicated variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Producer {
    /// SGLang serving runtime.
    Sglang,
    /// Shortfin serving runtime.
    Shortfin,
    /// Any other producer, kept as reported.
    Other(String),
}

impl Producer {
    /// Identifier as it appears in filenames and in the store.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sglang => "sglang",
            Self::Shortfin => "shortfin",
            Self::Other(name) => name,
        }
    }

    /// Whether this producer has a dedicated payload decoder.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for Producer {
    fn from(raw: &str) -> Self {
        match raw {
            "sglang" => Self::Sglang,
            "shortfin" => Self::Shortfin,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for Producer {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "sglang" => Self::Sglang,
            "shortfin" => Self::Shortfin,
            _ => Self::Other(raw),
        }
    }
}

impl From<Producer> for String {
    fn from(producer: Producer) -> Self {
        match producer {
            Producer::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for Producer {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_producers() {
        assert_eq!(Producer::from("sglang"), Producer::Sglang);
        assert_eq!(Producer::from("shortfin"), Producer::Shortfin);
        assert!(Producer::Sglang.is_known());
    }

    #[test]
    fn test_unknown_producer_passes_through() {
        let producer = Producer::from("vllm");
        assert_eq!(producer, Producer::Other("vllm".to_string()));
        assert_eq!(producer.to_string(), "vllm");
        assert!(!producer.is_known());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let json = serde_json::to_string(&Producer::Shortfin).unwrap();
        assert_eq!(json, "\"shortfin\"");
        let back: Producer = serde_json::from_str("\"tgi\"").unwrap();
        assert_eq!(back, Producer::Other("tgi".to_string()));
    }
}
