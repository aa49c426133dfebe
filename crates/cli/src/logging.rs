// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! Process-wide log subscriber.

use crate::config::LoggingConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directive for a `-v` count, falling back to the configured level.
pub fn filter_directive(config: &LoggingConfig, verbose: u8) -> String {
    match verbose {
        0 => config.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over everything else.
///
/// Logs go to stderr so stdout carries only command output.
pub fn init(config: &LoggingConfig, verbose: u8, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(config, verbose)))
        .map_err(|e| anyhow!("invalid log filter: {e}"))?;

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if json || config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow!("failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_overrides_configured_level() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json: false,
        };
        assert_eq!(filter_directive(&config, 0), "warn");
        assert_eq!(filter_directive(&config, 1), "debug");
        assert_eq!(filter_directive(&config, 4), "trace");
    }
}
