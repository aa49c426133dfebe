// Copyright 2025 LLM Metrics Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the Grafana dashboard API.

use crate::error::{DashboardError, Result};
use crate::model::DashboardRequest;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Upsert endpoint path.
pub const UPSERT_PATH: &str = "/api/dashboards/db";

/// Successful upsert reply.
///
/// Every field is optional on the wire; a 2xx reply with an empty or
/// non-JSON body yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpsertResponse {
    /// Numeric dashboard id.
    #[serde(default)]
    pub id: Option<i64>,
    /// Dashboard uid.
    #[serde(default)]
    pub uid: String,
    /// Relative dashboard URL.
    #[serde(default)]
    pub url: String,
    /// Service status string, usually `"success"`.
    #[serde(default)]
    pub status: String,
    /// Stored version.
    #[serde(default)]
    pub version: i64,
}

impl UpsertResponse {
    /// Read a 2xx reply body, falling back to `uid` when it carries none.
    pub fn from_body(body: &str, uid: &str) -> Self {
        let mut reply: Self = serde_json::from_str(body).unwrap_or_default();
        if reply.uid.is_empty() {
            reply.uid = uid.to_string();
        }
        reply
    }
}

/// Grafana API client authenticated with a bearer token.
///
/// The base URL is kept without a trailing slash.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    base_url: String,
    client: Client,
}

impl GrafanaClient {
    /// Build a client for `base_url` using `api_key` on every request.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::InvalidConfig`] for an empty URL or key, or a
    /// key that cannot be sent as a header.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        if base_url.is_empty() {
            return Err(DashboardError::InvalidConfig(
                "dashboard url is empty".to_string(),
            ));
        }
        if api_key.trim().is_empty() {
            return Err(DashboardError::InvalidConfig(
                "dashboard api key is empty".to_string(),
            ));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| {
            DashboardError::InvalidConfig(
                "dashboard api key is not a valid header value".to_string(),
            )
        })?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: base_url.to_string(),
            client,
        })
    }

    /// Base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create or overwrite the dashboard identified by the request's uid.
    ///
    /// # Errors
    ///
    /// Any non-2xx reply is [`DashboardError::ExternalService`] carrying the
    /// status and response body. No retry is attempted. Any 2xx reply is a
    /// success, whatever its body.
    #[instrument(skip(self, request), fields(uid = %request.dashboard.uid))]
    pub async fn upsert(&self, request: &DashboardRequest) -> Result<UpsertResponse> {
        let url = format!("{}{UPSERT_PATH}", self.base_url);
        let response = self.client.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Dashboard upsert rejected");
            return Err(DashboardError::ExternalService {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let reply = UpsertResponse::from_body(&body, &request.dashboard.uid);
        info!(
            status = status.as_u16(),
            uid = %reply.uid,
            version = reply.version,
            url = %reply.url,
            "Dashboard updated"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let client =
            GrafanaClient::new("http://grafana:3000/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://grafana:3000");
    }

    #[test]
    fn test_reply_body_is_read_leniently() {
        let full = UpsertResponse::from_body(
            r#"{"id": 7, "uid": "abc", "url": "/d/abc", "status": "success", "version": 2}"#,
            "fallback",
        );
        assert_eq!(full.id, Some(7));
        assert_eq!(full.uid, "abc");
        assert_eq!(full.version, 2);

        let empty = UpsertResponse::from_body("", "llm-metrics");
        assert_eq!(empty.uid, "llm-metrics");
        assert_eq!(empty.id, None);

        let text = UpsertResponse::from_body("accepted", "llm-metrics");
        assert_eq!(text.uid, "llm-metrics");
        assert!(text.url.is_empty());
    }

    #[test]
    fn test_rejects_missing_settings() {
        assert!(matches!(
            GrafanaClient::new("", "key", Duration::from_secs(5)),
            Err(DashboardError::InvalidConfig(_))
        ));
        assert!(matches!(
            GrafanaClient::new("http://grafana:3000", " ", Duration::from_secs(5)),
            Err(DashboardError::InvalidConfig(_))
        ));
        assert!(matches!(
            GrafanaClient::new("http://grafana:3000", "bad\nkey", Duration::from_secs(5)),
            Err(DashboardError::InvalidConfig(_))
        ));
    }
}
