//! Wire types and HTTP client for the lightparser service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Body of a parse submission. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseRequest {
    pub text: String,
    pub incremental: bool,
    pub is_final: bool,
}

/// Parser response. `data` is an opaque result payload, `tree` the parse
/// tree. The service does not version its schema; missing fields decode as
/// null rather than failing.
#[derive(Debug, Clone, Deserialize)]
pub struct ParseResponse {
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub tree: Value,
}

#[derive(Clone)]
pub struct ParserClient {
    http: reqwest::Client,
    base_url: String,
}

impl ParserClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn parse(&self, request: &ParseRequest) -> Result<ParseResponse> {
        let response = self
            .http
            .post(format!("{}/lightparser", self.base_url))
            .json(request)
            .send()
            .await
            .context("parse request failed")?
            .error_for_status()
            .context("parser rejected request")?;
        response
            .json::<ParseResponse>()
            .await
            .context("malformed parser response")
    }

    /// Fire-and-forget server-side cache clear. Idempotent; failures are
    /// logged and never surfaced.
    pub async fn clear_cache(&self) {
        let result = self
            .http
            .get(format!("{}/clearcache", self.base_url))
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(code = %e, "cache clear failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_shape() {
        let request = ParseRequest {
            text: "turn on the lights".to_string(),
            incremental: true,
            is_final: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "turn on the lights",
                "incremental": true,
                "is_final": false,
            })
        );
    }

    #[test]
    fn test_response_decodes_with_missing_fields() {
        let response: ParseResponse = serde_json::from_str("{}").unwrap();
        assert!(response.data.is_null());
        assert!(response.tree.is_null());
    }

    #[test]
    fn test_response_decodes_tree() {
        let response: ParseResponse =
            serde_json::from_str(r#"{"data": "ok", "tree": {"verb": "turn"}}"#).unwrap();
        assert_eq!(response.data, serde_json::json!("ok"));
        assert_eq!(response.tree["verb"], "turn");
    }
}
