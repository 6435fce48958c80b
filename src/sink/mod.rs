//! Row forwarding to the Google Apps Script web-app sink.
//!
//! One POST per post's batch, body `{worksheetName, rows}` with rows as
//! positional cell arrays, response `{ok, appended}`. A non-2xx status or
//! `ok != true` is a hard [`ScoutError::Sink`] for that batch — no retries
//! here; the run level decides what a failed batch means.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::{ScoutError, ScoutResult};
use crate::core::types::OutputRow;

/// Seam between the pipeline and the spreadsheet backend, so batch accounting
/// is testable without HTTP.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Append one batch; returns the number of rows the service reports
    /// appended.
    async fn append_rows(&self, rows: &[OutputRow]) -> ScoutResult<u64>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AppendRequest<'a> {
    worksheet_name: &'a str,
    rows: Vec<[&'a str; 4]>,
}

#[derive(Deserialize)]
struct AppendResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    appended: u64,
}

/// HTTP client for the Apps Script web app.
pub struct SheetsSink {
    client: reqwest::Client,
    webapp_url: String,
    worksheet_name: String,
}

impl SheetsSink {
    pub fn new(webapp_url: String, worksheet_name: String) -> ScoutResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ScoutError::Sink(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            webapp_url,
            worksheet_name,
        })
    }
}

#[async_trait]
impl RowSink for SheetsSink {
    async fn append_rows(&self, rows: &[OutputRow]) -> ScoutResult<u64> {
        let payload = AppendRequest {
            worksheet_name: &self.worksheet_name,
            rows: rows.iter().map(OutputRow::as_cells).collect(),
        };

        debug!(
            "sink: POSTing {} rows to worksheet '{}'",
            rows.len(),
            self.worksheet_name
        );

        let resp = self
            .client
            .post(&self.webapp_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ScoutError::Sink(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ScoutError::Sink(format!(
                "sink responded with HTTP {status}"
            )));
        }

        let body: AppendResponse = resp
            .json()
            .await
            .map_err(|e| ScoutError::Sink(format!("invalid sink response: {e}")))?;

        if !body.ok {
            return Err(ScoutError::Sink(
                "sink responded with ok=false".to_string(),
            ));
        }

        Ok(body.appended)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_request_wire_shape() {
        let rows = vec![OutputRow {
            timestamp_utc: "2026-08-25T12:00:00Z".into(),
            account_handle: "natgeo".into(),
            post_url: "https://www.instagram.com/p/ABCDEFGHIJK/".into(),
            username: "alice".into(),
        }];
        let payload = AppendRequest {
            worksheet_name: "likers",
            rows: rows.iter().map(OutputRow::as_cells).collect(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["worksheetName"], "likers");
        assert_eq!(
            json["rows"][0],
            serde_json::json!([
                "2026-08-25T12:00:00Z",
                "natgeo",
                "https://www.instagram.com/p/ABCDEFGHIJK/",
                "alice"
            ])
        );
    }

    #[test]
    fn test_append_response_defaults_reject() {
        // A structurally-empty response must not be mistaken for success.
        let body: AppendResponse = serde_json::from_str("{}").unwrap();
        assert!(!body.ok);
        assert_eq!(body.appended, 0);
    }

    #[test]
    fn test_append_response_parses_success() {
        let body: AppendResponse = serde_json::from_str(r#"{"ok": true, "appended": 17}"#).unwrap();
        assert!(body.ok);
        assert_eq!(body.appended, 17);
    }
}
