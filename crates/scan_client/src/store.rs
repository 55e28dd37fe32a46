//! Scan store backend adapter: one write endpoint and two read endpoints.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{DailySummary, ScanRecord},
    error::{ApiError, EnvelopeError},
    protocol::{
        open_envelope, SaveScanRequest, SaveScanResponse, ScansResponse, StatusResponse,
        SummaryResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    connectivity::StatusProbe,
    error::ScanError,
    http::{endpoint, parse_base_url, read_json},
};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn save_scan(
        &self,
        request: &SaveScanRequest,
    ) -> std::result::Result<SaveScanResponse, ScanError>;
    async fn today_summary(&self) -> std::result::Result<DailySummary, ScanError>;
    async fn recent_scans(&self) -> std::result::Result<Vec<ScanRecord>, ScanError>;
}

pub struct HttpScanStore {
    http: Client,
    backend_url: Url,
}

impl HttpScanStore {
    pub fn new(http: Client, backend_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            backend_url: parse_base_url(backend_url)?,
        })
    }

    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    async fn get_envelope<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> std::result::Result<T, String> {
        let url = endpoint(&self.backend_url, segments);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let (status, body) = read_json(response).await;
        let Some(body) = body else {
            return Err(format!("{url} answered {status} without a JSON body"));
        };
        match open_envelope::<T>(body) {
            Ok(value) => Ok(value),
            Err(err) if status.is_success() => Err(err.to_string()),
            Err(err) => Err(format!(
                "{url} answered {status}: {}",
                err.backend_message().unwrap_or("no details")
            )),
        }
    }
}

#[async_trait]
impl ScanStore for HttpScanStore {
    async fn save_scan(
        &self,
        request: &SaveScanRequest,
    ) -> std::result::Result<SaveScanResponse, ScanError> {
        let url = endpoint(&self.backend_url, &["api", "scan"]);
        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                warn!(barcode = %request.barcode, error = %e, "scan save request failed");
                ScanError::SaveFailed { message: None }
            })?;

        let (status, body) = read_json(response).await;
        let body = body.unwrap_or(Value::Null);
        if !status.is_success() {
            let api: ApiError = serde_json::from_value(body).unwrap_or_else(|_| ApiError {
                ok: false,
                error: None,
            });
            warn!(barcode = %request.barcode, %status, "backend rejected scan");
            return Err(ScanError::SaveFailed {
                message: api
                    .error
                    .map(|message| message.trim().to_string())
                    .filter(|message| !message.is_empty()),
            });
        }

        match open_envelope::<SaveScanResponse>(body) {
            Ok(saved) => Ok(saved),
            Err(err @ EnvelopeError::Rejected(_)) => Err(ScanError::SaveFailed {
                message: err.backend_message().map(str::to_string),
            }),
            Err(EnvelopeError::Malformed(detail)) => {
                warn!(barcode = %request.barcode, detail = %detail, "unexpected save response");
                Err(ScanError::SaveFailed { message: None })
            }
        }
    }

    async fn today_summary(&self) -> std::result::Result<DailySummary, ScanError> {
        let summary: SummaryResponse = self
            .get_envelope(&["api", "summary", "today"])
            .await
            .map_err(ScanError::RefreshFailed)?;
        debug!(date = %summary.date, scans = summary.scans, "fetched daily summary");
        Ok(summary)
    }

    async fn recent_scans(&self) -> std::result::Result<Vec<ScanRecord>, ScanError> {
        let scans: ScansResponse = self
            .get_envelope(&["api", "scans"])
            .await
            .map_err(ScanError::RefreshFailed)?;
        debug!(rows = scans.rows.len(), "fetched scan history");
        Ok(scans.rows)
    }
}

#[async_trait]
impl StatusProbe for HttpScanStore {
    async fn probe(&self) -> Result<()> {
        let status: StatusResponse = self
            .get_envelope(&["api", "status"])
            .await
            .map_err(|e| anyhow!("backend status probe failed: {e}"))?;
        debug!(time = ?status.time, "backend reachable");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
