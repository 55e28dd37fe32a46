use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(6);

pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}

/// Parses a service base url, dropping any trailing slash so endpoints can be appended.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(anyhow!("base url must not be empty"));
    }
    let url = Url::parse(trimmed).with_context(|| format!("invalid base url '{trimmed}'"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("unsupported url scheme '{other}' in '{trimmed}'")),
    }
}

/// Appends path segments to `base`, percent-encoding each one.
pub fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// Status plus the body decoded as JSON when it is JSON at all.
pub(crate) async fn read_json(response: Response) -> (StatusCode, Option<Value>) {
    let status = response.status();
    let body = response.json::<Value>().await.ok();
    (status, body)
}
