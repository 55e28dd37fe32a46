use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure envelope returned by the scan backend: `{"ok": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(message.into()),
        }
    }

    pub fn message_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .unwrap_or(fallback)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("backend reported failure: {}", .0.message_or("no details"))]
    Rejected(ApiError),
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl EnvelopeError {
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            EnvelopeError::Rejected(api) => api
                .error
                .as_deref()
                .map(str::trim)
                .filter(|message| !message.is_empty()),
            EnvelopeError::Malformed(_) => None,
        }
    }
}
