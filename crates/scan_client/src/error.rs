use thiserror::Error;

pub const UNKNOWN_ITEM_NAME: &str = "Unknown item";
const SAVE_FAILED_FALLBACK: &str = "Failed to save scan";

/// Everything that can go wrong while submitting a scan or refreshing the dashboard.
/// The `Display` text is what ends up in the session's error slot.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("No product found for barcode {barcode}")]
    NotFound { barcode: String },
    #[error("Product lookup failed: {0}")]
    LookupFailed(String),
    #[error("{}", save_failed_text(.message))]
    SaveFailed { message: Option<String> },
    #[error("Failed to refresh dashboard: {0}")]
    RefreshFailed(String),
}

fn save_failed_text(message: &Option<String>) -> String {
    match message.as_deref() {
        Some(message) => format!("{SAVE_FAILED_FALLBACK}: {message}"),
        None => SAVE_FAILED_FALLBACK.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanErrorKind {
    NotFound,
    LookupFailed,
    SaveFailed,
    RefreshFailed,
}

impl ScanError {
    pub fn kind(&self) -> ScanErrorKind {
        match self {
            ScanError::NotFound { .. } => ScanErrorKind::NotFound,
            ScanError::LookupFailed(_) => ScanErrorKind::LookupFailed,
            ScanError::SaveFailed { .. } => ScanErrorKind::SaveFailed,
            ScanError::RefreshFailed(_) => ScanErrorKind::RefreshFailed,
        }
    }

    pub fn not_found(barcode: impl Into<String>) -> Self {
        ScanError::NotFound {
            barcode: barcode.into(),
        }
    }
}
