//! Display formatting. Rounds for presentation only; stored and exported values are untouched.

use chrono::NaiveDateTime;
use shared::domain::{ScanRecord, Theme};

use crate::SessionState;

/// Rendered for a quantity the food database did not report, so it never reads as zero.
pub const PLACEHOLDER: &str = "—";

pub fn format_calories(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", v.round() + 0.0),
        _ => PLACEHOLDER.to_string(),
    }
}

pub fn format_grams(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let rounded = (v * 10.0).round() / 10.0 + 0.0;
            format!("{rounded:.1}")
        }
        _ => PLACEHOLDER.to_string(),
    }
}

/// `HH:MM` from an ISO-8601 timestamp, or the raw text when it does not parse.
pub fn format_time(ts: &str) -> String {
    let trimmed = ts.trim();
    let naive = trimmed
        .parse::<chrono::DateTime<chrono::FixedOffset>>()
        .map(|dt| dt.naive_local())
        .or_else(|_| trimmed.parse::<NaiveDateTime>());
    match naive {
        Ok(dt) => dt.format("%H:%M").to_string(),
        Err(_) => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRow {
    pub id: String,
    pub time: String,
    pub barcode: String,
    pub name: String,
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
    pub image_url: Option<String>,
}

impl ScanRow {
    pub fn from_record(record: &ScanRecord) -> Self {
        Self {
            id: record.id.to_string(),
            time: format_time(&record.ts),
            barcode: record.barcode.clone(),
            name: record
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER.to_string()),
            calories: format_calories(record.calories),
            protein: format_grams(record.protein),
            carbs: format_grams(record.carbs),
            fat: format_grams(record.fat),
            image_url: record.image_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub date: String,
    pub calories: String,
    pub protein: String,
    pub carbs: String,
    pub fat: String,
    pub scan_count: String,
    pub last_scan: Option<ScanRow>,
    pub history: Vec<ScanRow>,
    pub status_badge: &'static str,
    pub theme: Theme,
    pub submit_enabled: bool,
    pub error: Option<String>,
}

pub fn dashboard_view(state: &SessionState) -> DashboardView {
    let summary = state.summary.as_ref();
    let history: Vec<ScanRow> = state.history.iter().map(ScanRow::from_record).collect();
    DashboardView {
        date: summary
            .map(|s| s.date.clone())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        calories: format_calories(summary.map(|s| s.calories)),
        protein: format_grams(summary.map(|s| s.protein)),
        carbs: format_grams(summary.map(|s| s.carbs)),
        fat: format_grams(summary.map(|s| s.fat)),
        scan_count: summary
            .map(|s| s.scans.to_string())
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
        last_scan: history.first().cloned(),
        history,
        status_badge: if state.online { "Online" } else { "Offline" },
        theme: state.theme,
        submit_enabled: !state.loading,
        error: state.last_error.clone(),
    }
}
