use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{DailySummary, ProductFacts, ScanId, ScanRecord},
    error::{ApiError, EnvelopeError},
};

/// Body of `POST /api/scan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveScanRequest {
    pub barcode: String,
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub image_url: Option<String>,
}

impl SaveScanRequest {
    pub fn from_facts(barcode: impl Into<String>, facts: &ProductFacts) -> Self {
        Self {
            barcode: barcode.into(),
            name: Some(facts.name.clone()),
            calories: facts.calories,
            protein: facts.protein,
            carbs: facts.carbs,
            fat: facts.fat,
            image_url: facts.image_url.clone(),
        }
    }
}

/// Only the `ok` flag is guaranteed; `id` and `ts` are present when the backend reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveScanResponse {
    #[serde(default)]
    pub id: Option<ScanId>,
    #[serde(default)]
    pub ts: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScansResponse {
    pub rows: Vec<ScanRecord>,
}

pub type SummaryResponse = DailySummary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub time: Option<String>,
}

/// Product payload of the backend's `GET /api/product/{barcode}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendProduct {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendProductResponse {
    pub product: BackendProduct,
}

/// Envelope written by the JSON history export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryExport {
    pub ok: bool,
    pub rows: Vec<ScanRecord>,
}

/// Checks the `ok` flag of a backend envelope and decodes the remaining fields as `T`.
pub fn open_envelope<T: DeserializeOwned>(value: Value) -> Result<T, EnvelopeError> {
    let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if !ok {
        let api: ApiError = serde_json::from_value(value)
            .unwrap_or_else(|_| ApiError { ok: false, error: None });
        return Err(EnvelopeError::Rejected(api));
    }
    serde_json::from_value(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn opens_summary_envelope() {
        let summary: SummaryResponse = open_envelope(json!({
            "ok": true,
            "date": "2026-10-18",
            "calories": 420.0,
            "protein": 3.5,
            "carbs": 60.2,
            "fat": 1.0,
            "scans": 3
        }))
        .expect("summary");
        assert_eq!(summary.date, "2026-10-18");
        assert_eq!(summary.scans, 3);
    }

    #[test]
    fn bare_ok_save_response_opens_without_id() {
        let saved: SaveScanResponse = open_envelope(json!({"ok": true})).expect("saved");
        assert_eq!(saved.id, None);
        assert_eq!(saved.ts, None);

        let saved: SaveScanResponse =
            open_envelope(json!({"ok": true, "id": 7, "ts": "2026-10-18T12:00:00"}))
                .expect("saved");
        assert_eq!(saved.id, Some(ScanId(7)));
    }

    #[test]
    fn rejected_envelope_keeps_backend_message() {
        let err = open_envelope::<ScansResponse>(json!({"ok": false, "error": "db locked"}))
            .expect_err("must reject");
        assert_eq!(err.backend_message(), Some("db locked"));
    }

    #[test]
    fn missing_ok_flag_is_a_rejection() {
        let err = open_envelope::<StatusResponse>(json!({"time": "now"})).expect_err("reject");
        assert!(matches!(err, EnvelopeError::Rejected(_)));
        assert_eq!(err.backend_message(), None);
    }

    #[test]
    fn scan_rows_without_image_column_decode() {
        let scans: ScansResponse = open_envelope(json!({
            "ok": true,
            "rows": [{
                "id": 5,
                "ts": "2026-10-18T08:00:00",
                "barcode": "123",
                "name": null,
                "calories": null,
                "protein": 1.5,
                "carbs": null,
                "fat": null
            }]
        }))
        .expect("rows");
        assert_eq!(scans.rows[0].id, ScanId(5));
        assert_eq!(scans.rows[0].image_url, None);
        assert_eq!(scans.rows[0].protein, Some(1.5));
    }

    #[test]
    fn save_request_carries_lookup_facts() {
        let facts = ProductFacts {
            name: "Coca-Cola".into(),
            calories: Some(42.0),
            protein: Some(0.0),
            carbs: Some(10.6),
            fat: None,
            image_url: None,
        };
        let body = serde_json::to_value(SaveScanRequest::from_facts("049000044861", &facts))
            .expect("encode");
        assert_eq!(body["barcode"], "049000044861");
        assert_eq!(body["name"], "Coca-Cola");
        assert_eq!(body["fat"], Value::Null);
        assert_eq!(body["image_url"], Value::Null);
    }
}
