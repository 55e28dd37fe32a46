//! Product lookup adapters: the public food database and the backend's cached product endpoint.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use shared::{
    domain::ProductFacts,
    error::EnvelopeError,
    protocol::{open_envelope, BackendProductResponse},
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    error::{ScanError, UNKNOWN_ITEM_NAME},
    http::{endpoint, parse_base_url, read_json},
};

pub const DEFAULT_PRODUCT_DB_URL: &str = "https://world.openfoodfacts.org";

const NAME_FIELDS: [&str; 2] = ["product_name", "product_name_en"];
const IMAGE_FIELDS: [&str; 2] = ["image_front_url", "image_url"];
const CALORIES_FIELD: &str = "energy-kcal_100g";
const PROTEIN_FIELD: &str = "proteins_100g";
const CARBS_FIELD: &str = "carbohydrates_100g";
const FAT_FIELD: &str = "fat_100g";

#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn lookup(&self, barcode: &str) -> std::result::Result<ProductFacts, ScanError>;
}

/// Reads `GET {base}/api/v2/product/{barcode}` from an Open Food Facts compatible database.
pub struct OpenFoodFactsLookup {
    http: Client,
    base_url: Url,
}

impl OpenFoodFactsLookup {
    pub fn new(http: Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
        })
    }
}

#[async_trait]
impl ProductLookup for OpenFoodFactsLookup {
    async fn lookup(&self, barcode: &str) -> std::result::Result<ProductFacts, ScanError> {
        let url = endpoint(&self.base_url, &["api", "v2", "product", barcode]);
        debug!(%url, "looking up product");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::LookupFailed(e.to_string()))?;

        let (status, body) = read_json(response).await;
        if status == StatusCode::NOT_FOUND {
            return Err(ScanError::not_found(barcode));
        }
        if !status.is_success() {
            warn!(barcode, %status, "food database rejected lookup");
            return Err(ScanError::LookupFailed(format!(
                "food database answered {status}"
            )));
        }
        let Some(payload) = body else {
            return Err(ScanError::LookupFailed(
                "food database returned a non-JSON body".to_string(),
            ));
        };

        if payload.get("status").and_then(Value::as_i64) == Some(0) {
            return Err(ScanError::not_found(barcode));
        }
        match payload.get("product").filter(|product| product.is_object()) {
            Some(product) => Ok(facts_from_product(product)),
            None => Err(ScanError::not_found(barcode)),
        }
    }
}

/// Normalizes a food-database product object into [`ProductFacts`].
///
/// Nutrients that are missing or not JSON numbers stay absent.
pub fn facts_from_product(product: &Value) -> ProductFacts {
    let nutriments = product.get("nutriments");
    let nutrient = |field: &str| {
        nutriments
            .and_then(|n| n.get(field))
            .and_then(Value::as_f64)
    };

    ProductFacts {
        name: first_text(product, &NAME_FIELDS).unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string()),
        calories: nutrient(CALORIES_FIELD),
        protein: nutrient(PROTEIN_FIELD),
        carbs: nutrient(CARBS_FIELD),
        fat: nutrient(FAT_FIELD),
        image_url: first_text(product, &IMAGE_FIELDS),
    }
}

fn first_text(object: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .filter_map(|field| object.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// Reads `GET {backend}/api/product/{barcode}`, which answers from the backend's
/// product cache and falls back to the public database on a miss.
pub struct BackendProductLookup {
    http: Client,
    backend_url: Url,
}

impl BackendProductLookup {
    pub fn new(http: Client, backend_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            backend_url: parse_base_url(backend_url)?,
        })
    }
}

#[async_trait]
impl ProductLookup for BackendProductLookup {
    async fn lookup(&self, barcode: &str) -> std::result::Result<ProductFacts, ScanError> {
        let url = endpoint(&self.backend_url, &["api", "product", barcode]);
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ScanError::LookupFailed(e.to_string()))?;

        let (status, body) = read_json(response).await;
        if status == StatusCode::NOT_FOUND {
            return Err(ScanError::not_found(barcode));
        }
        if !status.is_success() {
            return Err(ScanError::LookupFailed(format!("backend answered {status}")));
        }
        let payload = body.unwrap_or(Value::Null);
        match open_envelope::<BackendProductResponse>(payload) {
            Ok(found) => {
                let product = found.product;
                Ok(ProductFacts {
                    name: product
                        .name
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_ITEM_NAME.to_string()),
                    calories: product.calories,
                    protein: product.protein,
                    carbs: product.carbs,
                    fat: product.fat,
                    image_url: product.image_url,
                })
            }
            Err(err @ EnvelopeError::Rejected(_)) => {
                if err
                    .backend_message()
                    .is_some_and(|message| message.eq_ignore_ascii_case("not found"))
                {
                    Err(ScanError::not_found(barcode))
                } else {
                    Err(ScanError::LookupFailed(err.to_string()))
                }
            }
            Err(err) => Err(ScanError::LookupFailed(err.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "tests/lookup_tests.rs"]
mod tests;
