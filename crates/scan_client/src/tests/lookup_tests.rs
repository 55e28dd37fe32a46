use super::*;
use crate::http::{build_http_client, DEFAULT_REQUEST_TIMEOUT};
use axum::{extract::Path, http::StatusCode as AxumStatus, routing::get, Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

async fn food_db_product(Path(barcode): Path<String>) -> (AxumStatus, Json<Value>) {
    match barcode.as_str() {
        "049000044861" => (
            AxumStatus::OK,
            Json(json!({
                "code": "049000044861",
                "status": 1,
                "product": {
                    "product_name": "Coca-Cola",
                    "nutriments": {
                        "energy-kcal_100g": 42,
                        "proteins_100g": 0,
                        "carbohydrates_100g": 10.6,
                        "fat_100g": 0
                    },
                    "image_front_url": "https://images.example/coke-front.jpg",
                    "image_url": "https://images.example/coke.jpg"
                }
            })),
        ),
        "fallbacks" => (
            AxumStatus::OK,
            Json(json!({
                "status": 1,
                "product": {
                    "product_name": "",
                    "product_name_en": "Sparkling Water",
                    "nutriments": {
                        "energy-kcal_100g": "0",
                        "proteins_100g": null
                    },
                    "image_url": "https://images.example/water.jpg"
                }
            })),
        ),
        "nameless" => (
            AxumStatus::OK,
            Json(json!({ "status": 1, "product": { "nutriments": {} } })),
        ),
        "status-zero" => (
            AxumStatus::OK,
            Json(json!({ "status": 0, "status_verbose": "product not found" })),
        ),
        "exploding" => (
            AxumStatus::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "upstream down" })),
        ),
        _ => (
            AxumStatus::NOT_FOUND,
            Json(json!({ "status": 0, "status_verbose": "product not found" })),
        ),
    }
}

async fn backend_product(Path(barcode): Path<String>) -> (AxumStatus, Json<Value>) {
    match barcode.as_str() {
        "049000044861" => (
            AxumStatus::OK,
            Json(json!({
                "ok": true,
                "product": {
                    "barcode": "049000044861",
                    "name": "Coca-Cola",
                    "calories": 42.0,
                    "protein": 0.0,
                    "carbs": 10.6,
                    "fat": 0.0,
                    "image_url": null,
                    "source": "openfoodfacts",
                    "updated_at": "2026-10-18T08:00:00"
                }
            })),
        ),
        "unnamed" => (
            AxumStatus::OK,
            Json(json!({ "ok": true, "product": { "name": null, "calories": 12.0 } })),
        ),
        "exploding" => (
            AxumStatus::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "error": "maintenance" })),
        ),
        _ => (
            AxumStatus::NOT_FOUND,
            Json(json!({ "ok": false, "error": "not found" })),
        ),
    }
}

async fn spawn_product_server() -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route("/api/v2/product/:barcode", get(food_db_product))
        .route("/api/product/:barcode", get(backend_product));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

async fn food_db() -> OpenFoodFactsLookup {
    let url = spawn_product_server().await.expect("spawn server");
    OpenFoodFactsLookup::new(build_http_client(DEFAULT_REQUEST_TIMEOUT).expect("client"), &url)
        .expect("lookup")
}

async fn backend() -> BackendProductLookup {
    let url = spawn_product_server().await.expect("spawn server");
    BackendProductLookup::new(build_http_client(DEFAULT_REQUEST_TIMEOUT).expect("client"), &url)
        .expect("lookup")
}

#[tokio::test]
async fn food_db_lookup_normalizes_product() {
    let facts = food_db().await.lookup("049000044861").await.expect("found");
    assert_eq!(
        facts,
        ProductFacts {
            name: "Coca-Cola".to_string(),
            calories: Some(42.0),
            protein: Some(0.0),
            carbs: Some(10.6),
            fat: Some(0.0),
            image_url: Some("https://images.example/coke-front.jpg".to_string()),
        }
    );
}

#[tokio::test]
async fn food_db_lookup_uses_fallback_fields() {
    let facts = food_db().await.lookup("fallbacks").await.expect("found");
    assert_eq!(facts.name, "Sparkling Water");
    assert_eq!(facts.calories, None);
    assert_eq!(facts.protein, None);
    assert_eq!(facts.image_url.as_deref(), Some("https://images.example/water.jpg"));
}

#[tokio::test]
async fn food_db_lookup_defaults_missing_name() {
    let facts = food_db().await.lookup("nameless").await.expect("found");
    assert_eq!(facts.name, UNKNOWN_ITEM_NAME);
    assert_eq!(facts.image_url, None);
}

#[tokio::test]
async fn food_db_not_found_variants() {
    let lookup = food_db().await;
    for barcode in ["0000000000000", "status-zero"] {
        let err = lookup.lookup(barcode).await.expect_err("not found");
        assert_eq!(err, ScanError::not_found(barcode));
    }
}

#[tokio::test]
async fn food_db_server_error_is_lookup_failure() {
    let err = food_db()
        .await
        .lookup("exploding")
        .await
        .expect_err("must fail");
    assert!(matches!(err, ScanError::LookupFailed(_)), "unexpected: {err:?}");
}

#[tokio::test]
async fn unreachable_food_db_is_lookup_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let lookup = OpenFoodFactsLookup::new(
        build_http_client(DEFAULT_REQUEST_TIMEOUT).expect("client"),
        &format!("http://{addr}"),
    )
    .expect("lookup");
    let err = lookup.lookup("049000044861").await.expect_err("refused");
    assert!(matches!(err, ScanError::LookupFailed(_)));
}

#[tokio::test]
async fn backend_lookup_reads_cached_product() {
    let lookup = backend().await;
    let facts = lookup.lookup("049000044861").await.expect("found");
    assert_eq!(facts.name, "Coca-Cola");
    assert_eq!(facts.carbs, Some(10.6));

    let unnamed = lookup.lookup("unnamed").await.expect("found");
    assert_eq!(unnamed.name, UNKNOWN_ITEM_NAME);
    assert_eq!(unnamed.calories, Some(12.0));
}

#[tokio::test]
async fn backend_lookup_maps_failures() {
    let lookup = backend().await;
    assert_eq!(
        lookup.lookup("999").await.expect_err("missing"),
        ScanError::not_found("999")
    );
    assert!(matches!(
        lookup.lookup("exploding").await.expect_err("down"),
        ScanError::LookupFailed(_)
    ));
}

#[test]
fn non_numeric_nutrients_stay_absent() {
    let facts = facts_from_product(&json!({
        "product_name": "  ",
        "nutriments": {
            "energy-kcal_100g": "n/a",
            "proteins_100g": 3.25,
            "carbohydrates_100g": [],
            "fat_100g": true
        },
        "image_front_url": ""
    }));
    assert_eq!(facts.name, UNKNOWN_ITEM_NAME);
    assert_eq!(facts.calories, None);
    assert_eq!(facts.protein, Some(3.25));
    assert_eq!(facts.carbs, None);
    assert_eq!(facts.fat, None);
    assert_eq!(facts.image_url, None);
}
