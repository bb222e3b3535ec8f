//! Integration tests for `FeedClient::fetch_products`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no real
//! network traffic is made. Covers the happy paths (empty, populated) and
//! every error variant that `fetch_products` can propagate.

use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use offergrid_feed::{FeedClient, FeedError};

/// Builds a `FeedClient` suitable for tests: 5-second timeout, descriptive UA, no retries.
fn test_client() -> FeedClient {
    FeedClient::new(5, "offergrid-test/0.1", 0, 0).expect("failed to build test FeedClient")
}

/// Builds a `FeedClient` with retries enabled for retry-specific tests.
fn test_client_with_retries(max_retries: u32) -> FeedClient {
    FeedClient::new(5, "offergrid-test/0.1", max_retries, 0)
        .expect("failed to build test FeedClient")
}

/// Minimal valid one-product JSON fixture.
fn one_product_json(id: i64) -> serde_json::Value {
    json!({
        "products": [{
            "id": id,
            "title": "Test Product",
            "handle": "test-product",
            "vendor": "Test Vendor",
            "tags": "one, two",
            "options": [{"name": "Size", "position": 1}],
            "variants": [{
                "id": 101,
                "sku": "SKU-101",
                "barcode": "0001",
                "price": "12.99",
                "inventory_quantity": 3,
                "option1": "L"
            }]
        }]
    })
}

#[tokio::test]
async fn fetch_products_returns_empty_vec_when_response_has_no_products() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"products": []})))
        .mount(&server)
        .await;

    let products = test_client()
        .fetch_products(&server.uri(), None)
        .await
        .expect("fetch should succeed");

    assert!(products.is_empty());
}

#[tokio::test]
async fn fetch_products_returns_raw_product_values() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&one_product_json(42)))
        .mount(&server)
        .await;

    let products = test_client()
        .fetch_products(&server.uri(), None)
        .await
        .expect("fetch should succeed");

    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"].as_i64(), Some(42));
    assert_eq!(products[0]["variants"][0]["barcode"].as_str(), Some("0001"));
}

#[tokio::test]
async fn fetch_products_sends_access_token_header_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .and(header("X-Shopify-Access-Token", "shpat-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&one_product_json(1)))
        .expect(1)
        .mount(&server)
        .await;

    let products = test_client()
        .fetch_products(&server.uri(), Some("shpat-test"))
        .await
        .expect("fetch should succeed");

    assert_eq!(products.len(), 1);
}

#[tokio::test]
async fn fetch_products_maps_404_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = test_client()
        .fetch_products(&server.uri(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::NotFound { .. }));
}

#[tokio::test]
async fn fetch_products_maps_other_statuses_to_unexpected_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = test_client()
        .fetch_products(&server.uri(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::UnexpectedStatus { status: 503, .. }));
}

#[tokio::test]
async fn fetch_products_retries_429_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&one_product_json(7)))
        .mount(&server)
        .await;

    let products = test_client_with_retries(2)
        .fetch_products(&server.uri(), None)
        .await
        .expect("fetch should succeed after retry");

    assert_eq!(products.len(), 1);
}

#[tokio::test]
async fn fetch_products_surfaces_rate_limited_when_retries_exhausted() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .mount(&server)
        .await;

    let err = test_client()
        .fetch_products(&server.uri(), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        FeedError::RateLimited {
            retry_after_secs: 17,
            ..
        }
    ));
}

#[tokio::test]
async fn fetch_products_maps_malformed_body_to_deserialize() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = test_client()
        .fetch_products(&server.uri(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::Deserialize { .. }));
}

#[tokio::test]
async fn fetch_products_rejects_invalid_store_url_without_network() {
    let err = test_client()
        .fetch_products("not-a-url", None)
        .await
        .unwrap_err();

    assert!(matches!(err, FeedError::InvalidStoreUrl { .. }));
}
