//! HTTP backends and freight provider against a mock server.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use storefront_checkout::backend::{AddLine, CartBackend, HttpCartBackend, HttpWishlistBackend, WishlistBackend};
use storefront_checkout::config::{ApiSettings, FreightSettings};
use storefront_checkout::{CheckoutError, FreightProvider, HttpFreightProvider};
use storefront_core::shipping::{FreightLine, FreightRequest};
use storefront_core::{Destination, EtaRange};

fn api_settings(server: &MockServer) -> ApiSettings {
    ApiSettings {
        base_url: format!("{}/api", server.uri()),
        request_timeout_secs: 5,
        token: Some(SecretString::from("user-token".to_string())),
    }
}

fn freight_settings(server: &MockServer) -> FreightSettings {
    FreightSettings {
        endpoint: format!("{}/logistic/freightCalculate", server.uri()),
        origin_country: "CN".into(),
        timeout_secs: 5,
        token: Some(SecretString::from("cj-token".to_string())),
    }
}

fn cart_body() -> serde_json::Value {
    json!([
        {
            "id": "l1",
            "productId": "shirt",
            "quantity": 2,
            "price": 15.00,
            "originalPrice": 20.00,
            "shippingSource": { "variantId": "V-A" }
        },
        { "id": "l2", "productId": "mug", "quantity": 1, "price": "9.50" }
    ])
}

// =============================================================================
// Cart Backend
// =============================================================================

#[tokio::test]
async fn test_fetch_sends_bearer_token_and_parses_cart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .and(header("authorization", "Bearer user-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body()))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpCartBackend::new(&api_settings(&server)).unwrap();
    let cart = backend.fetch().await.unwrap();

    assert_eq!(cart.line_count(), 2);
    assert_eq!(cart.subtotal().cents(), 2 * 1_500 + 950);
    assert_eq!(cart.total_savings().cents(), 1_000);
    assert!(cart.get("l1").unwrap().is_drop_shipped());
}

#[tokio::test]
async fn test_add_posts_shipping_source() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cart"))
        .and(body_json(json!({
            "productId": "shirt",
            "quantity": 1,
            "shippingSource": { "variantId": "V-A" }
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpCartBackend::new(&api_settings(&server)).unwrap();
    backend
        .add(&AddLine::new("shirt", 1).with_shipping_source("V-A"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_remove_treats_404_as_removed() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not found" })))
        .expect(2)
        .mount(&server)
        .await;

    let backend = HttpCartBackend::new(&api_settings(&server)).unwrap();
    backend.remove("gone").await.unwrap();
    backend.remove("gone").await.unwrap();
}

#[tokio::test]
async fn test_set_quantity_readds_with_variant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/cart/l1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/cart"))
        .and(body_json(json!({
            "productId": "shirt",
            "quantity": 5,
            "shippingSource": { "variantId": "V-A" }
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpCartBackend::new(&api_settings(&server)).unwrap();
    backend.set_quantity("l1", 5).await.unwrap();
}

#[tokio::test]
async fn test_set_quantity_on_absent_line_sends_no_write() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/cart"))
        .respond_with(ResponseTemplate::new(200).set_body_json(cart_body()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let backend = HttpCartBackend::new(&api_settings(&server)).unwrap();
    backend.set_quantity("missing", 3).await.unwrap();
}

#[tokio::test]
async fn test_error_payload_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/cart"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({ "error": "Product is out of stock" })),
        )
        .mount(&server)
        .await;

    let backend = HttpCartBackend::new(&api_settings(&server)).unwrap();
    let err = backend.add(&AddLine::new("mug", 1)).await.unwrap_err();

    match err {
        CheckoutError::Backend { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Product is out of stock");
        }
        other => panic!("expected Backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_network_failure() {
    let settings = ApiSettings {
        base_url: "http://127.0.0.1:9/api".into(),
        request_timeout_secs: 2,
        token: None,
    };
    let backend = HttpCartBackend::new(&settings).unwrap();
    let err = backend.fetch().await.unwrap_err();
    assert!(err.is_retryable());
}

// =============================================================================
// Wishlist Backend
// =============================================================================

#[tokio::test]
async fn test_wishlist_roundtrip() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/wishlist"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "wishlist": [ { "productId": "shirt", "vid": "V-A" }, { "productId": 7 } ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/wishlist"))
        .and(body_json(json!({ "productId": "shirt" })))
        .respond_with(ResponseTemplate::new(409))
        .expect(1)
        .mount(&server)
        .await;

    let backend = HttpWishlistBackend::new(&api_settings(&server)).unwrap();
    let entries = backend.fetch().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].shipping_source.as_ref().unwrap().variant_id, "V-A");
    assert_eq!(entries[1].product_id, "7");

    backend.add("shirt").await.unwrap();
}

// =============================================================================
// Freight Provider
// =============================================================================

fn freight_request() -> FreightRequest {
    FreightRequest {
        origin: "CN".parse().unwrap(),
        destination: Destination::Fr,
        lines: vec![
            FreightLine { variant_id: "A".into(), quantity: 2 },
            FreightLine { variant_id: "B".into(), quantity: 1 },
        ],
    }
}

#[tokio::test]
async fn test_freight_request_payload_and_options() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/logistic/freightCalculate"))
        .and(header("CJ-Access-Token", "cj-token"))
        .and(body_json(json!({
            "startCountryCode": "CN",
            "endCountryCode": "FR",
            "products": [ { "vid": "A", "quantity": 2 }, { "vid": "B", "quantity": 1 } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "freightOptions": [
                { "carrierId": "cj-packet", "freight": 4.57, "etaRange": "7-12" },
                { "carrierId": "dhl", "freight": 12.9, "minDays": 3, "maxDays": 5 },
                { "carrierId": "ups", "freight": 21, "currency": "EUR" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = HttpFreightProvider::new(&freight_settings(&server), "USD").unwrap();
    let options = provider.quote(&freight_request()).await.unwrap();

    assert_eq!(options.len(), 3);
    assert_eq!(options[0].carrier_id, "cj-packet");
    assert_eq!(options[0].freight.cents(), 457);
    assert_eq!(options[0].currency, "USD");
    assert_eq!(options[1].eta, Some(EtaRange::new(3, 5)));
    assert_eq!(options[2].currency, "EUR");
}

#[tokio::test]
async fn test_freight_error_payload_is_no_delivery_option() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": false,
            "message": "Sorry, this country is not supported"
        })))
        .mount(&server)
        .await;

    let provider = HttpFreightProvider::new(&freight_settings(&server), "USD").unwrap();
    match provider.quote(&freight_request()).await {
        Err(CheckoutError::NoDeliveryOption(message)) => {
            assert_eq!(message, "Sorry, this country is not supported")
        }
        other => panic!("expected NoDeliveryOption, got {:?}", other),
    }
}

#[tokio::test]
async fn test_freight_server_error_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = HttpFreightProvider::new(&freight_settings(&server), "USD").unwrap();
    let err = provider.quote(&freight_request()).await.unwrap_err();
    assert!(matches!(err, CheckoutError::Backend { status: 503, .. }));
    assert!(err.is_retryable());
}
