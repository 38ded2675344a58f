//! HTTP client behavior against the stub order service.
//!
//! Run with: cargo test -p bakehouse-integration-tests --test api_client

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;

use bakehouse_integration_tests::{CONFIRMATION_CODE, StubService};
use bakehouse_storefront::api::{AccountApi, ApiClient, ApiError, CartApi, CatalogApi, OrderApi};
use bakehouse_storefront::token::SharedToken;
use bakehouse_storefront::types::{CakeFilters, CartLineInput, CartUpsert};
use rust_decimal::Decimal;
use secrecy::SecretString;

async fn client() -> (StubService, ApiClient, SharedToken) {
    let service = StubService::spawn().await.unwrap();
    let token = SharedToken::new();
    let api = ApiClient::new(&service.api_config(), Arc::new(token.clone())).unwrap();
    (service, api, token)
}

fn one_cake() -> CartUpsert {
    CartUpsert {
        customer_id: None,
        cart_token: None,
        items: vec![CartLineInput {
            cake_id: "cake-1".into(),
            quantity: 1,
            price_each: Decimal::new(1000, 0),
        }],
    }
}

#[tokio::test]
async fn test_bearer_token_on_private_calls_only() {
    let (service, api, token) = client().await;
    token.set(SecretString::from("access-123"));

    api.list_cakes(&CakeFilters::default()).await.unwrap();
    api.upsert_cart(&one_cake()).await.unwrap();

    let seen = service.authorizations();
    assert_eq!(seen[0], ("/cakes".to_string(), None));
    assert_eq!(
        seen[1],
        ("/cart".to_string(), Some("Bearer access-123".to_string()))
    );
}

#[tokio::test]
async fn test_signed_out_requests_carry_no_token() {
    let (service, api, _token) = client().await;

    api.upsert_cart(&one_cake()).await.unwrap();

    assert_eq!(service.authorizations()[0].1, None);
}

#[tokio::test]
async fn test_catalog_is_cached() {
    let (service, api, _token) = client().await;

    let first = api.list_cakes(&CakeFilters::default()).await.unwrap();
    let second = api.list_cakes(&CakeFilters::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total_count, 2);
    assert!(!first.cakes[1].is_available);

    api.get_cake(&"cake-1".into()).await.unwrap();
    api.get_cake(&"cake-1".into()).await.unwrap();
    assert_eq!(service.catalog_requests(), 2);

    api.invalidate_catalog_cache();
    api.list_cakes(&CakeFilters::default()).await.unwrap();
    assert_eq!(service.catalog_requests(), 3);
}

#[tokio::test]
async fn test_not_found_is_normalized() {
    let (_service, api, _token) = client().await;

    let err = api.get_cake(&"cake-404".into()).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.user_message(), "Cake not found");
    assert!(matches!(err, ApiError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_structured_error_detail() {
    let (service, api, _token) = client().await;
    let cart = api.upsert_cart(&one_cake()).await.unwrap();
    let order = api
        .create_order(&bakehouse_storefront::types::OrderCreate {
            cart_id: cart.cart_id,
            customer_id: None,
            idempotency_key: uuid::Uuid::new_v4(),
            is_test: Some(true),
        })
        .await
        .unwrap();

    service.fail_order_fetch(true);
    let err = api.get_order(&order.order.order_id).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert_eq!(err.code(), Some("unavailable"));
    assert_eq!(err.user_message(), "Order service unavailable");
    assert!(err.data().is_some());
}

#[tokio::test]
async fn test_confirm_sign_up() {
    let (service, api, token) = client().await;
    token.set(SecretString::from("access-123"));

    let message = api
        .confirm_sign_up(" asha@example.com ", CONFIRMATION_CODE)
        .await
        .unwrap();
    assert_eq!(message, "Account confirmed successfully");
    assert_eq!(service.authorizations()[0].1, None);

    let err = api.confirm_sign_up("asha@example.com", "000000").await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.user_message(), "Invalid verification code");
}
