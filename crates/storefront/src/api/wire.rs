//! Raw JSON shapes of the order service.
//!
//! Field names are the service's snake_case names. Nullable fields are
//! `Option` with `#[serde(default)]` so a missing key and an explicit `null`
//! read the same. Money is serialized as a JSON number.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Server-generated correlation id echoed in every response.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestMetadata {
    pub request_id: String,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CakeSummary {
    pub cake_id: String,
    pub name: String,
    pub slug: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub currency: String,
    #[serde(default)]
    pub category: Option<String>,
    pub is_available: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CakeDetail {
    #[serde(flatten)]
    pub summary: CakeSummary,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedCakesResponse {
    pub cakes: Vec<CakeSummary>,
    pub total_count: u64,
    #[serde(default)]
    pub request: Option<RequestMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CakeDetailResponse {
    pub cake: CakeDetail,
    #[serde(default)]
    pub request: Option<RequestMetadata>,
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CartItemInput {
    pub cake_id: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_each: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartUpsertRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_token: Option<String>,
    pub items: Vec<CartItemInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoneyBreakdown {
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub taxes: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub cart_item_id: String,
    pub cake_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price_each: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub line_total: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartResponse {
    pub cart_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub cart_token: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub totals: MoneyBreakdown,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub request: Option<RequestMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartDeleteResponse {
    pub cart_id: String,
    pub deleted: bool,
    #[serde(default)]
    pub request: Option<RequestMetadata>,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct OrderCreateRequest {
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_test: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderSummary {
    pub order_id: String,
    pub status: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub payment_status: String,
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub reservation_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub inventory_released: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderSummary,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub totals: MoneyBreakdown,
    #[serde(default)]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub provider_order_id: Option<String>,
    #[serde(default)]
    pub provider_payment_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_test: bool,
    #[serde(default)]
    pub payment_is_test: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderCreateResponse {
    pub order: OrderDetail,
    /// Empty when the gateway order could not be created
    #[serde(default)]
    pub provider_order_id: Option<String>,
    #[serde(default)]
    pub request: Option<RequestMetadata>,
}

/// `GET /orders/{identifier}` answers with one order for an order id and a
/// list for a customer id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OrderLookupResponse {
    Detail {
        order: Box<OrderDetail>,
        #[serde(default)]
        request: Option<RequestMetadata>,
    },
    List {
        orders: Vec<OrderSummary>,
        #[serde(default)]
        request: Option<RequestMetadata>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderCancelResponse {
    pub order: OrderDetail,
    #[serde(default)]
    pub request: Option<RequestMetadata>,
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmSignupRequest {
    pub username: String,
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmSignupResponse {
    #[serde(default = "default_confirm_message")]
    pub message: String,
}

fn default_confirm_message() -> String {
    "Account confirmed successfully".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_response_with_nulls() {
        let json = r#"{
            "cart_id": "c1",
            "customer_id": null,
            "cart_token": "tok",
            "items": [{
                "cart_item_id": "i1",
                "cake_id": "cake-1",
                "name": null,
                "quantity": 2,
                "price_each": 1000.0,
                "line_total": 2000.0
            }],
            "totals": {"subtotal": 2000, "taxes": 100, "shipping": 50, "total": 2150},
            "updated_at": "2025-11-03T10:00:00Z",
            "request": {"request_id": "r1"}
        }"#;
        let cart: CartResponse = serde_json::from_str(json).unwrap();
        assert!(cart.customer_id.is_none());
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.totals.total, Decimal::new(2150, 0));
        assert_eq!(cart.request.unwrap().request_id, "r1");
    }

    #[test]
    fn test_order_lookup_detail_or_list() {
        let detail = r#"{"order": {
            "order_id": "o1", "status": "created", "order_total": 2150.0,
            "currency": "INR", "created_at": "2025-11-03T10:00:00Z",
            "payment_status": "pending", "items": [], "customer_id": "u1",
            "totals": {"subtotal": 2000, "taxes": 100, "shipping": 50, "total": 2150},
            "payment_id": null, "provider_order_id": "order_rzp", "provider_payment_id": null,
            "idempotency_key": "k", "updated_at": "2025-11-03T10:00:00Z"
        }}"#;
        assert!(matches!(
            serde_json::from_str::<OrderLookupResponse>(detail).unwrap(),
            OrderLookupResponse::Detail { .. }
        ));

        let list = r#"{"orders": [], "request": {"request_id": "r2"}}"#;
        assert!(matches!(
            serde_json::from_str::<OrderLookupResponse>(list).unwrap(),
            OrderLookupResponse::List { .. }
        ));
    }

    #[test]
    fn test_upsert_request_omits_missing_ids() {
        let body = CartUpsertRequest {
            customer_id: None,
            cart_token: None,
            items: vec![CartItemInput {
                cake_id: "cake-1".to_string(),
                quantity: 1,
                price_each: Decimal::new(1000, 0),
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("customer_id").is_none());
        assert!(json.get("cart_token").is_none());
        assert_eq!(json["items"][0]["price_each"], 1000.0);
    }
}
