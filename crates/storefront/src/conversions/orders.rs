//! Order conversions.

use bakehouse_core::{CustomerId, OrderStatus, PaymentId, PaymentStatus};

use crate::api::wire;
use crate::types::{CartLineItem, CreatedOrder, OrderCreate, OrderDetail, OrderSummary};

use super::non_empty;

impl From<wire::OrderSummary> for OrderSummary {
    fn from(order: wire::OrderSummary) -> Self {
        Self {
            order_id: order.order_id.into(),
            status: OrderStatus::from(order.status.as_str()),
            payment_status: PaymentStatus::from(order.payment_status.as_str()),
            order_total: order.order_total,
            currency: order.currency,
            created_at: order.created_at,
            items: order.items.into_iter().map(CartLineItem::from).collect(),
            reservation_expires_at: order.reservation_expires_at,
            inventory_released: order.inventory_released,
        }
    }
}

impl From<wire::OrderDetail> for OrderDetail {
    fn from(order: wire::OrderDetail) -> Self {
        let summary = OrderSummary::from(order.summary);
        Self {
            order_id: summary.order_id,
            status: summary.status,
            payment_status: summary.payment_status,
            order_total: summary.order_total,
            currency: summary.currency,
            items: summary.items,
            totals: order.totals.into(),
            customer_id: non_empty(order.customer_id).map(CustomerId::from),
            provider_order_id: non_empty(order.provider_order_id),
            provider_payment_id: non_empty(order.provider_payment_id),
            payment_id: non_empty(order.payment_id).map(PaymentId::from),
            idempotency_key: non_empty(order.idempotency_key),
            created_at: summary.created_at,
            updated_at: order.updated_at,
            reservation_expires_at: summary.reservation_expires_at,
            inventory_released: summary.inventory_released,
            is_test: order.is_test,
            payment_is_test: order.payment_is_test,
        }
    }
}

impl From<wire::OrderCreateResponse> for CreatedOrder {
    fn from(response: wire::OrderCreateResponse) -> Self {
        let order = OrderDetail::from(response.order);
        // The top-level reference wins; the order's own copy covers replays
        let provider_order_id =
            non_empty(response.provider_order_id).or_else(|| order.provider_order_id.clone());
        Self {
            order,
            provider_order_id,
        }
    }
}

impl From<&OrderCreate> for wire::OrderCreateRequest {
    fn from(order: &OrderCreate) -> Self {
        Self {
            idempotency_key: order.idempotency_key.to_string(),
            cart_id: Some(order.cart_id.to_string()),
            customer_id: order.customer_id.as_ref().map(ToString::to_string),
            is_test: order.is_test,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bakehouse_core::CartId;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    const CREATED: &str = r#"{
        "order": {
            "order_id": "o1", "status": "created", "order_total": 2150.0,
            "currency": "INR", "created_at": "2025-11-03T10:00:00Z",
            "payment_status": "pending",
            "items": [{"cart_item_id": "i1", "cake_id": "cake-1", "name": null,
                       "quantity": 2, "price_each": 1000, "line_total": 2000}],
            "customer_id": "u1",
            "totals": {"subtotal": 2000, "taxes": 100, "shipping": 50, "total": 2150},
            "payment_id": null, "provider_order_id": "order_rzp_1",
            "provider_payment_id": null, "idempotency_key": "k1",
            "updated_at": "2025-11-03T10:00:00Z"
        },
        "provider_order_id": "",
        "request": {"request_id": "r1"}
    }"#;

    #[test]
    fn test_created_order_falls_back_to_order_reference() {
        let wire: wire::OrderCreateResponse = serde_json::from_str(CREATED).unwrap();
        let created = CreatedOrder::from(wire);

        assert_eq!(created.provider_order_id.as_deref(), Some("order_rzp_1"));
        assert_eq!(created.order.status, OrderStatus::Created);
        assert_eq!(created.order.payment_status, PaymentStatus::Pending);
        assert_eq!(created.order.order_total, Decimal::new(2150, 0));
        assert!(created.order.payment_id.is_none());
        assert!(!created.order.is_test);
        assert_eq!(created.order.amount().to_minor_units().unwrap(), 215_000);
    }

    #[test]
    fn test_unknown_status_is_tolerated() {
        let json = CREATED.replace(r#""status": "created""#, r#""status": "on_hold""#);
        let wire: wire::OrderCreateResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(OrderDetail::from(wire.order).status, OrderStatus::Unknown);
    }

    #[test]
    fn test_order_create_body() {
        let key = Uuid::new_v4();
        let body = wire::OrderCreateRequest::from(&OrderCreate {
            cart_id: CartId::from("c1"),
            customer_id: None,
            idempotency_key: key,
            is_test: Some(true),
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["idempotency_key"], key.to_string());
        assert_eq!(json["cart_id"], "c1");
        assert!(json.get("customer_id").is_none());
        assert_eq!(json["is_test"], true);
    }
}
