//! Cart conversions, both directions.

use bakehouse_core::{CartToken, CustomerId};

use crate::api::wire;
use crate::types::{CartItem, CartLineInput, CartLineItem, CartSnapshot, CartTotals, CartUpsert};

use super::non_empty;

impl From<wire::CartItem> for CartLineItem {
    fn from(item: wire::CartItem) -> Self {
        Self {
            cart_item_id: item.cart_item_id.into(),
            cake_id: item.cake_id.into(),
            name: non_empty(item.name),
            quantity: item.quantity,
            price_each: item.price_each,
            line_total: item.line_total,
        }
    }
}

impl From<wire::MoneyBreakdown> for CartTotals {
    fn from(totals: wire::MoneyBreakdown) -> Self {
        Self {
            subtotal: totals.subtotal,
            taxes: totals.taxes,
            shipping: totals.shipping,
            total: totals.total,
        }
    }
}

impl From<wire::CartResponse> for CartSnapshot {
    fn from(cart: wire::CartResponse) -> Self {
        Self {
            cart_id: cart.cart_id.into(),
            cart_token: non_empty(cart.cart_token).map(CartToken::from),
            customer_id: non_empty(cart.customer_id).map(CustomerId::from),
            items: cart.items.into_iter().map(CartLineItem::from).collect(),
            totals: cart.totals.into(),
            updated_at: cart.updated_at,
        }
    }
}

impl From<&CartUpsert> for wire::CartUpsertRequest {
    fn from(cart: &CartUpsert) -> Self {
        Self {
            customer_id: cart.customer_id.as_ref().map(ToString::to_string),
            cart_token: cart.cart_token.as_ref().map(ToString::to_string),
            items: cart
                .items
                .iter()
                .map(|line| wire::CartItemInput {
                    cake_id: line.cake_id.to_string(),
                    quantity: line.quantity,
                    price_each: line.price_each,
                })
                .collect(),
        }
    }
}

/// Build the full-replacement upsert for the local cart lines.
#[must_use]
pub fn cart_upsert(
    items: &[CartItem],
    customer_id: Option<CustomerId>,
    cart_token: Option<CartToken>,
) -> CartUpsert {
    CartUpsert {
        customer_id,
        cart_token,
        items: items
            .iter()
            .map(|item| CartLineInput {
                cake_id: item.id.clone(),
                quantity: item.quantity,
                price_each: item.price,
            })
            .collect(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_cart_response_conversion() {
        let json = r#"{
            "cart_id": "c1",
            "customer_id": "",
            "cart_token": "tok",
            "items": [{
                "cart_item_id": "i1", "cake_id": "cake-1", "name": "Black Forest",
                "quantity": 2, "price_each": 1000, "line_total": 2000
            }],
            "totals": {"subtotal": 2000, "taxes": 100, "shipping": 50, "total": 2150},
            "updated_at": "2025-11-03T10:00:00Z",
            "request": {"request_id": "r1"}
        }"#;
        let wire: wire::CartResponse = serde_json::from_str(json).unwrap();
        let snapshot = CartSnapshot::from(wire);

        assert_eq!(snapshot.cart_id.as_str(), "c1");
        assert!(snapshot.customer_id.is_none());
        assert_eq!(snapshot.cart_token.unwrap().as_str(), "tok");
        assert_eq!(snapshot.items[0].cart_item_id.as_str(), "i1");
        assert_eq!(snapshot.totals.total, Decimal::new(2150, 0));
    }

    #[test]
    fn test_cart_upsert_carries_every_line() {
        let items = vec![
            CartItem::new("cake-1", "Black Forest", Decimal::new(1000, 0), 2),
            CartItem::new("cake-2", "Red Velvet", Decimal::new(1250, 0), 1),
        ];
        let upsert = cart_upsert(&items, None, Some(CartToken::from("tok")));
        let body = wire::CartUpsertRequest::from(&upsert);

        assert_eq!(body.items.len(), 2);
        assert_eq!(body.items[1].cake_id, "cake-2");
        assert_eq!(body.cart_token.as_deref(), Some("tok"));
        assert!(body.customer_id.is_none());
    }
}
