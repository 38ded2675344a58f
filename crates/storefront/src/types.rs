//! View models used by the rest of the client.
//!
//! These types provide a clean, ergonomic API separate from the raw wire
//! types in [`crate::api::wire`]. Money is always [`Decimal`] in the
//! currency's standard unit.

use bakehouse_core::{
    CakeId, CartId, CartItemId, CartToken, CustomerId, OrderId, OrderStatus, PaymentId,
    PaymentStatus, Price,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Catalog Types
// =============================================================================

/// A cake as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cake {
    pub id: CakeId,
    pub name: String,
    pub slug: String,
    pub price: Decimal,
    pub currency: String,
    pub category: Option<String>,
    pub is_available: bool,
}

impl Cake {
    /// Listed price with its currency.
    #[must_use]
    pub fn price(&self) -> Price {
        Price::new(self.price, self.currency.clone())
    }
}

/// Full catalog entry for a single cake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CakeDetail {
    pub cake: Cake,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub stock_quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One page of catalog results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CakePage {
    pub cakes: Vec<Cake>,
    pub total_count: u64,
}

/// Catalog listing filters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CakeFilters {
    /// Free text search term
    pub search: Option<String>,
    /// Category slug
    pub category: Option<String>,
    /// Minimum price (inclusive)
    pub min_price: Option<Decimal>,
    /// Maximum price (inclusive)
    pub max_price: Option<Decimal>,
    /// Page number, starting at 1
    pub page: u32,
    /// Results per page (service caps this at 100)
    pub page_size: u32,
}

impl Default for CakeFilters {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            min_price: None,
            max_price: None,
            page: 1,
            page_size: 20,
        }
    }
}

// =============================================================================
// Cart Types
// =============================================================================

/// A line in the local cart.
///
/// `cart_item_id` is only present once the line has been persisted by the
/// remote cart. `image_url`, `notes` and `addons` never leave the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Product (cake) id; lines are keyed on it
    pub id: CakeId,
    pub name: String,
    /// Unit price; a display estimate until the cart has been synced
    pub price: Decimal,
    /// Always greater than zero
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart_item_id: Option<CartItemId>,
}

impl CartItem {
    /// Create a line with no client-only decorations.
    #[must_use]
    pub fn new(id: impl Into<CakeId>, name: impl Into<String>, price: Decimal, quantity: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity,
            image_url: None,
            notes: None,
            addons: Vec::new(),
            cart_item_id: None,
        }
    }

    /// Build a line for `quantity` units of a catalog entry.
    #[must_use]
    pub fn from_cake(cake: &CakeDetail, quantity: u32) -> Self {
        Self {
            image_url: cake.image_url.clone(),
            ..Self::new(cake.cake.id.clone(), cake.cake.name.clone(), cake.cake.price, quantity)
        }
    }

    /// Local line total estimate.
    #[must_use]
    pub fn line_estimate(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A line as stored by the remote cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub cart_item_id: CartItemId,
    pub cake_id: CakeId,
    pub name: Option<String>,
    pub quantity: u32,
    pub price_each: Decimal,
    pub line_total: Decimal,
}

/// Server-computed cart totals. The only numbers used for charging.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub taxes: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

/// Server-authoritative cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub cart_id: CartId,
    pub cart_token: Option<CartToken>,
    pub customer_id: Option<CustomerId>,
    pub items: Vec<CartLineItem>,
    pub totals: CartTotals,
    pub updated_at: DateTime<Utc>,
}

/// A line sent to the remote cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineInput {
    pub cake_id: CakeId,
    pub quantity: u32,
    pub price_each: Decimal,
}

/// Full replacement of the remote cart's contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartUpsert {
    pub customer_id: Option<CustomerId>,
    pub cart_token: Option<CartToken>,
    pub items: Vec<CartLineInput>,
}

// =============================================================================
// Order Types
// =============================================================================

/// Parameters of an order-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreate {
    pub cart_id: CartId,
    pub customer_id: Option<CustomerId>,
    /// Same key, same order: the service returns the first order it created
    pub idempotency_key: Uuid,
    pub is_test: Option<bool>,
}

/// Full order as returned by the order service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_total: Decimal,
    pub currency: String,
    pub items: Vec<CartLineItem>,
    pub totals: CartTotals,
    pub customer_id: Option<CustomerId>,
    pub provider_order_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub payment_id: Option<PaymentId>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub inventory_released: bool,
    pub is_test: bool,
    pub payment_is_test: bool,
}

impl OrderDetail {
    /// Authoritative amount to charge.
    #[must_use]
    pub fn amount(&self) -> Price {
        Price::new(self.order_total, self.currency.clone())
    }
}

/// Order as it appears in a customer's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_total: Decimal,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartLineItem>,
    pub reservation_expires_at: Option<DateTime<Utc>>,
    pub inventory_released: bool,
}

/// Result of an order-creation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order: OrderDetail,
    /// Gateway order reference the payment widget is opened with
    pub provider_order_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_item_line_estimate() {
        let item = CartItem::new("cake-1", "Black Forest", Decimal::new(1000, 0), 2);
        assert_eq!(item.line_estimate(), Decimal::new(2000, 0));
    }

    #[test]
    fn test_default_filters() {
        let filters = CakeFilters::default();
        assert_eq!(filters.page, 1);
        assert_eq!(filters.page_size, 20);
    }
}
