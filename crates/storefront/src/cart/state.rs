//! Cart reducer.
//!
//! [`CartState::apply`] is a pure function of the previous state and a
//! [`CartAction`]. All I/O (remote sync, persistence) lives in
//! [`super::CartStore`].

use bakehouse_core::{CakeId, CartId, CartToken, CustomerId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CartItem, CartSnapshot, CartTotals};

/// Local view of the cart, persisted across restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartState {
    pub items: Vec<CartItem>,
    /// Remote cart id, set once the cart has been synced
    #[serde(default)]
    pub cart_id: Option<CartId>,
    /// Guest cart token issued by the service
    #[serde(default)]
    pub cart_token: Option<CartToken>,
    /// Customer the cart was last synced for
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Server totals from the last sync; `None` once a local edit makes them stale
    #[serde(default)]
    pub totals: Option<CartTotals>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A transition of the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add units of a product, merging with an existing line.
    AddItem(CartItem),
    /// Drop the line for a product.
    RemoveItem(CakeId),
    /// Set a line's quantity; zero or less removes it.
    UpdateQuantity { id: CakeId, quantity: i64 },
    /// Empty the cart and forget the remote cart.
    Clear,
    /// Forget the remote cart but keep the lines.
    ResetRemote,
    /// Merge a server snapshot into the local lines.
    Reconcile(CartSnapshot),
}

impl CartState {
    /// Apply an action, returning the next state.
    #[must_use]
    pub fn apply(mut self, action: CartAction) -> Self {
        match action {
            CartAction::AddItem(item) => {
                if item.quantity == 0 {
                    return self;
                }
                match self.items.iter_mut().find(|line| line.id == item.id) {
                    Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
                    None => self.items.push(item),
                }
                self.totals = None;
            }
            CartAction::RemoveItem(id) => {
                let before = self.items.len();
                self.items.retain(|line| line.id != id);
                if self.items.len() != before {
                    self.totals = None;
                }
            }
            CartAction::UpdateQuantity { id, quantity } => {
                if quantity <= 0 {
                    return self.apply(CartAction::RemoveItem(id));
                }
                let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
                if let Some(line) = self.items.iter_mut().find(|line| line.id == id)
                    && line.quantity != quantity
                {
                    line.quantity = quantity;
                    self.totals = None;
                }
            }
            CartAction::Clear => return Self::default(),
            CartAction::ResetRemote => {
                self.cart_id = None;
                self.cart_token = None;
                self.totals = None;
            }
            CartAction::Reconcile(snapshot) => self.merge_snapshot(snapshot),
        }
        self
    }

    /// Take the server's lines, ids and totals while keeping client-only
    /// decorations (image, notes, addons) matched by product id.
    fn merge_snapshot(&mut self, snapshot: CartSnapshot) {
        let previous = std::mem::take(&mut self.items);

        self.items = snapshot
            .items
            .into_iter()
            .filter(|line| line.quantity > 0)
            .map(|line| {
                let local = previous.iter().find(|item| item.id == line.cake_id);
                let name = line
                    .name
                    .or_else(|| local.map(|item| item.name.clone()))
                    .unwrap_or_else(|| line.cake_id.to_string());
                CartItem {
                    name,
                    price: line.price_each,
                    quantity: line.quantity,
                    image_url: local.and_then(|item| item.image_url.clone()),
                    notes: local.and_then(|item| item.notes.clone()),
                    addons: local.map(|item| item.addons.clone()).unwrap_or_default(),
                    cart_item_id: Some(line.cart_item_id),
                    id: line.cake_id,
                }
            })
            .collect();

        self.cart_id = Some(snapshot.cart_id);
        self.cart_token = snapshot.cart_token.or_else(|| self.cart_token.take());
        self.customer_id = snapshot.customer_id.or_else(|| self.customer_id.take());
        self.totals = Some(snapshot.totals);
        self.updated_at = Some(snapshot.updated_at);
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Local subtotal. Display only; checkout charges server totals.
    #[must_use]
    pub fn estimated_subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_estimate).sum()
    }

    /// Line for a product, if present.
    #[must_use]
    pub fn item(&self, id: &CakeId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::CartLineItem;

    fn cake(id: &str, price: i64, quantity: u32) -> CartItem {
        CartItem::new(id, format!("Cake {id}"), Decimal::new(price, 0), quantity)
    }

    fn snapshot(lines: Vec<CartLineItem>) -> CartSnapshot {
        CartSnapshot {
            cart_id: CartId::from("c1"),
            cart_token: Some(CartToken::from("tok")),
            customer_id: None,
            items: lines,
            totals: CartTotals {
                subtotal: Decimal::new(2000, 0),
                taxes: Decimal::new(100, 0),
                shipping: Decimal::new(50, 0),
                total: Decimal::new(2150, 0),
            },
            updated_at: Utc::now(),
        }
    }

    fn line(cake_id: &str, quantity: u32, price: i64) -> CartLineItem {
        CartLineItem {
            cart_item_id: format!("item-{cake_id}").into(),
            cake_id: cake_id.into(),
            name: None,
            quantity,
            price_each: Decimal::new(price, 0),
            line_total: Decimal::new(price * i64::from(quantity), 0),
        }
    }

    #[test]
    fn test_add_merges_by_product_id() {
        let state = CartState::default()
            .apply(CartAction::AddItem(cake("cake-1", 1000, 1)))
            .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
            .apply(CartAction::AddItem(cake("cake-2", 500, 1)));

        assert_eq!(state.items.len(), 2);
        assert_eq!(state.item(&"cake-1".into()).unwrap().quantity, 3);
        assert_eq!(state.item_count(), 4);
        assert_eq!(state.estimated_subtotal(), Decimal::new(3500, 0));
    }

    #[test]
    fn test_add_zero_quantity_is_noop() {
        let state = CartState::default().apply(CartAction::AddItem(cake("cake-1", 1000, 0)));
        assert!(state.is_empty());
    }

    #[test]
    fn test_add_invalidates_totals() {
        let mut state = CartState::default().apply(CartAction::AddItem(cake("cake-1", 1000, 2)));
        state = state.apply(CartAction::Reconcile(snapshot(vec![line("cake-1", 2, 1000)])));
        assert!(state.totals.is_some());

        state = state.apply(CartAction::AddItem(cake("cake-1", 1000, 1)));
        assert!(state.totals.is_none());
        assert!(state.cart_id.is_some());
    }

    #[test]
    fn test_update_quantity_zero_or_negative_removes() {
        for quantity in [0, -3] {
            let state = CartState::default()
                .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
                .apply(CartAction::UpdateQuantity {
                    id: "cake-1".into(),
                    quantity,
                });
            assert!(state.item(&"cake-1".into()).is_none());
        }
    }

    #[test]
    fn test_update_quantity_sets_value() {
        let state = CartState::default()
            .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
            .apply(CartAction::UpdateQuantity {
                id: "cake-1".into(),
                quantity: 5,
            });
        assert_eq!(state.item(&"cake-1".into()).unwrap().quantity, 5);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let state = CartState::default().apply(CartAction::AddItem(cake("cake-1", 1000, 2)));
        let next = state.clone().apply(CartAction::RemoveItem("nope".into()));
        assert_eq!(state, next);
    }

    #[test]
    fn test_clear_drops_remote_identifiers() {
        let state = CartState::default()
            .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
            .apply(CartAction::Reconcile(snapshot(vec![line("cake-1", 2, 1000)])))
            .apply(CartAction::Clear);
        assert_eq!(state, CartState::default());
    }

    #[test]
    fn test_reconcile_preserves_client_only_fields() {
        let mut item = cake("cake-1", 900, 2);
        item.image_url = Some("https://cdn.example.com/bf.jpg".to_string());
        item.notes = Some("Happy birthday Asha".to_string());
        item.addons = vec!["candles".to_string()];

        let state = CartState::default()
            .apply(CartAction::AddItem(item))
            .apply(CartAction::Reconcile(snapshot(vec![line("cake-1", 2, 1000)])));

        let merged = state.item(&"cake-1".into()).unwrap();
        assert_eq!(merged.price, Decimal::new(1000, 0));
        assert_eq!(merged.cart_item_id.as_ref().unwrap().as_str(), "item-cake-1");
        assert_eq!(merged.name, "Cake cake-1");
        assert_eq!(merged.image_url.as_deref(), Some("https://cdn.example.com/bf.jpg"));
        assert_eq!(merged.notes.as_deref(), Some("Happy birthday Asha"));
        assert_eq!(merged.addons, vec!["candles".to_string()]);
        assert_eq!(state.cart_id.as_ref().unwrap().as_str(), "c1");
        assert_eq!(state.totals.as_ref().unwrap().total, Decimal::new(2150, 0));
    }

    #[test]
    fn test_reconcile_drops_zero_quantity_lines() {
        let state = CartState::default()
            .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
            .apply(CartAction::Reconcile(snapshot(vec![
                line("cake-1", 2, 1000),
                line("cake-2", 0, 500),
            ])));
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn test_reset_remote_keeps_lines() {
        let state = CartState::default()
            .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
            .apply(CartAction::Reconcile(snapshot(vec![line("cake-1", 2, 1000)])))
            .apply(CartAction::ResetRemote);
        assert!(state.cart_id.is_none());
        assert!(state.cart_token.is_none());
        assert!(state.totals.is_none());
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn test_state_survives_json_round_trip() {
        let state = CartState::default()
            .apply(CartAction::AddItem(cake("cake-1", 1000, 2)))
            .apply(CartAction::Reconcile(snapshot(vec![line("cake-1", 2, 1000)])));
        let json = serde_json::to_string(&state).unwrap();
        let restored: CartState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, state);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;
        use proptest::test_runner::Config;

        fn cake_id() -> impl Strategy<Value = String> {
            (0_u8..4).prop_map(|n| format!("cake-{n}"))
        }

        fn action() -> impl Strategy<Value = CartAction> {
            prop_oneof![
                4 => (cake_id(), 0_u32..5).prop_map(|(id, quantity)| {
                    CartAction::AddItem(cake(&id, 1000, quantity))
                }),
                2 => cake_id().prop_map(|id| CartAction::RemoveItem(id.into())),
                3 => (cake_id(), -3_i64..6).prop_map(|(id, quantity)| {
                    CartAction::UpdateQuantity {
                        id: id.into(),
                        quantity,
                    }
                }),
            ]
        }

        proptest! {
            #![proptest_config(Config::with_cases(256))]
            #[test]
            fn lines_stay_positive_and_unique(actions in prop::collection::vec(action(), 0..40)) {
                let mut state = CartState::default();
                for action in actions {
                    state = state.apply(action);

                    prop_assert!(state.items.iter().all(|line| line.quantity > 0));
                    let mut ids: Vec<&str> = state.items.iter().map(|line| line.id.as_str()).collect();
                    ids.sort_unstable();
                    ids.dedup();
                    prop_assert_eq!(ids.len(), state.items.len());
                }
            }
        }
    }
}
