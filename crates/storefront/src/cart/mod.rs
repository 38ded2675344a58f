//! Cart store.
//!
//! Holds the local cart, persists every transition, and reconciles with the
//! remote cart on demand.
//!
//! # Behavior
//!
//! - Local edits never touch the network and always succeed
//! - [`CartStore::sync_cart`] sends the full item list (full replacement) and
//!   merges the server snapshot back; on failure the previous state is kept
//!   and the error is returned
//! - Persistence failures are logged, never surfaced; the in-memory cart
//!   stays authoritative for the running process
//! - The state lock is held across a sync, so concurrent syncs serialize

mod state;

pub use state::{CartAction, CartState};

use std::sync::Arc;

use bakehouse_core::{CakeId, CustomerId};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiError, CartApi};
use crate::conversions::cart_upsert;
use crate::storage::Storage;
use crate::types::{CartItem, CartSnapshot};

/// Local cart with remote reconciliation.
pub struct CartStore {
    state: Mutex<CartState>,
    api: Arc<dyn CartApi>,
    storage: Arc<dyn Storage<CartState>>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore").finish_non_exhaustive()
    }
}

impl CartStore {
    /// Create an empty store. Call [`Self::restore`] to load the persisted cart.
    #[must_use]
    pub fn new(api: Arc<dyn CartApi>, storage: Arc<dyn Storage<CartState>>) -> Self {
        Self {
            state: Mutex::new(CartState::default()),
            api,
            storage,
        }
    }

    /// Load the persisted cart. An unreadable cart is logged and replaced by
    /// an empty one.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> CartState {
        let restored = match self.storage.load().await {
            Ok(Some(state)) => state,
            Ok(None) => CartState::default(),
            Err(e) => {
                warn!(error = %e, "Failed to restore cart, starting empty");
                CartState::default()
            }
        };

        let mut state = self.state.lock().await;
        *state = restored;
        debug!(items = state.items.len(), "Cart restored");
        state.clone()
    }

    /// Current cart.
    pub async fn snapshot(&self) -> CartState {
        self.state.lock().await.clone()
    }

    /// Add units of a product.
    pub async fn add_item(&self, item: CartItem) -> CartState {
        self.dispatch(CartAction::AddItem(item)).await
    }

    /// Remove a product's line.
    pub async fn remove_item(&self, id: &CakeId) -> CartState {
        self.dispatch(CartAction::RemoveItem(id.clone())).await
    }

    /// Set a line's quantity; zero or less removes the line.
    pub async fn update_quantity(&self, id: &CakeId, quantity: i64) -> CartState {
        self.dispatch(CartAction::UpdateQuantity {
            id: id.clone(),
            quantity,
        })
        .await
    }

    /// Empty the cart. The next sync creates a new remote cart.
    pub async fn clear_cart(&self) -> CartState {
        self.dispatch(CartAction::Clear).await
    }

    /// Reconcile with the remote cart.
    ///
    /// An empty cart forgets its remote identifiers and makes no call.
    /// Otherwise the full item list is upserted with the existing cart token
    /// and the server snapshot is merged back. `customer_id` falls back to
    /// the customer the cart was last synced for.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the local cart is left as it was.
    #[instrument(skip(self), fields(customer_id = ?customer_id))]
    pub async fn sync_cart(
        &self,
        customer_id: Option<CustomerId>,
    ) -> Result<Option<CartSnapshot>, ApiError> {
        let mut state = self.state.lock().await;

        if state.is_empty() {
            let next = state.clone().apply(CartAction::ResetRemote);
            if next != *state {
                *state = next;
                self.persist(&state).await;
            }
            debug!("Cart is empty, skipping sync");
            return Ok(None);
        }

        let upsert = cart_upsert(
            &state.items,
            customer_id.or_else(|| state.customer_id.clone()),
            state.cart_token.clone(),
        );

        let snapshot = match self.api.upsert_cart(&upsert).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Cart sync failed, keeping local cart");
                return Err(e);
            }
        };

        info!(
            cart_id = %snapshot.cart_id,
            lines = snapshot.items.len(),
            total = %snapshot.totals.total,
            "Cart synced"
        );

        *state = state.clone().apply(CartAction::Reconcile(snapshot.clone()));
        self.persist(&state).await;
        Ok(Some(snapshot))
    }

    /// Re-read the remote cart and merge it in.
    ///
    /// `reference` may be a cart id, cart token, or customer id; by default
    /// the cart's own id (or token) is used. Returns `None` when the cart has
    /// never been synced.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the local cart is left as it was.
    #[instrument(skip(self))]
    pub async fn refresh(&self, reference: Option<&str>) -> Result<Option<CartSnapshot>, ApiError> {
        let mut state = self.state.lock().await;

        let reference = match reference {
            Some(reference) => reference.to_string(),
            None => match state.cart_id.as_ref().map(ToString::to_string).or_else(|| {
                state.cart_token.as_ref().map(ToString::to_string)
            }) {
                Some(reference) => reference,
                None => return Ok(None),
            },
        };

        let snapshot = self.api.get_cart(&reference).await?;
        *state = state.clone().apply(CartAction::Reconcile(snapshot.clone()));
        self.persist(&state).await;
        Ok(Some(snapshot))
    }

    /// Delete the remote cart, then clear the local one.
    ///
    /// A remote cart that is already gone counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns the transport error; the local cart is left as it was.
    #[instrument(skip(self))]
    pub async fn discard_remote(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().await;

        if let Some(cart_id) = state.cart_id.clone() {
            match self.api.delete_cart(&cart_id).await {
                Ok(deleted) => info!(cart_id = %cart_id, deleted, "Remote cart discarded"),
                Err(e) if e.is_not_found() => debug!(cart_id = %cart_id, "Remote cart already gone"),
                Err(e) => return Err(e),
            }
        }

        *state = CartState::default();
        self.persist(&state).await;
        Ok(())
    }

    async fn dispatch(&self, action: CartAction) -> CartState {
        let mut state = self.state.lock().await;
        *state = state.clone().apply(action);
        self.persist(&state).await;
        state.clone()
    }

    async fn persist(&self, state: &CartState) {
        if let Err(e) = self.storage.save(state).await {
            warn!(error = %e, "Failed to persist cart");
        }
    }
}
