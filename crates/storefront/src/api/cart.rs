//! Remote cart endpoints. Never cached.

use async_trait::async_trait;
use bakehouse_core::CartId;
use tracing::instrument;

use super::wire::{CartDeleteResponse, CartResponse, CartUpsertRequest};
use super::{ApiClient, ApiError, RequestOptions};
use crate::types::{CartSnapshot, CartUpsert};

/// The service's cart resource.
#[async_trait]
pub trait CartApi: Send + Sync {
    /// Replace the remote cart's contents, creating the cart if needed.
    async fn upsert_cart(&self, cart: &CartUpsert) -> Result<CartSnapshot, ApiError>;

    /// Read a cart by id, cart token, or customer id.
    async fn get_cart(&self, reference: &str) -> Result<CartSnapshot, ApiError>;

    /// Delete a cart. Returns whether the service reported a deletion.
    async fn delete_cart(&self, cart_id: &CartId) -> Result<bool, ApiError>;
}

#[async_trait]
impl CartApi for ApiClient {
    #[instrument(skip(self, cart), fields(items = cart.items.len()))]
    async fn upsert_cart(&self, cart: &CartUpsert) -> Result<CartSnapshot, ApiError> {
        let body = CartUpsertRequest::from(cart);
        let response: CartResponse = self.post("/cart", &body, RequestOptions::default()).await?;
        Ok(CartSnapshot::from(response))
    }

    #[instrument(skip(self))]
    async fn get_cart(&self, reference: &str) -> Result<CartSnapshot, ApiError> {
        let path = format!("/cart/{}", urlencoding::encode(reference));
        let response: CartResponse = self.get(&path, RequestOptions::default()).await?;
        Ok(CartSnapshot::from(response))
    }

    #[instrument(skip(self), fields(cart_id = %cart_id))]
    async fn delete_cart(&self, cart_id: &CartId) -> Result<bool, ApiError> {
        let path = format!("/cart/{}", urlencoding::encode(cart_id.as_str()));
        let response: CartDeleteResponse = self.delete(&path, RequestOptions::default()).await?;
        if response.cart_id != cart_id.as_str() {
            return Err(ApiError::UnexpectedResponse(format!(
                "deleted cart {} instead of {cart_id}",
                response.cart_id
            )));
        }
        Ok(response.deleted)
    }
}
