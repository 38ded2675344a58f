//! Order endpoints.

use async_trait::async_trait;
use bakehouse_core::{CustomerId, OrderId};
use tracing::{info, instrument};

use super::wire::{OrderCancelResponse, OrderCreateRequest, OrderCreateResponse, OrderLookupResponse};
use super::{ApiClient, ApiError, RequestOptions};
use crate::types::{CreatedOrder, OrderCreate, OrderDetail, OrderSummary};

/// Header carrying the per-attempt idempotency key.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// The service's order resource.
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// Create an order from a cart. Replaying the same idempotency key returns
    /// the order created by the first call.
    async fn create_order(&self, order: &OrderCreate) -> Result<CreatedOrder, ApiError>;

    /// Fetch a single order.
    async fn get_order(&self, id: &OrderId) -> Result<OrderDetail, ApiError>;

    /// List a customer's orders, newest first.
    async fn list_orders(&self, customer_id: &CustomerId) -> Result<Vec<OrderSummary>, ApiError>;

    /// Cancel an order that has not been paid.
    async fn cancel_order(&self, id: &OrderId) -> Result<OrderDetail, ApiError>;
}

#[async_trait]
impl OrderApi for ApiClient {
    #[instrument(skip(self, order), fields(cart_id = %order.cart_id, idempotency_key = %order.idempotency_key))]
    async fn create_order(&self, order: &OrderCreate) -> Result<CreatedOrder, ApiError> {
        let body = OrderCreateRequest::from(order);
        let options =
            RequestOptions::default().header(IDEMPOTENCY_HEADER, order.idempotency_key.to_string());

        let response: OrderCreateResponse = self.post("/orders", &body, options).await?;
        let created = CreatedOrder::from(response);

        info!(order_id = %created.order.order_id, "Order created");
        Ok(created)
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn get_order(&self, id: &OrderId) -> Result<OrderDetail, ApiError> {
        let path = format!("/orders/{}", urlencoding::encode(id.as_str()));
        match self
            .get::<OrderLookupResponse>(&path, RequestOptions::default())
            .await?
        {
            OrderLookupResponse::Detail { order, .. } => Ok(OrderDetail::from(*order)),
            OrderLookupResponse::List { .. } => Err(ApiError::UnexpectedResponse(format!(
                "expected order {id}, got an order list"
            ))),
        }
    }

    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn list_orders(&self, customer_id: &CustomerId) -> Result<Vec<OrderSummary>, ApiError> {
        let path = format!("/orders/{}", urlencoding::encode(customer_id.as_str()));
        match self
            .get::<OrderLookupResponse>(&path, RequestOptions::default())
            .await?
        {
            OrderLookupResponse::List { orders, .. } => {
                Ok(orders.into_iter().map(OrderSummary::from).collect())
            }
            OrderLookupResponse::Detail { .. } => Err(ApiError::UnexpectedResponse(format!(
                "expected orders of {customer_id}, got a single order"
            ))),
        }
    }

    #[instrument(skip(self), fields(order_id = %id))]
    async fn cancel_order(&self, id: &OrderId) -> Result<OrderDetail, ApiError> {
        let path = format!("/orders/{}/cancel", urlencoding::encode(id.as_str()));
        let response: OrderCancelResponse = self
            .post(&path, &serde_json::json!({}), RequestOptions::default())
            .await?;
        info!(status = %response.order.summary.status, "Order cancelled");
        Ok(OrderDetail::from(response.order))
    }
}
