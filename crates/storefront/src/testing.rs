//! In-memory stand-ins for the service seams, shared by unit tests.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bakehouse_core::{CartId, CustomerId, OrderId, OrderStatus, PaymentId, PaymentStatus};
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Notify;

use crate::api::{ApiError, CartApi, OrderApi};
use crate::checkout::{PaymentGateway, PaymentOutcome, PaymentRequest};
use crate::storage::{Storage, StorageError};
use crate::types::{
    CartLineItem, CartSnapshot, CartTotals, CartUpsert, CreatedOrder, OrderCreate, OrderDetail,
    OrderSummary,
};

pub fn unavailable() -> ApiError {
    ApiError::Status {
        status: 503,
        message: "Service Unavailable".to_string(),
        code: None,
        data: None,
    }
}

/// Totals the way the stub service prices a cart: 5% tax, flat 50 shipping.
pub fn priced(lines: &[CartLineItem]) -> CartTotals {
    let subtotal: Decimal = lines.iter().map(|line| line.line_total).sum();
    let taxes = subtotal * Decimal::new(5, 2);
    let shipping = Decimal::new(50, 0);
    CartTotals {
        subtotal,
        taxes,
        shipping,
        total: subtotal + taxes + shipping,
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Default)]
pub struct StubCartApi {
    upserts: Mutex<Vec<CartUpsert>>,
    deleted: Mutex<Vec<CartId>>,
    last: Mutex<Option<CartSnapshot>>,
    failing: AtomicBool,
}

impl StubCartApi {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.lock().unwrap().len()
    }

    pub fn last_upsert(&self) -> Option<CartUpsert> {
        self.upserts.lock().unwrap().last().cloned()
    }

    pub fn deleted(&self) -> Vec<CartId> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn last_snapshot(&self) -> Option<CartSnapshot> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl CartApi for StubCartApi {
    async fn upsert_cart(&self, cart: &CartUpsert) -> Result<CartSnapshot, ApiError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.upserts.lock().unwrap().push(cart.clone());

        let items: Vec<CartLineItem> = cart
            .items
            .iter()
            .map(|line| CartLineItem {
                cart_item_id: format!("line-{}", line.cake_id).into(),
                cake_id: line.cake_id.clone(),
                name: None,
                quantity: line.quantity,
                price_each: line.price_each,
                line_total: line.price_each * Decimal::from(line.quantity),
            })
            .collect();

        let snapshot = CartSnapshot {
            cart_id: CartId::from("cart-1"),
            cart_token: Some(cart.cart_token.clone().unwrap_or_else(|| "tok-1".into())),
            customer_id: cart.customer_id.clone(),
            totals: priced(&items),
            items,
            updated_at: Utc::now(),
        };
        *self.last.lock().unwrap() = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn get_cart(&self, _reference: &str) -> Result<CartSnapshot, ApiError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        self.last.lock().unwrap().clone().ok_or(ApiError::Status {
            status: 404,
            message: "Cart not found".to_string(),
            code: Some("cart_not_found".to_string()),
            data: None,
        })
    }

    async fn delete_cart(&self, cart_id: &CartId) -> Result<bool, ApiError> {
        self.deleted.lock().unwrap().push(cart_id.clone());
        Ok(true)
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Order service stand-in. Orders are deduplicated by idempotency key and
/// priced from the linked cart's last synced snapshot.
#[derive(Default)]
pub struct StubOrderApi {
    cart: Option<Arc<StubCartApi>>,
    created: Mutex<Vec<OrderCreate>>,
    orders: Mutex<Vec<OrderDetail>>,
    fail_create: AtomicBool,
    fail_fetch: AtomicBool,
    fetches: AtomicUsize,
}

impl StubOrderApi {
    pub fn pricing_from(cart: Arc<StubCartApi>) -> Self {
        Self {
            cart: Some(cart),
            ..Self::default()
        }
    }

    pub fn set_fail_create(&self, failing: bool) {
        self.fail_create.store(failing, Ordering::SeqCst);
    }

    pub fn set_fail_fetch(&self, failing: bool) {
        self.fail_fetch.store(failing, Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> Vec<OrderCreate> {
        self.created.lock().unwrap().clone()
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn detail(&self, request: &OrderCreate, number: usize) -> OrderDetail {
        let now = Utc::now();
        let (items, totals) = self
            .cart
            .as_ref()
            .and_then(|cart| cart.last_snapshot())
            .map_or_else(
                || (Vec::new(), priced(&[])),
                |snapshot| (snapshot.items, snapshot.totals),
            );
        OrderDetail {
            order_id: OrderId::from(format!("order-{number}")),
            status: OrderStatus::Created,
            payment_status: PaymentStatus::Pending,
            order_total: totals.total,
            currency: "INR".to_string(),
            items,
            totals,
            customer_id: request.customer_id.clone(),
            provider_order_id: Some(format!("order_rzp_{number}")),
            provider_payment_id: None,
            payment_id: None,
            idempotency_key: Some(request.idempotency_key.to_string()),
            created_at: now,
            updated_at: now,
            reservation_expires_at: None,
            inventory_released: false,
            is_test: request.is_test.unwrap_or(false),
            payment_is_test: request.is_test.unwrap_or(false),
        }
    }
}

#[async_trait]
impl OrderApi for StubOrderApi {
    async fn create_order(&self, order: &OrderCreate) -> Result<CreatedOrder, ApiError> {
        self.created.lock().unwrap().push(order.clone());
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(unavailable());
        }

        let mut orders = self.orders.lock().unwrap();
        let key = order.idempotency_key.to_string();
        if let Some(existing) = orders
            .iter()
            .find(|o| o.idempotency_key.as_deref() == Some(key.as_str()))
        {
            return Ok(CreatedOrder {
                provider_order_id: existing.provider_order_id.clone(),
                order: existing.clone(),
            });
        }

        let detail = self.detail(order, orders.len() + 1);
        orders.push(detail.clone());
        Ok(CreatedOrder {
            provider_order_id: detail.provider_order_id.clone(),
            order: detail,
        })
    }

    async fn get_order(&self, id: &OrderId) -> Result<OrderDetail, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let orders = self.orders.lock().unwrap();
        let mut order = orders
            .iter()
            .find(|o| &o.order_id == id)
            .cloned()
            .ok_or_else(unavailable)?;
        order.status = OrderStatus::Confirmed;
        order.payment_status = PaymentStatus::Paid;
        order.payment_id = Some(PaymentId::from("pay_1"));
        Ok(order)
    }

    async fn list_orders(&self, customer_id: &CustomerId) -> Result<Vec<OrderSummary>, ApiError> {
        let orders = self.orders.lock().unwrap();
        Ok(orders
            .iter()
            .filter(|o| o.customer_id.as_ref() == Some(customer_id))
            .map(|o| OrderSummary {
                order_id: o.order_id.clone(),
                status: o.status,
                payment_status: o.payment_status,
                order_total: o.order_total,
                currency: o.currency.clone(),
                created_at: o.created_at,
                items: o.items.clone(),
                reservation_expires_at: o.reservation_expires_at,
                inventory_released: o.inventory_released,
            })
            .collect())
    }

    async fn cancel_order(&self, id: &OrderId) -> Result<OrderDetail, ApiError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| &o.order_id == id)
            .ok_or_else(unavailable)?;
        order.status = OrderStatus::Cancelled;
        order.payment_status = PaymentStatus::Cancelled;
        Ok(order.clone())
    }
}

// =============================================================================
// Payment gateway
// =============================================================================

/// Gateway that answers with a fixed outcome and records what it was opened
/// with. With a gate set, it waits for [`ScriptedGateway::release`] first.
pub struct ScriptedGateway {
    outcome: PaymentOutcome,
    requests: Mutex<Vec<PaymentRequest>>,
    gate: Option<Arc<Notify>>,
}

impl ScriptedGateway {
    pub fn new(outcome: PaymentOutcome) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn gated(outcome: PaymentOutcome, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(outcome)
        }
    }

    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn open(&self, request: PaymentRequest) -> PaymentOutcome {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.outcome.clone()
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Storage whose every operation fails.
pub struct FailingStorage;

fn disk_full() -> StorageError {
    StorageError::Io {
        path: "cart.json".into(),
        source: std::io::Error::other("disk full"),
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Storage<T> for FailingStorage {
    async fn load(&self) -> Result<Option<T>, StorageError> {
        Err(disk_full())
    }

    async fn save(&self, _value: &T) -> Result<(), StorageError> {
        Err(disk_full())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        Err(disk_full())
    }
}
