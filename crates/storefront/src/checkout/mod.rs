//! Checkout orchestrator.
//!
//! Drives one checkout attempt through
//! `Idle -> Validating -> SyncingCart -> CreatingOrder -> AwaitingPayment ->
//! Confirming -> Done`, with `Error` reachable from every step.
//!
//! # Guarantees
//!
//! - The cart is re-synced right before order creation, so the order is
//!   priced from fresh server totals
//! - The charged amount is the order's `order_total`, never a local sum
//! - Each attempt carries a fresh idempotency key; replaying a key through
//!   [`Checkout::submit_with_key`] returns the order the first call created
//! - Only one attempt runs at a time per orchestrator
//! - The cart is cleared only after the paid order has been re-fetched
//!
//! Nothing is retried automatically. A failed or dismissed payment leaves
//! the remote order as the service left it.

mod payment;

pub use payment::{
    PaymentConfirmation, PaymentFailure, PaymentGateway, PaymentOutcome, PaymentPrefill,
    PaymentRequest,
};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bakehouse_core::{CustomerId, OrderId, PriceError};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::{ApiError, OrderApi};
use crate::cart::CartStore;
use crate::config::PaymentConfig;
use crate::error::{add_breadcrumb, capture};
use crate::types::{OrderCreate, OrderDetail, OrderSummary};

/// Errors that end a checkout attempt.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The form or cart is not ready for checkout.
    #[error("{0}")]
    Validation(String),

    /// The order service could not be reached or rejected the call.
    #[error("Order service request failed: {0}")]
    Transport(#[from] ApiError),

    /// The order came back without a gateway order reference.
    #[error("Order {0} has no payment reference")]
    MissingPaymentReference(OrderId),

    /// The order total cannot be expressed in minor units.
    #[error("Invalid order amount: {0}")]
    Amount(#[from] PriceError),

    /// The gateway reported a failure or the customer closed the widget.
    #[error("Payment for order {order_id} did not complete: {message}")]
    Payment { message: String, order_id: OrderId },

    /// The gateway took the payment but the order could not be re-fetched.
    #[error("Payment {payment_id} captured but order {order_id} could not be confirmed: {source}")]
    PaymentNotConfirmed {
        order_id: OrderId,
        payment_id: String,
        #[source]
        source: ApiError,
    },

    /// Another attempt is still running.
    #[error("A checkout is already in progress")]
    AlreadyInProgress,

    /// Payment settings are unusable.
    #[error("Payments are not configured: {0}")]
    Configuration(String),
}

impl CheckoutError {
    /// Message suitable for showing to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Payment { message, .. } => message.clone(),
            Self::Transport(e) => e.user_message(),
            Self::MissingPaymentReference(_) => {
                "We could not start the payment for this order, please try again".to_string()
            }
            Self::Amount(_) => "The order total could not be processed".to_string(),
            Self::PaymentNotConfirmed {
                order_id,
                payment_id,
                ..
            } => format!(
                "Your payment {payment_id} was captured but order {order_id} is not confirmed yet. \
                 Please contact support instead of paying again."
            ),
            Self::AlreadyInProgress => "Checkout is already in progress".to_string(),
            Self::Configuration(_) => "Online payment is not available right now".to_string(),
        }
    }
}

/// Where the current attempt is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CheckoutPhase {
    #[default]
    Idle,
    Validating,
    SyncingCart,
    CreatingOrder,
    AwaitingPayment { order_id: OrderId },
    Confirming { order_id: OrderId },
    Done { order_id: OrderId },
    Error { message: String },
}

impl CheckoutPhase {
    /// Short name used in logs and breadcrumbs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::SyncingCart => "syncing_cart",
            Self::CreatingOrder => "creating_order",
            Self::AwaitingPayment { .. } => "awaiting_payment",
            Self::Confirming { .. } => "confirming",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

impl std::fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Customer input for a checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutForm {
    pub address: String,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    /// Signed-in customer, if any
    pub customer_id: Option<CustomerId>,
}

impl CheckoutForm {
    fn validate(&self) -> Result<(), CheckoutError> {
        if self.address.trim().is_empty() {
            return Err(CheckoutError::Validation(
                "Please enter a delivery address".to_string(),
            ));
        }
        if self.phone.trim().is_empty() {
            return Err(CheckoutError::Validation(
                "Please enter a contact phone number".to_string(),
            ));
        }
        Ok(())
    }
}

/// A completed checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    /// The order as re-fetched after payment
    pub order: OrderDetail,
    pub payment: PaymentConfirmation,
}

/// Releases the in-flight flag when the attempt ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Checkout orchestrator.
pub struct Checkout {
    cart: Arc<CartStore>,
    orders: Arc<dyn OrderApi>,
    gateway: Arc<dyn PaymentGateway>,
    settings: PaymentConfig,
    in_flight: AtomicBool,
    phase: watch::Sender<CheckoutPhase>,
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("phase", &*self.phase.borrow())
            .field("test_mode", &self.settings.test_mode)
            .finish_non_exhaustive()
    }
}

impl Checkout {
    #[must_use]
    pub fn new(
        cart: Arc<CartStore>,
        orders: Arc<dyn OrderApi>,
        gateway: Arc<dyn PaymentGateway>,
        settings: PaymentConfig,
    ) -> Self {
        Self {
            cart,
            orders,
            gateway,
            settings,
            in_flight: AtomicBool::new(false),
            phase: watch::channel(CheckoutPhase::Idle).0,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CheckoutPhase {
        self.phase.borrow().clone()
    }

    /// Watch phase changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutPhase> {
        self.phase.subscribe()
    }

    /// Run a checkout attempt with a fresh idempotency key.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]. The phase moves to `Error` with the same
    /// customer-facing message.
    pub async fn submit(&self, form: &CheckoutForm) -> Result<CheckoutReceipt, CheckoutError> {
        self.submit_with_key(form, Uuid::new_v4()).await
    }

    /// Run a checkout attempt with a caller-supplied idempotency key.
    ///
    /// Reusing the key of an attempt that failed after the order was created
    /// picks that order up again instead of creating a second one.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`].
    #[instrument(skip(self, form), fields(idempotency_key = %idempotency_key))]
    pub async fn submit_with_key(
        &self,
        form: &CheckoutForm,
        idempotency_key: Uuid,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            warn!("Checkout submitted while another attempt is running");
            return Err(CheckoutError::AlreadyInProgress);
        };

        let result = self.run(form, idempotency_key).await;

        match &result {
            Ok(receipt) => {
                info!(order_id = %receipt.order.order_id, "Checkout complete");
                self.enter(CheckoutPhase::Done {
                    order_id: receipt.order.order_id.clone(),
                });
            }
            Err(e) => {
                match e {
                    CheckoutError::Transport(_)
                    | CheckoutError::MissingPaymentReference(_)
                    | CheckoutError::PaymentNotConfirmed { .. } => capture(e, "Checkout failed"),
                    _ => warn!(error = %e, "Checkout failed"),
                }
                self.enter(CheckoutPhase::Error {
                    message: e.user_message(),
                });
            }
        }

        result
    }

    async fn run(
        &self,
        form: &CheckoutForm,
        idempotency_key: Uuid,
    ) -> Result<CheckoutReceipt, CheckoutError> {
        self.enter(CheckoutPhase::Validating);
        form.validate()?;
        if self.settings.key_id.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "missing payment gateway key".to_string(),
            ));
        }

        self.enter(CheckoutPhase::SyncingCart);
        let snapshot = self
            .cart
            .sync_cart(form.customer_id.clone())
            .await?
            .ok_or_else(|| CheckoutError::Validation("Your cart is empty".to_string()))?;

        self.enter(CheckoutPhase::CreatingOrder);
        let created = self
            .orders
            .create_order(&OrderCreate {
                cart_id: snapshot.cart_id.clone(),
                customer_id: form.customer_id.clone().or(snapshot.customer_id),
                idempotency_key,
                is_test: Some(self.settings.test_mode),
            })
            .await?;

        let order = created.order;
        let provider_order_id = created
            .provider_order_id
            .ok_or_else(|| CheckoutError::MissingPaymentReference(order.order_id.clone()))?;
        let amount = order.amount().to_minor_units()?;

        self.enter(CheckoutPhase::AwaitingPayment {
            order_id: order.order_id.clone(),
        });
        let request = self.payment_request(form, &order, provider_order_id, amount);
        let payment = match self.gateway.open(request).await {
            PaymentOutcome::Completed(confirmation) => confirmation,
            PaymentOutcome::Failed(failure) => {
                return Err(CheckoutError::Payment {
                    message: failure.description,
                    order_id: order.order_id,
                });
            }
            PaymentOutcome::Dismissed => {
                return Err(CheckoutError::Payment {
                    message: "Payment was cancelled".to_string(),
                    order_id: order.order_id,
                });
            }
        };

        self.enter(CheckoutPhase::Confirming {
            order_id: order.order_id.clone(),
        });
        let confirmed = self
            .orders
            .get_order(&order.order_id)
            .await
            .map_err(|source| CheckoutError::PaymentNotConfirmed {
                order_id: order.order_id.clone(),
                payment_id: payment.payment_id.clone(),
                source,
            })?;

        self.cart.clear_cart().await;

        Ok(CheckoutReceipt {
            order: confirmed,
            payment,
        })
    }

    fn payment_request(
        &self,
        form: &CheckoutForm,
        order: &OrderDetail,
        provider_order_id: String,
        amount: i64,
    ) -> PaymentRequest {
        let mut notes = BTreeMap::new();
        notes.insert("address".to_string(), form.address.trim().to_string());
        notes.insert("order_id".to_string(), order.order_id.to_string());

        PaymentRequest {
            key: self.settings.key_id.clone(),
            amount,
            currency: order.currency.clone(),
            order_id: provider_order_id,
            name: self.settings.merchant_name.clone(),
            description: format!("Order {}", order.order_id),
            prefill: PaymentPrefill {
                name: form.name.clone().filter(|s| !s.trim().is_empty()),
                email: form.email.clone().filter(|s| !s.trim().is_empty()),
                contact: form.phone.trim().to_string(),
            },
            notes,
        }
    }

    fn enter(&self, phase: CheckoutPhase) {
        let order_id = match &phase {
            CheckoutPhase::AwaitingPayment { order_id }
            | CheckoutPhase::Confirming { order_id }
            | CheckoutPhase::Done { order_id } => Some(order_id.to_string()),
            _ => None,
        };
        match &order_id {
            Some(id) => add_breadcrumb(
                "checkout",
                phase.name(),
                Some(&[("order_id", id.as_str())]),
            ),
            None => add_breadcrumb("checkout", phase.name(), None),
        }
        self.phase.send_replace(phase);
    }

    /// Cancel an order that has not been paid.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<OrderDetail, ApiError> {
        self.orders.cancel_order(order_id).await
    }

    /// A customer's past orders.
    ///
    /// # Errors
    ///
    /// Returns the transport error.
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    pub async fn order_history(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<OrderSummary>, ApiError> {
        self.orders.list_orders(customer_id).await
    }
}
