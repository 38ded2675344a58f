//! Payment gateway seam.
//!
//! The gateway's own widget (hosted checkout, mobile SDK, console prompt) sits
//! behind [`PaymentGateway`]. The orchestrator only sees the options it opens
//! the widget with and the outcome the widget reports.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Options the payment widget is opened with.
///
/// Field names follow the gateway's checkout options; `amount` is in minor
/// units of `currency`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Public gateway key
    pub key: String,
    pub amount: i64,
    pub currency: String,
    /// Gateway order reference returned by order creation
    pub order_id: String,
    /// Merchant name shown in the widget
    pub name: String,
    pub description: String,
    pub prefill: PaymentPrefill,
    /// Free-form metadata echoed back by the gateway
    pub notes: BTreeMap<String, String>,
}

/// Customer details pre-filled in the widget.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPrefill {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub contact: String,
}

/// References the gateway hands back after a successful payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub payment_id: String,
    pub provider_order_id: Option<String>,
    pub signature: Option<String>,
}

/// A payment the gateway rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub code: Option<String>,
    pub description: String,
}

/// How the payment widget closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Completed(PaymentConfirmation),
    Failed(PaymentFailure),
    /// Customer closed the widget without paying.
    Dismissed,
}

/// An external payment widget.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open the widget and wait until it closes.
    async fn open(&self, request: PaymentRequest) -> PaymentOutcome;
}
