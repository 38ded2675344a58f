//! Status enums for orders and payments.
//!
//! Values mirror the order service's lowercase vocabulary. Both enums carry an
//! `Unknown` catch-all so a status added server-side never breaks decoding.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Created,
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Expired,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Whether the order can still move forward.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::Cancelled | Self::Expired | Self::Refunded
        )
    }

    /// Whether the service may still accept a cancellation request.
    ///
    /// The service also enforces a time window, so `true` is only a hint.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Created | Self::Pending | Self::Confirmed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Refunded => "refunded",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            "refunded" => Ok(Self::Refunded),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

impl From<&str> for OrderStatus {
    /// Lenient parse: unrecognized values become [`OrderStatus::Unknown`].
    fn from(s: &str) -> Self {
        s.trim().to_ascii_lowercase().parse().unwrap_or(Self::Unknown)
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Paid,
    Failed,
    Cancelled,
    RefundRequested,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the gateway has secured the funds.
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Authorized | Self::Paid)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Authorized => "authorized",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RefundRequested => "refund_requested",
            Self::Refunded => "refunded",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl From<&str> for PaymentStatus {
    /// Lenient parse: unrecognized values become [`PaymentStatus::Unknown`].
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "authorized" => Self::Authorized,
            "paid" => Self::Paid,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            "refund_requested" => Self::RefundRequested,
            "refunded" => Self::Refunded,
            _ => Self::Unknown,
        }
    }
}
