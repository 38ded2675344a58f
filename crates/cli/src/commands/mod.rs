//! Command implementations.
//!
//! Each module prints its results to stdout; progress and failures go
//! through `tracing` on stderr.

pub mod account;
pub mod cakes;
pub mod cart;
pub mod checkout;
pub mod orders;

use bakehouse_core::Price;

/// Format an amount in the given currency.
pub(crate) fn money(amount: rust_decimal::Decimal, currency: &str) -> String {
    Price::new(amount, currency).display()
}
