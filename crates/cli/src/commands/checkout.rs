//! Pay for the cart.

use std::sync::Arc;

use bakehouse_storefront::Storefront;
use bakehouse_storefront::checkout::CheckoutForm;
use tracing::info;
use uuid::Uuid;

use super::money;
use crate::error::CliError;
use crate::gateway::ConsolePaymentGateway;

/// Run a checkout against the console payment prompt.
pub async fn run(
    storefront: &Storefront,
    form: CheckoutForm,
    idempotency_key: Option<Uuid>,
) -> Result<(), CliError> {
    let checkout = storefront.checkout(Arc::new(ConsolePaymentGateway::new()))?;

    // Mirror phase changes into the log.
    let mut phases = checkout.subscribe();
    let watcher = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = phases.borrow_and_update().clone();
            info!(phase = %phase, "Checkout");
        }
    });

    let key = idempotency_key.unwrap_or_else(Uuid::new_v4);
    println!("Checkout reference: {key}");
    let result = checkout.submit_with_key(&form, key).await;
    watcher.abort();

    let receipt = result?;
    let order = &receipt.order;
    println!("\nOrder {} confirmed.", order.order_id);
    println!("  Status:  {} / {}", order.status, order.payment_status);
    println!("  Total:   {}", money(order.order_total, &order.currency));
    println!("  Payment: {}", receipt.payment.payment_id);
    Ok(())
}
