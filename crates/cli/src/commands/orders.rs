//! Order lookup, history and cancellation.

use bakehouse_core::{CustomerId, OrderId};
use bakehouse_storefront::Storefront;
use bakehouse_storefront::api::OrderApi;
use bakehouse_storefront::types::OrderDetail;

use super::money;
use crate::error::CliError;

fn print_order(order: &OrderDetail) {
    println!("Order {}", order.order_id);
    println!("  Status:  {} / {}", order.status, order.payment_status);
    println!("  Placed:  {}", order.created_at.format("%Y-%m-%d %H:%M UTC"));
    for line in &order.items {
        println!(
            "  {:<32} x{:<3} {:>14}",
            line.name.as_deref().unwrap_or(line.cake_id.as_str()),
            line.quantity,
            money(line.line_total, &order.currency)
        );
    }
    println!("  Total:   {}", money(order.order_total, &order.currency));
    if let Some(expires) = order.reservation_expires_at {
        println!("  Reserved until {}", expires.format("%Y-%m-%d %H:%M UTC"));
    }
    if order.is_test {
        println!("  (test order)");
    }
}

/// Print one order.
pub async fn show(storefront: &Storefront, id: &OrderId) -> Result<(), CliError> {
    let order = storefront.api().get_order(id).await?;
    print_order(&order);
    Ok(())
}

/// Print a customer's orders, newest first as the service returns them.
pub async fn list(storefront: &Storefront, customer: Option<CustomerId>) -> Result<(), CliError> {
    let customer = match customer {
        Some(customer) => customer,
        None => storefront.customer_id().await.ok_or_else(|| {
            CliError::InvalidInput("sign in or pass --customer to list orders".to_string())
        })?,
    };

    let orders = storefront.api().list_orders(&customer).await?;
    if orders.is_empty() {
        println!("No orders yet.");
        return Ok(());
    }

    for order in &orders {
        println!(
            "{:<28} {:<12} {:<10} {:>14}  {}",
            order.order_id,
            order.status,
            order.payment_status,
            money(order.order_total, &order.currency),
            order.created_at.format("%Y-%m-%d")
        );
    }
    Ok(())
}

/// Cancel an unpaid order.
pub async fn cancel(storefront: &Storefront, id: &OrderId) -> Result<(), CliError> {
    let order = storefront.api().cancel_order(id).await?;
    println!("Order {} is now {}.", order.order_id, order.status);
    Ok(())
}
