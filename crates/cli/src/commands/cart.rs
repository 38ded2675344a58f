//! Local cart editing and remote sync.

use bakehouse_core::CakeId;
use bakehouse_storefront::Storefront;
use bakehouse_storefront::api::{ApiError, CatalogApi};
use bakehouse_storefront::cart::CartState;
use bakehouse_storefront::types::CartItem;

use super::money;

fn print_cart(storefront: &Storefront, state: &CartState) {
    if state.is_empty() {
        println!("Your cart is empty.");
        return;
    }

    let currency = &storefront.config().display_currency;
    for item in &state.items {
        println!(
            "{:<24} {:<32} x{:<3} {:>14}",
            item.id,
            item.name,
            item.quantity,
            money(item.line_estimate(), currency)
        );
        if let Some(notes) = &item.notes {
            println!("    note: {notes}");
        }
        if !item.addons.is_empty() {
            println!("    extras: {}", item.addons.join(", "));
        }
    }

    match &state.totals {
        Some(totals) => {
            println!("\nSubtotal: {}", money(totals.subtotal, currency));
            println!("Taxes:    {}", money(totals.taxes, currency));
            println!("Shipping: {}", money(totals.shipping, currency));
            println!("Total:    {}", money(totals.total, currency));
        }
        None => println!(
            "\nEstimated subtotal: {} (run `cart sync` for taxes and shipping)",
            money(state.estimated_subtotal(), currency)
        ),
    }
    if let Some(cart_id) = &state.cart_id {
        println!("Cart: {cart_id}");
    }
}

/// Print the cart.
pub async fn show(storefront: &Storefront) {
    let state = storefront.cart().snapshot().await;
    print_cart(storefront, &state);
}

/// Add `quantity` units of a catalog cake.
pub async fn add(
    storefront: &Storefront,
    id: &CakeId,
    quantity: u32,
    notes: Option<String>,
    addons: Vec<String>,
) -> Result<(), ApiError> {
    let detail = storefront.api().get_cake(id).await?;
    let item = CartItem {
        notes,
        addons,
        ..CartItem::from_cake(&detail, quantity)
    };

    let state = storefront.cart().add_item(item).await;
    print_cart(storefront, &state);
    Ok(())
}

/// Remove a cake.
pub async fn remove(storefront: &Storefront, id: &CakeId) {
    let state = storefront.cart().remove_item(id).await;
    print_cart(storefront, &state);
}

/// Set a cake's quantity.
pub async fn set(storefront: &Storefront, id: &CakeId, quantity: i64) {
    let state = storefront.cart().update_quantity(id, quantity).await;
    print_cart(storefront, &state);
}

/// Reconcile with the remote cart.
pub async fn sync(storefront: &Storefront) -> Result<(), ApiError> {
    let customer_id = storefront.customer_id().await;
    if storefront.cart().sync_cart(customer_id).await?.is_none() {
        println!("Nothing to sync.");
    }
    print_cart(storefront, &storefront.cart().snapshot().await);
    Ok(())
}

/// Empty the cart, optionally deleting the remote one too.
pub async fn clear(storefront: &Storefront, remote: bool) -> Result<(), ApiError> {
    if remote {
        storefront.cart().discard_remote().await?;
    } else {
        storefront.cart().clear_cart().await;
    }
    println!("Cart cleared.");
    Ok(())
}
