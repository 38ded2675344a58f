//! Catalog browsing.

use bakehouse_core::CakeId;
use bakehouse_storefront::Storefront;
use bakehouse_storefront::api::{ApiError, CatalogApi};
use bakehouse_storefront::types::CakeFilters;

use super::money;

/// Print one page of the catalog.
pub async fn list(storefront: &Storefront, filters: &CakeFilters) -> Result<(), ApiError> {
    let page = storefront.api().list_cakes(filters).await?;

    if page.cakes.is_empty() {
        println!("No cakes found.");
        return Ok(());
    }

    for cake in &page.cakes {
        let availability = if cake.is_available { "" } else { "  (sold out)" };
        println!(
            "{:<24} {:<32} {:>14}{availability}",
            cake.id,
            cake.name,
            money(cake.price, &cake.currency)
        );
    }
    println!(
        "\nPage {} - {} of {} cakes",
        filters.page.max(1),
        page.cakes.len(),
        page.total_count
    );
    Ok(())
}

/// Print a single cake.
pub async fn show(storefront: &Storefront, id: &CakeId) -> Result<(), ApiError> {
    let detail = storefront.api().get_cake(id).await?;
    let cake = &detail.cake;

    println!("{} ({})", cake.name, cake.id);
    println!("  Price:    {}", cake.price().display());
    if let Some(category) = &cake.category {
        println!("  Category: {category}");
    }
    println!(
        "  Stock:    {}",
        if cake.is_available {
            detail.stock_quantity.to_string()
        } else {
            "sold out".to_string()
        }
    );
    if let Some(description) = &detail.description {
        println!("\n{description}");
    }
    Ok(())
}
