//! Catalog conversions.

use crate::api::wire;
use crate::types::{Cake, CakeDetail, CakePage};

use super::non_empty;

impl From<wire::CakeSummary> for Cake {
    fn from(cake: wire::CakeSummary) -> Self {
        Self {
            id: cake.cake_id.into(),
            name: cake.name,
            slug: cake.slug,
            price: cake.price,
            currency: cake.currency,
            category: non_empty(cake.category),
            is_available: cake.is_available,
        }
    }
}

impl From<wire::CakeDetail> for CakeDetail {
    fn from(cake: wire::CakeDetail) -> Self {
        Self {
            cake: Cake::from(cake.summary),
            description: non_empty(cake.description),
            image_url: non_empty(cake.image_url),
            stock_quantity: cake.stock_quantity,
            created_at: cake.created_at,
            updated_at: cake.updated_at,
        }
    }
}

impl From<wire::PaginatedCakesResponse> for CakePage {
    fn from(page: wire::PaginatedCakesResponse) -> Self {
        Self {
            cakes: page.cakes.into_iter().map(Cake::from).collect(),
            total_count: page.total_count,
        }
    }
}
