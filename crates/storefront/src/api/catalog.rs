//! Catalog endpoints. Public, cached for 5 minutes.

use async_trait::async_trait;
use bakehouse_core::CakeId;
use tracing::{debug, instrument};

use super::cache::{CacheKey, CacheValue};
use super::wire::{CakeDetailResponse, PaginatedCakesResponse};
use super::{ApiClient, ApiError, RequestOptions};
use crate::types::{CakeDetail, CakeFilters, CakePage};

/// Largest page the service accepts.
const MAX_PAGE_SIZE: u32 = 100;

/// Read access to the cake catalog.
#[async_trait]
pub trait CatalogApi: Send + Sync {
    /// List cakes matching `filters`.
    async fn list_cakes(&self, filters: &CakeFilters) -> Result<CakePage, ApiError>;

    /// Fetch a single cake.
    async fn get_cake(&self, id: &CakeId) -> Result<CakeDetail, ApiError>;
}

fn filter_query(filters: &CakeFilters) -> RequestOptions {
    let mut options = RequestOptions::public()
        .query("page", filters.page.max(1))
        .query("page_size", filters.page_size.clamp(1, MAX_PAGE_SIZE));

    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        options = options.query("search", search);
    }
    if let Some(category) = &filters.category {
        options = options.query("category", category);
    }
    if let Some(min) = filters.min_price {
        options = options.query("min_price", min);
    }
    if let Some(max) = filters.max_price {
        options = options.query("max_price", max);
    }
    options
}

#[async_trait]
impl CatalogApi for ApiClient {
    #[instrument(skip(self, filters), fields(page = filters.page))]
    async fn list_cakes(&self, filters: &CakeFilters) -> Result<CakePage, ApiError> {
        let cache_key = CacheKey::Cakes(filters.clone());

        // Check cache
        if let Some(CacheValue::Cakes(page)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for cake listing");
            return Ok(page);
        }

        let response: PaginatedCakesResponse = self.get("/cakes", filter_query(filters)).await?;
        let page = CakePage::from(response);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Cakes(page.clone()))
            .await;

        Ok(page)
    }

    #[instrument(skip(self), fields(cake_id = %id))]
    async fn get_cake(&self, id: &CakeId) -> Result<CakeDetail, ApiError> {
        let cache_key = CacheKey::Cake(id.clone());

        if let Some(CacheValue::Cake(cake)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for cake");
            return Ok(*cake);
        }

        let path = format!("/cakes/{}", urlencoding::encode(id.as_str()));
        let response: CakeDetailResponse = self.get(&path, RequestOptions::public()).await?;
        let cake = CakeDetail::from(response.cake);

        self.inner
            .cache
            .insert(cache_key, CacheValue::Cake(Box::new(cake.clone())))
            .await;

        Ok(cake)
    }
}
