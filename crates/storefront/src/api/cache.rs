//! Cache types for catalog responses.

use bakehouse_core::CakeId;

use crate::types::{CakeDetail, CakeFilters, CakePage};

/// Cache key for catalog reads.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Cake(CakeId),
    Cakes(CakeFilters),
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Cake(Box<CakeDetail>),
    Cakes(CakePage),
}
