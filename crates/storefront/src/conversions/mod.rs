//! Mapping between the service's wire types and the client's view models.
//!
//! Every conversion here is total: a missing or null wire field becomes
//! `None` (or the type's default), never an error. Unknown status strings
//! map to the `Unknown` variants.

pub mod cart;
pub mod catalog;
pub mod orders;

pub use cart::cart_upsert;

/// Treat blank strings the same as absent ones.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
