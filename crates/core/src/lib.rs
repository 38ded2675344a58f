//! Bakehouse Core - Shared types library.
//!
//! This crate provides common types used across all Bakehouse components:
//! - `storefront` - Client SDK for the bakery order service
//! - `cli` - The `bakehouse` command-line storefront
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients.
//! This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
