//! Bakehouse Storefront client library.
//!
//! Everything a customer-facing front end needs to talk to the Bakehouse
//! order service: browse the catalog, keep a cart that survives restarts and
//! reconciles with the remote cart, sign in through `OpenID` Connect, and run
//! a checkout that hands off to the payment gateway.
//!
//! # Architecture
//!
//! - [`api`] - HTTP client wrapper with an injected bearer token provider
//! - [`conversions`] - Wire (snake_case JSON) to view model mapping
//! - [`cart`] - Reducer-based cart store persisted through [`storage`]
//! - [`checkout`] - Checkout state machine and payment gateway seam
//! - [`session`] - Sign-in bridge over an [`session::IdentityProvider`]
//! - [`state`] - The [`Storefront`] facade wiring it all together

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod conversions;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
mod testing;

pub use state::Storefront;
