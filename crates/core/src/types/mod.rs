//! Core types for Bakehouse.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod status;

pub use id::*;
pub use price::{Price, PriceError, minor_unit_exponent};
pub use status::*;
