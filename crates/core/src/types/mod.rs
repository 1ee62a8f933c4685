//! Core types for Tradepost.
//!
//! This module provides type-safe wrappers for marketplace listing concepts.

pub mod category;
pub mod coordinates;
pub mod id;
pub mod price;
pub mod product;

pub use category::{Category, UnknownCategory};
pub use coordinates::Coordinates;
pub use id::*;
pub use price::{Price, PriceError};
pub use product::{Product, ProductDraft};
