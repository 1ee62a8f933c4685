//! Tradepost Core - Shared listing types.
//!
//! This crate provides the types shared by every Tradepost component:
//! - `listings` - Listing view, repositories and external service clients
//! - `cli` - Command-line front end for the listing view
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, categories and the product record

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
