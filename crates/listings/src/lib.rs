//! Tradepost listings.
//!
//! The listing-and-bookmark view for a signed-in marketplace user, plus the
//! clients it talks to:
//!
//! - [`store`] - product and bookmark repositories over a realtime database
//! - [`media`] - product image uploads to blob storage
//! - [`geocoding`] - address to coordinates lookup
//! - [`view`] - the [`ListingView`] that ties them together
//! - [`notify`] - user-facing notifications raised by the view

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod geocoding;
pub mod media;
pub mod notify;
pub mod store;
pub mod view;

pub use config::ListingsConfig;
pub use error::{AddProductError, FormRejection, TooManyImages};
pub use view::{ListingSnapshot, ListingView, Services};
