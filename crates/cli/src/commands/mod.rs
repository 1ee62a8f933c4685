//! CLI subcommands.
//!
//! Each command drives the same [`ListingView`] a graphical front end would,
//! with notifications going to the log.

pub mod add;
pub mod delete;
pub mod watch;

use std::sync::Arc;

use thiserror::Error;

use tradepost_core::{UnknownCategory, UserId};
use tradepost_listings::geocoding::NominatimClient;
use tradepost_listings::media::{MediaError, StorageClient};
use tradepost_listings::notify::TracingNotifier;
use tradepost_listings::store::{RealtimeDatabase, StoreError};
use tradepost_listings::{AddProductError, ListingView, ListingsConfig, Services, TooManyImages};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Realtime database client could not be built.
    #[error("Database client error: {0}")]
    Store(#[from] StoreError),

    /// Image could not be read, or the storage client could not be built.
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    /// Geocoding client could not be built.
    #[error("Geocoder client error: {0}")]
    Geocoder(#[from] reqwest::Error),

    #[error("{0}. Valid categories: Toy, Electronics, Clothing")]
    Category(#[from] UnknownCategory),

    #[error(transparent)]
    TooManyImages(#[from] TooManyImages),

    #[error("Product not added: {0}")]
    AddProduct(#[from] AddProductError),

    /// Waiting for Ctrl+C failed.
    #[error("Signal error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Build a listing view for `user` against the configured backends.
///
/// # Errors
///
/// Returns error if any HTTP client fails to build.
pub fn connect(config: &ListingsConfig, user: &str) -> Result<ListingView, CommandError> {
    let database = Arc::new(RealtimeDatabase::new(&config.database, &config.user_agent)?);
    let storage = StorageClient::new(&config.storage, &config.user_agent)?;
    let geocoder = NominatimClient::new(config.geocoder_url.clone(), &config.user_agent)?;

    tracing::debug!(
        database = %config.database.url,
        bucket = %config.storage.bucket,
        "Backends configured"
    );

    Ok(ListingView::new(
        UserId::new(user),
        Services {
            products: database.clone(),
            bookmarks: database,
            media: Arc::new(storage),
            geocoder: Arc::new(geocoder),
            notifier: Arc::new(TracingNotifier),
        },
    ))
}
