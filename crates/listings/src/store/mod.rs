//! Product and bookmark repositories backed by a realtime store.
//!
//! # Layout
//!
//! ```text
//! Products/{productId}                 - flat product collection, `userId` field for filtering
//! Users/{uid}/Bookmarks/{productId}    - one child per bookmarked product
//! ```
//!
//! # Live subscriptions
//!
//! Reads are standing queries: a [`Subscription`] yields the full matching
//! snapshot on open and again after every change, until it is cancelled.
//! Each subscription carries an [`Unsubscribe`] handle that runs its
//! teardown at most once, either explicitly or when dropped.
//!
//! # Implementations
//!
//! - [`RealtimeDatabase`] - REST + event-stream client for a hosted realtime database
//! - [`MemoryStore`] - in-process store for tests and offline runs

mod event_stream;
mod memory;
mod push_id;
mod realtime;

pub use memory::MemoryStore;
pub use push_id::PushIdGenerator;
pub use realtime::RealtimeDatabase;

use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::Stream;
use futures::stream::BoxStream;
use thiserror::Error;

use tradepost_core::{Product, ProductDraft, ProductId, UserId};

/// Errors that can occur when talking to the realtime store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Store returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Store closed a live stream (`cancel` or `auth_revoked`).
    #[error("Stream closed by store: {0}")]
    StreamClosed(String),
}

/// Which products a subscription observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductFilter {
    /// Every product in the store.
    All,
    /// Only products listed by this user.
    Owner(UserId),
}

impl ProductFilter {
    /// Whether a product passes this filter.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        match self {
            Self::All => true,
            Self::Owner(user) => &product.user_id == user,
        }
    }
}

/// Persistence for product listings.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Allocate an id and write the full record (the id included).
    async fn create(&self, draft: ProductDraft) -> Result<ProductId, StoreError>;

    /// Remove a product. Removing an id that does not exist succeeds.
    async fn delete(&self, product_id: &ProductId) -> Result<(), StoreError>;

    /// Live view of the products matching `filter`, in insertion order.
    fn subscribe(&self, filter: ProductFilter) -> Subscription<Vec<Product>>;
}

/// Read access to a user's bookmarks.
pub trait BookmarkRepository: Send + Sync {
    /// Live view of the ids `user` has bookmarked.
    fn subscribe(&self, user: &UserId) -> Subscription<BTreeSet<ProductId>>;
}

/// A live subscription: a stream of full snapshots plus its teardown.
pub struct Subscription<T> {
    updates: BoxStream<'static, T>,
    unsubscribe: Unsubscribe,
}

impl<T> Subscription<T> {
    /// Pair a snapshot stream with the closure that cancels it.
    pub fn new<S, F>(updates: S, cancel: F) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            updates: Box::pin(updates),
            unsubscribe: Unsubscribe::new(cancel),
        }
    }

    /// Split into the snapshot stream and the teardown handle.
    #[must_use]
    pub fn into_parts(self) -> (BoxStream<'static, T>, Unsubscribe) {
        (self.updates, self.unsubscribe)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("unsubscribe", &self.unsubscribe)
            .finish_non_exhaustive()
    }
}

/// One-shot teardown for a [`Subscription`].
///
/// The cancel closure runs exactly once: on [`Unsubscribe::unsubscribe`], or
/// on drop if that was never called.
pub struct Unsubscribe(Option<Box<dyn FnOnce() + Send>>);

impl Unsubscribe {
    fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Some(Box::new(cancel)))
    }

    /// Cancel the subscription.
    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.0.take() {
            cancel();
        }
    }
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Unsubscribe")
            .field(&if self.0.is_some() { "live" } else { "cancelled" })
            .finish()
    }
}
