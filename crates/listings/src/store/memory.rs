//! In-process realtime store.
//!
//! Keeps products and bookmarks in `watch` channels so every subscriber sees
//! the latest full snapshot, matching the hosted store's emission semantics.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{oneshot, watch};

use tradepost_core::{Product, ProductDraft, ProductId, UserId};

use super::{
    BookmarkRepository, ProductFilter, ProductRepository, PushIdGenerator, StoreError, Subscription,
};

type BookmarkIndex = BTreeMap<UserId, BTreeSet<ProductId>>;

/// A realtime store held entirely in memory.
///
/// Cloning shares the same underlying data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

struct MemoryStoreInner {
    /// Products in insertion order.
    products: watch::Sender<Vec<Product>>,
    bookmarks: watch::Sender<BookmarkIndex>,
    push_ids: PushIdGenerator,
    active_subscriptions: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        let (products, _) = watch::channel(Vec::new());
        let (bookmarks, _) = watch::channel(BTreeMap::new());
        Self {
            inner: Arc::new(MemoryStoreInner {
                products,
                bookmarks,
                push_ids: PushIdGenerator::new(),
                active_subscriptions: AtomicUsize::new(0),
            }),
        }
    }

    /// Insert a full product record as-is.
    pub fn insert_product(&self, product: Product) {
        self.inner.products.send_modify(|products| {
            products.retain(|p| p.product_id != product.product_id);
            products.push(product);
        });
    }

    /// Current product records, in insertion order.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.inner.products.borrow().clone()
    }

    /// Bookmark a product for a user.
    pub fn add_bookmark(&self, user: &UserId, product_id: ProductId) {
        self.inner.bookmarks.send_modify(|index| {
            index.entry(user.clone()).or_default().insert(product_id);
        });
    }

    /// Remove a bookmark.
    pub fn remove_bookmark(&self, user: &UserId, product_id: &ProductId) {
        self.inner.bookmarks.send_modify(|index| {
            if let Some(ids) = index.get_mut(user) {
                ids.remove(product_id);
                if ids.is_empty() {
                    index.remove(user);
                }
            }
        });
    }

    /// Number of subscriptions opened and not yet cancelled.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.inner.active_subscriptions.load(Ordering::SeqCst)
    }

    /// Stream `project(snapshot)` on open and after every change, until cancelled.
    fn watch_subscription<S, T, F>(&self, source: &watch::Sender<S>, project: F) -> Subscription<T>
    where
        S: Send + Sync + 'static,
        T: Send + 'static,
        F: Fn(&S) -> T + Send + 'static,
    {
        let mut receiver = source.subscribe();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let updates = async_stream::stream! {
            loop {
                let snapshot = project(&*receiver.borrow_and_update());
                yield snapshot;
                tokio::select! {
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = &mut cancel_rx => break,
                }
            }
        };

        self.inner.active_subscriptions.fetch_add(1, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        Subscription::new(updates, move || {
            let _ = cancel_tx.send(());
            inner.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
        })
    }
}

#[async_trait]
impl ProductRepository for MemoryStore {
    async fn create(&self, draft: ProductDraft) -> Result<ProductId, StoreError> {
        let product_id = self.inner.push_ids.next_id();
        self.insert_product(draft.into_product(product_id.clone()));
        tracing::debug!(product_id = %product_id, "Product stored in memory");
        Ok(product_id)
    }

    async fn delete(&self, product_id: &ProductId) -> Result<(), StoreError> {
        self.inner.products.send_if_modified(|products| {
            let before = products.len();
            products.retain(|p| &p.product_id != product_id);
            products.len() != before
        });
        Ok(())
    }

    fn subscribe(&self, filter: ProductFilter) -> Subscription<Vec<Product>> {
        self.watch_subscription(&self.inner.products, move |products: &Vec<Product>| {
            products
                .iter()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect()
        })
    }
}

impl BookmarkRepository for MemoryStore {
    fn subscribe(&self, user: &UserId) -> Subscription<BTreeSet<ProductId>> {
        let user = user.clone();
        self.watch_subscription(&self.inner.bookmarks, move |index: &BookmarkIndex| {
            index.get(&user).cloned().unwrap_or_default()
        })
    }
}
