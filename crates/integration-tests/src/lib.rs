//! Integration tests for Tradepost.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p tradepost-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `listing_view` - form submission, image selection and deletion flows
//! - `subscriptions` - live snapshots, bookmark derivation and teardown
//!
//! Everything runs in-process: the repositories are a [`MemoryStore`]
//! wrapped in a [`RecordingStore`], and the remaining collaborators are the
//! recording fakes below.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use tradepost_core::{Coordinates, Product, ProductDraft, ProductId, UserId};
use tradepost_listings::geocoding::GeocodingClient;
use tradepost_listings::media::{ImageFile, MediaError, MediaUploader};
use tradepost_listings::notify::{Notification, Notifier};
use tradepost_listings::store::{
    BookmarkRepository, MemoryStore, ProductFilter, ProductRepository, StoreError, Subscription,
};
use tradepost_listings::{ListingSnapshot, ListingView, Services};

/// How long a test waits for a live snapshot before failing.
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Notifier
// =============================================================================

/// Notifier that remembers every notification in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }
}

// =============================================================================
// Geocoder
// =============================================================================

/// Geocoder returning a fixed answer and recording the addresses asked for.
#[derive(Debug)]
pub struct StubGeocoder {
    answer: Option<Coordinates>,
    lookups: Mutex<Vec<String>>,
}

impl StubGeocoder {
    #[must_use]
    pub fn resolving_to(answer: Option<Coordinates>) -> Self {
        Self {
            answer,
            lookups: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl GeocodingClient for StubGeocoder {
    async fn resolve(&self, address: &str) -> Option<Coordinates> {
        self.lookups.lock().push(address.to_owned());
        self.answer
    }
}

// =============================================================================
// Uploader
// =============================================================================

/// Uploader that records file names and can be told to fail on one of them.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    uploads: Mutex<Vec<String>>,
    fail_on: Mutex<Option<String>>,
}

impl RecordingUploader {
    /// Make the upload of `name` fail.
    pub fn fail_on(&self, name: &str) {
        *self.fail_on.lock() = Some(name.to_owned());
    }

    /// Names of files whose upload was attempted, in order.
    #[must_use]
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }

    /// URL this uploader hands out for a file.
    #[must_use]
    pub fn url_for(name: &str) -> String {
        format!("https://cdn.test/products/{name}")
    }
}

#[async_trait]
impl MediaUploader for RecordingUploader {
    async fn upload(&self, file: &ImageFile) -> Result<String, MediaError> {
        self.uploads.lock().push(file.name.clone());
        if self.fail_on.lock().as_deref() == Some(file.name.as_str()) {
            return Err(MediaError::Api {
                status: 503,
                message: "storage unavailable".to_owned(),
            });
        }
        Ok(Self::url_for(&file.name))
    }
}

// =============================================================================
// Repositories
// =============================================================================

/// The three subscriptions a listing view opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    Owner,
    All,
    Bookmarks,
}

/// Teardown counts per subscription kind.
#[derive(Debug, Default)]
pub struct UnsubscribeCounts {
    owner: AtomicUsize,
    all: AtomicUsize,
    bookmarks: AtomicUsize,
}

impl UnsubscribeCounts {
    const fn counter(&self, kind: SubscriptionKind) -> &AtomicUsize {
        match kind {
            SubscriptionKind::Owner => &self.owner,
            SubscriptionKind::All => &self.all,
            SubscriptionKind::Bookmarks => &self.bookmarks,
        }
    }

    /// `(owner, all, bookmarks)`.
    #[must_use]
    pub fn snapshot(&self) -> (usize, usize, usize) {
        (
            self.owner.load(Ordering::SeqCst),
            self.all.load(Ordering::SeqCst),
            self.bookmarks.load(Ordering::SeqCst),
        )
    }
}

/// A [`MemoryStore`] that records every call made through the repository traits.
#[derive(Default)]
pub struct RecordingStore {
    store: MemoryStore,
    creates: Mutex<Vec<ProductDraft>>,
    deletes: Mutex<Vec<ProductId>>,
    fail_writes: AtomicBool,
    stall_deletes: AtomicBool,
    unsubscribes: Arc<UnsubscribeCounts>,
}

impl RecordingStore {
    /// The backing store, for seeding data directly.
    #[must_use]
    pub const fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Make every create and delete fail.
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make every delete hang forever, as a store that never answers would.
    pub fn stall_deletes(&self) {
        self.stall_deletes.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn creates(&self) -> Vec<ProductDraft> {
        self.creates.lock().clone()
    }

    #[must_use]
    pub fn deletes(&self) -> Vec<ProductId> {
        self.deletes.lock().clone()
    }

    #[must_use]
    pub fn unsubscribes(&self) -> (usize, usize, usize) {
        self.unsubscribes.snapshot()
    }

    fn write_result(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Api {
                status: 401,
                message: "Permission denied".to_owned(),
            });
        }
        Ok(())
    }
}

/// Wrap a subscription so its teardown is counted under `kind`.
fn counted<T: 'static>(
    subscription: Subscription<T>,
    counts: &Arc<UnsubscribeCounts>,
    kind: SubscriptionKind,
) -> Subscription<T> {
    let (updates, unsubscribe) = subscription.into_parts();
    let counts = Arc::clone(counts);
    Subscription::new(updates, move || {
        counts.counter(kind).fetch_add(1, Ordering::SeqCst);
        unsubscribe.unsubscribe();
    })
}

#[async_trait]
impl ProductRepository for RecordingStore {
    async fn create(&self, draft: ProductDraft) -> Result<ProductId, StoreError> {
        self.creates.lock().push(draft.clone());
        self.write_result()?;
        ProductRepository::create(&self.store, draft).await
    }

    async fn delete(&self, product_id: &ProductId) -> Result<(), StoreError> {
        self.deletes.lock().push(product_id.clone());
        if self.stall_deletes.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.write_result()?;
        ProductRepository::delete(&self.store, product_id).await
    }

    fn subscribe(&self, filter: ProductFilter) -> Subscription<Vec<Product>> {
        let kind = match filter {
            ProductFilter::All => SubscriptionKind::All,
            ProductFilter::Owner(_) => SubscriptionKind::Owner,
        };
        counted(
            ProductRepository::subscribe(&self.store, filter),
            &self.unsubscribes,
            kind,
        )
    }
}

impl BookmarkRepository for RecordingStore {
    fn subscribe(&self, user: &UserId) -> Subscription<BTreeSet<ProductId>> {
        counted(
            BookmarkRepository::subscribe(&self.store, user),
            &self.unsubscribes,
            SubscriptionKind::Bookmarks,
        )
    }
}

// =============================================================================
// Test Context
// =============================================================================

/// A listing view wired to recording fakes.
pub struct TestContext {
    pub view: ListingView,
    pub store: Arc<RecordingStore>,
    pub uploader: Arc<RecordingUploader>,
    pub geocoder: Arc<StubGeocoder>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    /// Build a view for `user` whose geocoder always answers `coordinates`.
    #[must_use]
    pub fn new(user: &str, coordinates: Option<Coordinates>) -> Self {
        let store = Arc::new(RecordingStore::default());
        let uploader = Arc::new(RecordingUploader::default());
        let geocoder = Arc::new(StubGeocoder::resolving_to(coordinates));
        let notifier = Arc::new(RecordingNotifier::default());

        let view = ListingView::new(
            UserId::new(user),
            Services {
                products: store.clone(),
                bookmarks: store.clone(),
                media: uploader.clone(),
                geocoder: geocoder.clone(),
                notifier: notifier.clone(),
            },
        );

        Self {
            view,
            store,
            uploader,
            geocoder,
            notifier,
        }
    }

    /// Wait until the view publishes a snapshot matching `predicate`.
    ///
    /// # Panics
    ///
    /// Panics if no such snapshot arrives within [`SNAPSHOT_TIMEOUT`].
    pub async fn wait_for<F>(&self, predicate: F) -> ListingSnapshot
    where
        F: Fn(&ListingSnapshot) -> bool,
    {
        let mut receiver = self.view.watch();
        let waited = tokio::time::timeout(SNAPSHOT_TIMEOUT, receiver.wait_for(|s| predicate(s))).await;
        let snapshot = match waited {
            Ok(Ok(snapshot)) => snapshot.clone(),
            Ok(Err(_)) => panic!("snapshot channel closed"),
            Err(_) => panic!("timed out waiting for snapshot: {:?}", self.view.snapshot()),
        };
        snapshot
    }
}

/// An in-memory image with the given file name.
#[must_use]
pub fn image(name: &str) -> ImageFile {
    ImageFile::new(name, "image/png", name.as_bytes().to_vec())
}
