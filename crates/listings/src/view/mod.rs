//! The listing-and-bookmark view.
//!
//! [`ListingView`] is the composition root for one signed-in user. It keeps
//! three live subscriptions open while started:
//!
//! - the user's own products (`my_products`)
//! - every product (`all_products`)
//! - the user's bookmark ids
//!
//! and derives `bookmarked_products` from the last two whenever either
//! emits. The latest [`ListingSnapshot`] is published on a `watch` channel.
//!
//! It also owns the add-product form. Submitting runs validation, geocoding,
//! image uploads and the store write strictly in that order; any failure
//! abandons the attempt with nothing persisted by the view.

mod derive;
mod form;

pub use derive::derive_bookmarked;
pub use form::{CategoryChoice, FormField, ProductForm, ValidForm};

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use tradepost_core::{Product, ProductId, UnknownCategory, UserId};

use crate::error::{AddProductError, FormRejection, TooManyImages};
use crate::geocoding::GeocodingClient;
use crate::media::{ImageFile, MediaUploader};
use crate::notify::{Notification, Notifier};
use crate::store::{BookmarkRepository, ProductFilter, ProductRepository, Unsubscribe};

/// Everything the view renders from the live subscriptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingSnapshot {
    /// Products listed by the signed-in user.
    pub my_products: Vec<Product>,
    pub all_products: Vec<Product>,
    pub bookmark_ids: BTreeSet<ProductId>,
    /// `all_products` restricted to `bookmark_ids`.
    pub bookmarked_products: Vec<Product>,
}

/// Collaborators injected into a [`ListingView`].
#[derive(Clone)]
pub struct Services {
    pub products: Arc<dyn ProductRepository>,
    pub bookmarks: Arc<dyn BookmarkRepository>,
    pub media: Arc<dyn MediaUploader>,
    pub geocoder: Arc<dyn GeocodingClient>,
    pub notifier: Arc<dyn Notifier>,
}

/// Listing view for one signed-in user.
///
/// Cheaply cloneable; clones share state. Dropping the last clone of a
/// started view stops it.
#[derive(Clone)]
pub struct ListingView {
    inner: Arc<ViewInner>,
}

struct ViewInner {
    user: UserId,
    services: Services,
    state: Mutex<FormState>,
    snapshot: Arc<watch::Sender<ListingSnapshot>>,
    live: Mutex<Option<LiveSubscriptions>>,
}

#[derive(Debug, Default)]
struct FormState {
    show_add_product: bool,
    form: ProductForm,
    images: Vec<ImageFile>,
}

/// Tasks draining the subscriptions, and the handles that cancel them.
struct LiveSubscriptions {
    tasks: Vec<JoinHandle<()>>,
    disposers: Vec<Unsubscribe>,
}

impl LiveSubscriptions {
    fn release(self) {
        for disposer in self.disposers {
            disposer.unsubscribe();
        }
        for task in self.tasks {
            task.abort();
        }
    }
}

impl Drop for ViewInner {
    fn drop(&mut self) {
        if let Some(live) = self.live.get_mut().take() {
            tracing::debug!(user = %self.user, "Listing view dropped while started");
            live.release();
        }
    }
}

impl ListingView {
    #[must_use]
    pub fn new(user: UserId, services: Services) -> Self {
        let (snapshot, _) = watch::channel(ListingSnapshot::default());
        Self {
            inner: Arc::new(ViewInner {
                user,
                services,
                state: Mutex::new(FormState::default()),
                snapshot: Arc::new(snapshot),
                live: Mutex::new(None),
            }),
        }
    }

    /// The signed-in user.
    #[must_use]
    pub fn user(&self) -> &UserId {
        &self.inner.user
    }

    /// Open the three live subscriptions.
    ///
    /// Must be called from within a tokio runtime. Calling it on a started
    /// view does nothing.
    pub fn start(&self) {
        let mut live = self.inner.live.lock();
        if live.is_some() {
            tracing::debug!(user = %self.inner.user, "Listing view already started");
            return;
        }

        let services = &self.inner.services;
        let (mine, mine_disposer) = services
            .products
            .subscribe(ProductFilter::Owner(self.inner.user.clone()))
            .into_parts();
        let (all, all_disposer) = services.products.subscribe(ProductFilter::All).into_parts();
        let (bookmarks, bookmarks_disposer) =
            services.bookmarks.subscribe(&self.inner.user).into_parts();

        let tasks = vec![
            self.drain(mine, |snapshot, products| snapshot.my_products = products),
            self.drain(all, |snapshot, products| {
                snapshot.bookmarked_products =
                    derive_bookmarked(&products, &snapshot.bookmark_ids);
                snapshot.all_products = products;
            }),
            self.drain(bookmarks, |snapshot, ids| {
                snapshot.bookmarked_products = derive_bookmarked(&snapshot.all_products, &ids);
                snapshot.bookmark_ids = ids;
            }),
        ];

        *live = Some(LiveSubscriptions {
            tasks,
            disposers: vec![mine_disposer, all_disposer, bookmarks_disposer],
        });
        tracing::info!(user = %self.inner.user, "Listing view started");
    }

    /// Apply every emission of `updates` to the published snapshot.
    fn drain<T, F>(&self, mut updates: BoxStream<'static, T>, apply: F) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: Fn(&mut ListingSnapshot, T) + Send + 'static,
    {
        let snapshot = Arc::clone(&self.inner.snapshot);
        tokio::spawn(async move {
            while let Some(update) = updates.next().await {
                snapshot.send_modify(|current| apply(current, update));
            }
        })
    }

    /// Release the live subscriptions, each exactly once.
    ///
    /// Calling it on a stopped view does nothing. The last published
    /// snapshot stays readable.
    pub fn stop(&self) {
        let live = self.inner.live.lock().take();
        if let Some(live) = live {
            live.release();
            tracing::info!(user = %self.inner.user, "Listing view stopped");
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.live.lock().is_some()
    }

    /// Latest snapshot of the live data.
    #[must_use]
    pub fn snapshot(&self) -> ListingSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ListingSnapshot> {
        self.inner.snapshot.subscribe()
    }

    /// Whether the add-product panel is open.
    #[must_use]
    pub fn show_add_product(&self) -> bool {
        self.inner.state.lock().show_add_product
    }

    /// Open or close the add-product panel.
    pub fn toggle_add_product(&self) {
        let mut state = self.inner.state.lock();
        state.show_add_product = !state.show_add_product;
    }

    /// Current form values.
    #[must_use]
    pub fn form(&self) -> ProductForm {
        self.inner.state.lock().form.clone()
    }

    /// Images selected for the next submission.
    #[must_use]
    pub fn images(&self) -> Vec<ImageFile> {
        self.inner.state.lock().images.clone()
    }

    /// Edit one form field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCategory` for a category value outside the picker's options.
    pub fn set_field(&self, field: FormField, value: &str) -> Result<(), UnknownCategory> {
        self.inner.state.lock().form.set(field, value)
    }

    /// Replace the image selection.
    ///
    /// # Errors
    ///
    /// Returns `TooManyImages` after raising an alert if more than
    /// [`Product::MAX_IMAGES`] files are given. The previous selection is kept.
    pub fn select_images(&self, files: Vec<ImageFile>) -> Result<(), TooManyImages> {
        if files.len() > Product::MAX_IMAGES {
            self.inner.services.notifier.notify(Notification::TooManyImages);
            return Err(TooManyImages {
                selected: files.len(),
                max: Product::MAX_IMAGES,
            });
        }
        self.inner.state.lock().images = files;
        Ok(())
    }

    /// Submit the form.
    ///
    /// On success the form and image selection are reset and the new id is
    /// returned. The panel stays as it was.
    ///
    /// # Errors
    ///
    /// Returns why the attempt was abandoned. Only an unselected category
    /// is shown to the user; the rest are logged.
    #[instrument(skip(self), fields(user = %self.inner.user))]
    pub async fn add_product(&self) -> Result<ProductId, AddProductError> {
        let services = &self.inner.services;

        let validated = {
            let state = self.inner.state.lock();
            state
                .form
                .validate()
                .map(|valid| (valid, state.images.clone()))
        };
        let (valid, images) = match validated {
            Ok(submission) => submission,
            Err(rejection) => {
                if rejection == FormRejection::CategoryNotSelected {
                    services.notifier.notify(Notification::CategoryNotSelected);
                }
                tracing::debug!(reason = %rejection, "Form not submitted");
                return Err(rejection.into());
            }
        };

        let Some(coordinates) = services.geocoder.resolve(&valid.location).await else {
            tracing::error!(location = %valid.location, "Error geocoding address");
            return Err(AddProductError::GeocodingFailed(valid.location));
        };

        let mut image_urls = Vec::with_capacity(images.len());
        for file in &images {
            match services.media.upload(file).await {
                Ok(url) => image_urls.push(url),
                Err(e) => {
                    tracing::error!(file = %file.name, error = %e, "Error uploading image");
                    return Err(AddProductError::Upload {
                        file: file.name.clone(),
                        source: e,
                    });
                }
            }
        }

        let draft = valid.into_draft(image_urls, coordinates, self.inner.user.clone());
        let product_id = match services.products.create(draft).await {
            Ok(product_id) => product_id,
            Err(e) => {
                tracing::error!(error = %e, "Error adding product");
                return Err(AddProductError::Persist(e));
            }
        };

        {
            let mut state = self.inner.state.lock();
            state.form = ProductForm::default();
            state.images.clear();
        }
        services.notifier.notify(Notification::Added);
        tracing::info!(product_id = %product_id, images = images.len(), "Product added");
        Ok(product_id)
    }

    /// Delete a product.
    ///
    /// The user is told "Deleted" as soon as the delete is issued, before
    /// the store answers; the outcome is only logged.
    #[instrument(skip(self), fields(user = %self.inner.user))]
    pub async fn delete_product(&self, product_id: &ProductId) {
        let services = &self.inner.services;
        services.notifier.notify(Notification::Deleted);
        match services.products.delete(product_id).await {
            Ok(()) => tracing::info!(product_id = %product_id, "Product deleted"),
            Err(e) => tracing::error!(product_id = %product_id, error = %e, "Error deleting product"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tradepost_core::{Category, Coordinates, Price, ProductDraft};

    use super::*;
    use crate::media::MemoryMediaStore;
    use crate::store::MemoryStore;

    struct FixedGeocoder(Option<Coordinates>);

    #[async_trait]
    impl GeocodingClient for FixedGeocoder {
        async fn resolve(&self, _address: &str) -> Option<Coordinates> {
            self.0
        }
    }

    #[derive(Default)]
    struct Recorded(Mutex<Vec<Notification>>);

    impl Notifier for Recorded {
        fn notify(&self, notification: Notification) {
            self.0.lock().push(notification);
        }
    }

    struct Harness {
        view: ListingView,
        store: MemoryStore,
        media: MemoryMediaStore,
        notifications: Arc<Recorded>,
    }

    fn harness(user: &str, coordinates: Option<Coordinates>) -> Harness {
        let store = MemoryStore::new();
        let media = MemoryMediaStore::new();
        let notifications = Arc::new(Recorded::default());
        let view = ListingView::new(
            UserId::new(user),
            Services {
                products: Arc::new(store.clone()),
                bookmarks: Arc::new(store.clone()),
                media: Arc::new(media.clone()),
                geocoder: Arc::new(FixedGeocoder(coordinates)),
                notifier: notifications.clone(),
            },
        );
        Harness {
            view,
            store,
            media,
            notifications,
        }
    }

    fn fill(view: &ListingView) {
        view.set_field(FormField::Name, "Kite").unwrap();
        view.set_field(FormField::Description, "Red, barely flown").unwrap();
        view.set_field(FormField::Price, "12").unwrap();
        view.set_field(FormField::Category, "Toy").unwrap();
        view.set_field(FormField::Location, "Austin, TX").unwrap();
    }

    fn draft(user: &str) -> ProductDraft {
        ProductDraft {
            image_url: Vec::new(),
            name: "Lamp".to_owned(),
            description: "Brass".to_owned(),
            price: Price::parse("20").unwrap(),
            category: Category::Electronics,
            location: "Denver, CO".to_owned(),
            coordinates: Coordinates::new(39.7, -104.9),
            user_id: UserId::new(user),
        }
    }

    async fn wait_for<F>(view: &ListingView, predicate: F) -> ListingSnapshot
    where
        F: Fn(&ListingSnapshot) -> bool,
    {
        let mut receiver = view.watch();
        let snapshot = tokio::time::timeout(Duration::from_secs(2), receiver.wait_for(|s| predicate(s)))
            .await
            .unwrap()
            .unwrap()
            .clone();
        snapshot
    }

    #[test]
    fn test_toggle_flips_panel() {
        let h = harness("uid-1", None);
        assert!(!h.view.show_add_product());
        h.view.toggle_add_product();
        assert!(h.view.show_add_product());
        h.view.toggle_add_product();
        assert!(!h.view.show_add_product());
    }

    #[test]
    fn test_too_many_images_keeps_previous_selection() {
        let h = harness("uid-1", None);
        let one = ImageFile::new("a.png", "image/png", vec![1u8]);
        h.view.select_images(vec![one.clone()]).unwrap();

        let four: Vec<_> = (0..4)
            .map(|i| ImageFile::new(format!("{i}.png"), "image/png", vec![0u8]))
            .collect();
        let err = h.view.select_images(four).unwrap_err();

        assert_eq!(err, TooManyImages { selected: 4, max: 3 });
        assert_eq!(h.view.images(), vec![one]);
        assert_eq!(*h.notifications.0.lock(), vec![Notification::TooManyImages]);
    }

    #[tokio::test]
    async fn test_add_product_resets_form_but_not_panel() {
        let h = harness("uid-1", Some(Coordinates::new(30.27, -97.74)));
        h.view.toggle_add_product();
        fill(&h.view);
        h.view
            .select_images(vec![ImageFile::new("kite.png", "image/png", vec![7u8])])
            .unwrap();

        let id = h.view.add_product().await.unwrap();

        let stored = h.store.products();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].product_id, id);
        assert_eq!(stored[0].image_url, vec!["memory://products/kite.png".to_owned()]);
        assert_eq!(h.media.len(), 1);
        assert_eq!(h.view.form(), ProductForm::default());
        assert!(h.view.images().is_empty());
        assert!(h.view.show_add_product());
        assert_eq!(*h.notifications.0.lock(), vec![Notification::Added]);
    }

    #[tokio::test]
    async fn test_add_product_geocoding_failure_keeps_form() {
        let h = harness("uid-1", None);
        fill(&h.view);
        let before = h.view.form();

        let err = h.view.add_product().await.unwrap_err();

        assert!(matches!(err, AddProductError::GeocodingFailed(_)));
        assert!(h.store.products().is_empty());
        assert_eq!(h.view.form(), before);
        assert!(h.notifications.0.lock().is_empty());
    }

    #[tokio::test]
    async fn test_live_snapshot_tracks_store() {
        let h = harness("uid-1", None);
        h.view.start();

        let mine = h.store.create(draft("uid-1")).await.unwrap();
        let theirs = h.store.create(draft("uid-2")).await.unwrap();
        h.store.add_bookmark(&UserId::new("uid-1"), theirs.clone());

        let snapshot = wait_for(&h.view, |s| {
            s.my_products.len() == 1 && s.all_products.len() == 2 && s.bookmarked_products.len() == 1
        })
        .await;
        assert_eq!(snapshot.my_products.len(), 1);
        assert_eq!(snapshot.my_products[0].product_id, mine);
        assert_eq!(snapshot.bookmarked_products[0].product_id, theirs);

        h.store.delete(&theirs).await.unwrap();
        let snapshot = wait_for(&h.view, |s| s.all_products.len() == 1).await;
        assert!(snapshot.bookmarked_products.is_empty());
        assert!(snapshot.bookmark_ids.contains(&theirs));

        h.view.stop();
    }

    #[tokio::test]
    async fn test_start_twice_then_stop_releases_three() {
        let h = harness("uid-1", None);
        h.view.start();
        h.view.start();
        assert_eq!(h.store.active_subscriptions(), 3);

        h.view.stop();
        h.view.stop();
        assert_eq!(h.store.active_subscriptions(), 0);
        assert!(!h.view.is_started());
    }

    #[tokio::test]
    async fn test_dropping_started_view_releases_subscriptions() {
        let h = harness("uid-1", None);
        h.view.start();
        let clone = h.view.clone();
        drop(h.view);
        assert_eq!(h.store.active_subscriptions(), 3);

        drop(clone);
        assert_eq!(h.store.active_subscriptions(), 0);
    }
}
