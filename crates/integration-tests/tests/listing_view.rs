//! Integration tests for the add-product form and product deletion.
//!
//! These drive a `ListingView` against recording fakes and check which
//! collaborators were called, in what order, and what the user was told.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tradepost_core::{Category, Coordinates, ProductId};
use tradepost_integration_tests::{RecordingUploader, TestContext, image};
use tradepost_listings::AddProductError;
use tradepost_listings::FormRejection;
use tradepost_listings::notify::Notification;
use tradepost_listings::view::{FormField, ProductForm};

const NEW_YORK: Coordinates = Coordinates::new(40.0, -73.0);

fn fill_form(ctx: &TestContext) {
    ctx.view.set_field(FormField::Name, "Desk lamp").unwrap();
    ctx.view
        .set_field(FormField::Description, "Brass, works fine")
        .unwrap();
    ctx.view.set_field(FormField::Price, "15").unwrap();
    ctx.view.set_field(FormField::Category, "Electronics").unwrap();
    ctx.view.set_field(FormField::Location, "Brooklyn, NY").unwrap();
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_unselected_category_warns_once_and_keeps_fields() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);
    ctx.view.set_field(FormField::Category, "None").unwrap();
    let before = ctx.view.form();

    let err = ctx.view.add_product().await.unwrap_err();

    assert!(matches!(
        err,
        AddProductError::Rejected(FormRejection::CategoryNotSelected)
    ));
    assert!(ctx.store.creates().is_empty());
    assert!(ctx.geocoder.lookups().is_empty());
    assert_eq!(
        ctx.notifier.notifications(),
        vec![Notification::CategoryNotSelected]
    );
    assert_eq!(ctx.view.form(), before);
    assert_eq!(ctx.view.form().value(FormField::Name), "Desk lamp");
}

#[tokio::test]
async fn test_unselected_category_wins_over_empty_fields() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    ctx.view.set_field(FormField::Category, "None").unwrap();

    ctx.view.add_product().await.unwrap_err();

    assert_eq!(
        ctx.notifier.notifications(),
        vec![Notification::CategoryNotSelected]
    );
}

#[tokio::test]
async fn test_each_empty_field_blocks_silently() {
    for field in [
        FormField::Name,
        FormField::Description,
        FormField::Price,
        FormField::Category,
        FormField::Location,
    ] {
        let ctx = TestContext::new("uid-1", Some(NEW_YORK));
        fill_form(&ctx);
        ctx.view.set_field(field, "").unwrap();

        let err = ctx.view.add_product().await.unwrap_err();

        assert!(
            matches!(err, AddProductError::Rejected(FormRejection::MissingField(f)) if f == field),
            "unexpected error for empty {field}: {err}"
        );
        assert!(ctx.store.creates().is_empty(), "created with empty {field}");
        assert!(ctx.geocoder.lookups().is_empty());
        assert!(ctx.notifier.notifications().is_empty());
    }
}

#[tokio::test]
async fn test_untouched_form_is_silently_rejected() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));

    ctx.view.add_product().await.unwrap_err();

    assert!(ctx.store.creates().is_empty());
    assert!(ctx.notifier.notifications().is_empty());
}

#[test]
fn test_unknown_category_is_rejected_on_entry() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);

    assert!(ctx.view.set_field(FormField::Category, "Furniture").is_err());
    assert_eq!(ctx.view.form().value(FormField::Category), "Electronics");
}

// =============================================================================
// Image Selection
// =============================================================================

#[tokio::test]
async fn test_selecting_four_images_alerts_and_uploads_nothing() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));

    let err = ctx
        .view
        .select_images(vec![image("a.png"), image("b.png"), image("c.png"), image("d.png")])
        .unwrap_err();

    assert_eq!(err.selected, 4);
    assert_eq!(err.max, 3);
    assert_eq!(ctx.notifier.notifications(), vec![Notification::TooManyImages]);
    assert!(ctx.view.images().is_empty());

    fill_form(&ctx);
    ctx.view.add_product().await.unwrap();
    assert!(ctx.uploader.uploads().is_empty());
}

#[test]
fn test_selecting_three_images_is_allowed() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));

    ctx.view
        .select_images(vec![image("a.png"), image("b.png"), image("c.png")])
        .unwrap();

    assert_eq!(ctx.view.images().len(), 3);
    assert!(ctx.notifier.notifications().is_empty());
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_successful_add_stores_one_record_and_resets_form() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    ctx.view.toggle_add_product();
    fill_form(&ctx);
    ctx.view
        .select_images(vec![image("front.png"), image("back.png")])
        .unwrap();

    let product_id = ctx.view.add_product().await.unwrap();

    let creates = ctx.store.creates();
    assert_eq!(creates.len(), 1);
    let draft = &creates[0];
    assert_eq!(
        draft.image_url,
        vec![
            RecordingUploader::url_for("front.png"),
            RecordingUploader::url_for("back.png"),
        ]
    );
    assert_eq!(draft.coordinates, NEW_YORK);
    assert_eq!(draft.category, Category::Electronics);
    assert_eq!(draft.user_id.as_str(), "uid-1");
    assert_eq!(ctx.geocoder.lookups(), vec!["Brooklyn, NY".to_owned()]);

    let stored = ctx.store.store().products();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].product_id, product_id);

    assert_eq!(ctx.notifier.notifications(), vec![Notification::Added]);
    assert_eq!(ctx.view.form(), ProductForm::default());
    assert!(ctx.view.images().is_empty());
    assert!(ctx.view.show_add_product());
}

#[tokio::test]
async fn test_add_without_images_stores_empty_list() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);

    ctx.view.add_product().await.unwrap();

    assert!(ctx.store.creates()[0].image_url.is_empty());
    assert!(ctx.uploader.uploads().is_empty());
}

#[tokio::test]
async fn test_geocoding_failure_stops_before_uploads() {
    let ctx = TestContext::new("uid-1", None);
    fill_form(&ctx);
    ctx.view.select_images(vec![image("front.png")]).unwrap();

    let err = ctx.view.add_product().await.unwrap_err();

    assert!(matches!(err, AddProductError::GeocodingFailed(ref location) if location == "Brooklyn, NY"));
    assert!(ctx.uploader.uploads().is_empty());
    assert!(ctx.store.creates().is_empty());
    assert!(ctx.notifier.notifications().is_empty());
    assert_eq!(ctx.view.form().value(FormField::Name), "Desk lamp");
    assert_eq!(ctx.view.images().len(), 1);
}

#[tokio::test]
async fn test_upload_failure_aborts_remaining_images() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);
    ctx.view
        .select_images(vec![image("a.png"), image("b.png"), image("c.png")])
        .unwrap();
    ctx.uploader.fail_on("b.png");

    let err = ctx.view.add_product().await.unwrap_err();

    assert!(matches!(err, AddProductError::Upload { ref file, .. } if file == "b.png"));
    assert_eq!(ctx.uploader.uploads(), vec!["a.png".to_owned(), "b.png".to_owned()]);
    assert!(ctx.store.creates().is_empty());
    assert!(ctx.notifier.notifications().is_empty());
}

#[tokio::test]
async fn test_persist_failure_keeps_form_and_is_silent() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);
    ctx.store.fail_writes();
    let before = ctx.view.form();

    let err = ctx.view.add_product().await.unwrap_err();

    assert!(matches!(err, AddProductError::Persist(_)));
    assert!(ctx.store.store().products().is_empty());
    assert!(ctx.notifier.notifications().is_empty());
    assert_eq!(ctx.view.form(), before);
}

#[tokio::test]
async fn test_submission_leaves_panel_closed_if_it_was_closed() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);

    ctx.view.add_product().await.unwrap();

    assert!(!ctx.view.show_add_product());
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_existing_product_notifies_once() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    fill_form(&ctx);
    let product_id = ctx.view.add_product().await.unwrap();

    ctx.view.delete_product(&product_id).await;

    assert_eq!(ctx.store.deletes(), vec![product_id]);
    assert!(ctx.store.store().products().is_empty());
    assert_eq!(
        ctx.notifier.notifications(),
        vec![Notification::Added, Notification::Deleted]
    );
}

#[tokio::test]
async fn test_delete_missing_product_still_notifies() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    let missing = ProductId::new("-does-not-exist");

    ctx.view.delete_product(&missing).await;

    assert_eq!(ctx.store.deletes(), vec![missing]);
    assert_eq!(ctx.notifier.notifications(), vec![Notification::Deleted]);
}

#[tokio::test]
async fn test_failed_delete_still_notifies() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    ctx.store.fail_writes();

    ctx.view.delete_product(&ProductId::new("-N1")).await;

    assert_eq!(ctx.store.deletes().len(), 1);
    assert_eq!(ctx.notifier.notifications(), vec![Notification::Deleted]);
}

#[tokio::test]
async fn test_delete_notifies_without_waiting_for_store() {
    let ctx = TestContext::new("uid-1", Some(NEW_YORK));
    ctx.store.stall_deletes();
    let product_id = ProductId::new("-N1");

    let outcome = tokio::time::timeout(
        Duration::from_millis(200),
        ctx.view.delete_product(&product_id),
    )
    .await;

    assert!(outcome.is_err(), "stalled delete should still be pending");
    assert_eq!(ctx.store.deletes(), vec![product_id]);
    assert_eq!(ctx.notifier.notifications(), vec![Notification::Deleted]);
}
