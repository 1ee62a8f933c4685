//! Delete-product command.

use tradepost_core::ProductId;
use tradepost_listings::ListingView;

/// Delete a product by id.
///
/// Deletion is fire-and-forget: the view reports it as done either way and
/// logs a store failure.
pub async fn delete(view: &ListingView, product_id: &str) {
    view.delete_product(&ProductId::new(product_id)).await;
}
