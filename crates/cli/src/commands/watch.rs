//! Watch command: follow the live grids until Ctrl+C.

use tradepost_core::Product;
use tradepost_listings::{ListingSnapshot, ListingView};

use super::CommandError;

/// Start the view and log both grids after every change.
///
/// # Errors
///
/// Returns error if listening for Ctrl+C fails. The view is stopped either way.
pub async fn watch(view: &ListingView) -> Result<(), CommandError> {
    view.start();
    let mut updates = view.watch();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            signal = &mut shutdown => break signal,
            changed = updates.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();
                log_grids(&snapshot);
            }
        }
    };

    view.stop();
    tracing::info!("Stopped watching");
    result.map_err(CommandError::from)
}

fn log_grids(snapshot: &ListingSnapshot) {
    tracing::info!(
        mine = snapshot.my_products.len(),
        bookmarked = snapshot.bookmarked_products.len(),
        "Listings updated"
    );
    for product in &snapshot.my_products {
        log_product("mine", product);
    }
    for product in &snapshot.bookmarked_products {
        log_product("bookmarked", product);
    }
}

fn log_product(grid: &str, product: &Product) {
    tracing::info!(
        grid,
        product_id = %product.product_id,
        name = %product.name,
        price = %product.price,
        category = %product.category,
        location = %product.location,
        images = product.image_url.len(),
        "Product"
    );
}
