//! Add-product command.
//!
//! # Usage
//!
//! ```bash
//! tradepost --user uid-1 add --name "Kite" --description "Red, barely flown" \
//!     --price 12 --category Toy --location "Austin, TX" --image kite.jpg
//! ```

use std::path::PathBuf;

use tradepost_core::ProductId;
use tradepost_listings::ListingView;
use tradepost_listings::media::ImageFile;
use tradepost_listings::view::FormField;

use super::CommandError;

/// Field values and image paths for a new listing.
#[derive(Debug, Clone)]
pub struct NewListing {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub location: String,
    pub images: Vec<PathBuf>,
}

/// Fill in the add-product form and submit it.
///
/// # Returns
///
/// The id of the created product.
///
/// # Errors
///
/// Returns error if the category is unknown, an image cannot be read, too
/// many images are given, or the submission is abandoned.
pub async fn add(view: &ListingView, listing: NewListing) -> Result<ProductId, CommandError> {
    view.toggle_add_product();

    let fields = [
        (FormField::Name, listing.name),
        (FormField::Description, listing.description),
        (FormField::Price, listing.price),
        (FormField::Category, listing.category),
        (FormField::Location, listing.location),
    ];
    for (field, value) in fields {
        if let Some(max) = field.max_chars()
            && value.chars().count() > max
        {
            tracing::warn!("{field} is longer than {max} characters and will be cut");
        }
        view.set_field(field, &value)?;
    }

    let mut images = Vec::with_capacity(listing.images.len());
    for path in &listing.images {
        images.push(ImageFile::from_path(path).await?);
    }
    view.select_images(images)?;

    let product_id = view.add_product().await?;
    tracing::info!(product_id = %product_id, "Listing created");
    Ok(product_id)
}
