//! Marketplace product records.

use serde::{Deserialize, Serialize};

use super::{Category, Coordinates, Price, ProductId, UserId};

/// A product listing as stored in the realtime database.
///
/// Records are created once and never edited; the store assigns
/// `product_id` and the record carries it as a field as well as a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: ProductId,
    /// Download URLs of the listing's images, in upload order.
    #[serde(default)]
    pub image_url: Vec<String>,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub location: String,
    pub coordinates: Coordinates,
    pub user_id: UserId,
}

impl Product {
    /// Maximum number of characters in a product name.
    pub const NAME_MAX_CHARS: usize = 30;
    /// Maximum number of characters in a product description.
    pub const DESCRIPTION_MAX_CHARS: usize = 150;
    /// Maximum number of images attached to one product.
    pub const MAX_IMAGES: usize = 3;
}

/// A validated product that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub image_url: Vec<String>,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub location: String,
    pub coordinates: Coordinates,
    pub user_id: UserId,
}

impl ProductDraft {
    /// Attach the store-assigned id, producing the full record.
    #[must_use]
    pub fn into_product(self, product_id: ProductId) -> Product {
        Product {
            product_id,
            image_url: self.image_url,
            name: self.name,
            description: self.description,
            price: self.price,
            category: self.category,
            location: self.location,
            coordinates: self.coordinates,
            user_id: self.user_id,
        }
    }
}
