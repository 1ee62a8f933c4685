use std::collections::BTreeSet;

use tradepost_core::{Product, ProductId};

/// Products whose id is bookmarked, in the order of `products`.
///
/// Bookmarks pointing at products that no longer exist are ignored.
#[must_use]
pub fn derive_bookmarked(products: &[Product], bookmark_ids: &BTreeSet<ProductId>) -> Vec<Product> {
    products
        .iter()
        .filter(|product| bookmark_ids.contains(&product.product_id))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tradepost_core::{Category, Coordinates, Price, UserId};

    use super::*;

    fn product(id: &str) -> Product {
        Product {
            product_id: ProductId::new(id),
            image_url: Vec::new(),
            name: format!("Item {id}"),
            description: "Good condition".to_owned(),
            price: Price::parse("5").unwrap(),
            category: Category::Clothing,
            location: "Austin, TX".to_owned(),
            coordinates: Coordinates::new(30.27, -97.74),
            user_id: UserId::new("uid-9"),
        }
    }

    fn ids(products: &[Product]) -> Vec<&str> {
        products.iter().map(|p| p.product_id.as_str()).collect()
    }

    #[test]
    fn test_intersection_keeps_product_order() {
        let products = vec![product("-N3"), product("-N1"), product("-N2")];
        let bookmarks = BTreeSet::from([ProductId::new("-N1"), ProductId::new("-N3")]);

        assert_eq!(ids(&derive_bookmarked(&products, &bookmarks)), vec!["-N3", "-N1"]);
    }

    #[test]
    fn test_dangling_bookmarks_ignored() {
        let products = vec![product("-N1")];
        let bookmarks = BTreeSet::from([ProductId::new("-N1"), ProductId::new("-gone")]);

        assert_eq!(ids(&derive_bookmarked(&products, &bookmarks)), vec!["-N1"]);
    }

    #[test]
    fn test_empty_inputs() {
        let products = vec![product("-N1")];
        assert!(derive_bookmarked(&products, &BTreeSet::new()).is_empty());
        assert!(derive_bookmarked(&[], &BTreeSet::from([ProductId::new("-N1")])).is_empty());
    }
}
