//! Product categories.

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid category: {0}")]
pub struct UnknownCategory(pub String);

/// The fixed set of categories a listing can belong to.
///
/// The selection widget also offers an unselected sentinel
/// ([`Category::UNSELECTED`]); it is never a valid stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Toy,
    Electronics,
    Clothing,
}

impl Category {
    /// Value the category picker submits when nothing has been chosen.
    pub const UNSELECTED: &'static str = "None";

    /// All persisted categories, in picker order.
    pub const ALL: [Self; 3] = [Self::Toy, Self::Electronics, Self::Clothing];

    /// The stored name of this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Toy => "Toy",
            Self::Electronics => "Electronics",
            Self::Clothing => "Clothing",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Toy" => Ok(Self::Toy),
            "Electronics" => Ok(Self::Electronics),
            "Clothing" => Ok(Self::Clothing),
            _ => Err(UnknownCategory(s.to_owned())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_categories() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_sentinel_is_not_a_category() {
        let err = Category::UNSELECTED.parse::<Category>().unwrap_err();
        assert_eq!(err, UnknownCategory("None".to_owned()));
    }

    #[test]
    fn test_category_serializes_by_name() {
        let json = serde_json::to_string(&Category::Electronics).unwrap();
        assert_eq!(json, "\"Electronics\"");
    }
}
