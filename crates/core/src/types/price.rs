//! Listing price.
//!
//! Prices are entered as free text and stored exactly as typed, so the
//! record keeps whatever the seller wrote ("15", "9.99", "free"). A decimal
//! view is available for display when the text is numeric.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The input string is empty.
    #[error("price cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("price must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
}

/// A string-encoded listing price.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(String);

impl Price {
    /// Maximum number of characters a price may hold.
    pub const MAX_CHARS: usize = 5;

    /// Parse a `Price` from user input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or longer than
    /// [`Price::MAX_CHARS`] characters.
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        if s.is_empty() {
            return Err(PriceError::Empty);
        }
        if s.chars().count() > Self::MAX_CHARS {
            return Err(PriceError::TooLong {
                max: Self::MAX_CHARS,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the price text as entered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric amount, if the text is a decimal number.
    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        self.0.trim().parse::<Decimal>().ok()
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.amount() {
            Some(amount) => write!(f, "${amount:.2}"),
            None => f.write_str(&self.0),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(Price::parse(""), Err(PriceError::Empty));
    }

    #[test]
    fn test_parse_rejects_six_chars() {
        assert_eq!(
            Price::parse("123456"),
            Err(PriceError::TooLong { max: 5 })
        );
    }

    #[test]
    fn test_display_numeric_price() {
        assert_eq!(Price::parse("9.5").unwrap().to_string(), "$9.50");
    }

    #[test]
    fn test_display_free_text_price() {
        let price = Price::parse("free").unwrap();
        assert_eq!(price.amount(), None);
        assert_eq!(price.to_string(), "free");
    }
}
