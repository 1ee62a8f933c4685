//! Errors raised by listing view actions.
//!
//! The view logs and notifies before returning any of these; callers only
//! need them to decide an exit status or to assert in tests.

use thiserror::Error;

use tradepost_core::PriceError;

use crate::media::MediaError;
use crate::store::StoreError;
use crate::view::FormField;

/// Why a submitted form did not pass validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormRejection {
    /// The category picker is still on its unselected sentinel.
    #[error("No category selected")]
    CategoryNotSelected,

    /// A required field is empty.
    #[error("Missing required field: {0}")]
    MissingField(FormField),

    #[error("Invalid price: {0}")]
    InvalidPrice(#[from] PriceError),
}

/// Failure of one add-product attempt. Nothing is persisted in any case.
#[derive(Debug, Error)]
pub enum AddProductError {
    #[error(transparent)]
    Rejected(#[from] FormRejection),

    /// The location resolved to no coordinates.
    #[error("Could not geocode location: {0}")]
    GeocodingFailed(String),

    /// An image upload failed; the remaining images were not attempted.
    #[error("Upload of {file} failed: {source}")]
    Upload {
        file: String,
        #[source]
        source: MediaError,
    },

    /// Writing the product record failed.
    #[error("Could not save product: {0}")]
    Persist(#[from] StoreError),
}

/// More images were selected than one product can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Selected {selected} images; at most {max} are allowed")]
pub struct TooManyImages {
    pub selected: usize,
    pub max: usize,
}
