//! The add-product form.

use tradepost_core::{Category, Coordinates, Price, Product, ProductDraft, UnknownCategory, UserId};

use crate::error::FormRejection;

/// The five editable fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Name,
    Description,
    Price,
    Category,
    Location,
}

impl FormField {
    /// Input order, which is also the order fields are checked on submit.
    pub const ALL: [Self; 5] = [
        Self::Name,
        Self::Description,
        Self::Price,
        Self::Category,
        Self::Location,
    ];

    /// Character limit enforced while typing, if any.
    #[must_use]
    pub const fn max_chars(self) -> Option<usize> {
        match self {
            Self::Name => Some(Product::NAME_MAX_CHARS),
            Self::Description => Some(Product::DESCRIPTION_MAX_CHARS),
            Self::Price => Some(Price::MAX_CHARS),
            Self::Category | Self::Location => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::Category => "category",
            Self::Location => "location",
        }
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the category picker.
///
/// `Blank` is the untouched form; `Unselected` is the explicit "None"
/// option. Both block submission, but only `Unselected` warns the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryChoice {
    #[default]
    Blank,
    Unselected,
    Selected(Category),
}

impl CategoryChoice {
    fn parse(value: &str) -> Result<Self, UnknownCategory> {
        match value {
            "" => Ok(Self::Blank),
            Category::UNSELECTED => Ok(Self::Unselected),
            other => other.parse().map(Self::Selected),
        }
    }

    /// The picker value, as submitted by the input.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "",
            Self::Unselected => Category::UNSELECTED,
            Self::Selected(category) => category.as_str(),
        }
    }
}

/// Field values of the add-product form.
///
/// Values are kept as typed, except that text fields with a character limit
/// are cut to that limit on entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    name: String,
    description: String,
    price: String,
    category: CategoryChoice,
    location: String,
}

impl ProductForm {
    /// Current value of a field.
    #[must_use]
    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Description => &self.description,
            FormField::Price => &self.price,
            FormField::Category => self.category.as_str(),
            FormField::Location => &self.location,
        }
    }

    #[must_use]
    pub const fn category(&self) -> CategoryChoice {
        self.category
    }

    /// Set one field.
    ///
    /// # Errors
    ///
    /// Returns `UnknownCategory` when the category value is not blank, the
    /// unselected sentinel, or a known category. The form is unchanged.
    pub fn set(&mut self, field: FormField, value: &str) -> Result<(), UnknownCategory> {
        let value = truncate_chars(value, field.max_chars());
        match field {
            FormField::Name => self.name = value,
            FormField::Description => self.description = value,
            FormField::Price => self.price = value,
            FormField::Category => self.category = CategoryChoice::parse(&value)?,
            FormField::Location => self.location = value,
        }
        Ok(())
    }

    /// Check the form for submission.
    ///
    /// The unselected category is reported before any empty field.
    ///
    /// # Errors
    ///
    /// Returns the first reason the form cannot be submitted.
    pub fn validate(&self) -> Result<ValidForm, FormRejection> {
        if self.category == CategoryChoice::Unselected {
            return Err(FormRejection::CategoryNotSelected);
        }
        if let Some(field) = FormField::ALL
            .into_iter()
            .find(|&field| self.value(field).is_empty())
        {
            return Err(FormRejection::MissingField(field));
        }
        let CategoryChoice::Selected(category) = self.category else {
            return Err(FormRejection::MissingField(FormField::Category));
        };

        Ok(ValidForm {
            name: self.name.clone(),
            description: self.description.clone(),
            price: Price::parse(&self.price)?,
            category,
            location: self.location.clone(),
        })
    }
}

fn truncate_chars(value: &str, max: Option<usize>) -> String {
    match max {
        Some(max) => value.chars().take(max).collect(),
        None => value.to_owned(),
    }
}

/// A form that passed validation, waiting for coordinates and images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidForm {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: Category,
    pub location: String,
}

impl ValidForm {
    #[must_use]
    pub fn into_draft(
        self,
        image_url: Vec<String>,
        coordinates: Coordinates,
        user_id: UserId,
    ) -> ProductDraft {
        ProductDraft {
            image_url,
            name: self.name,
            description: self.description,
            price: self.price,
            category: self.category,
            location: self.location,
            coordinates,
            user_id,
        }
    }
}
