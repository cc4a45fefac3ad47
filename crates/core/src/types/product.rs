//! Catalog product records and the inputs that create or modify them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::ValidationError;
use super::id::ProductId;
use super::price::{Price, PriceInput, apply_discount, parse_price};

/// Fallback image used whenever a reference cannot be resolved.
///
/// This is itself embedded content, so materializing it is a no-op.
pub const PLACEHOLDER_IMAGE: &str = "data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHdpZHRoPSIyMDAiIGhlaWdodD0iMjAwIiB2aWV3Qm94PSIwIDAgMjAwIDIwMCI+PHJlY3Qgd2lkdGg9IjIwMCIgaGVpZ2h0PSIyMDAiIGZpbGw9IiNFRUVFRUUiLz48Y2lyY2xlIGN4PSIxMDAiIGN5PSIxMDAiIHI9IjUwIiBmaWxsPSJub25lIiBzdHJva2U9IiM5OTk5OTkiIHN0cm9rZS13aWR0aD0iNiIvPjxwYXRoIGQ9Ik03MiAxMjhMMTAwIDEwMEwxMjggMTI4IiBmaWxsPSJub25lIiBzdHJva2U9IiM5OTk5OTkiIHN0cm9rZS13aWR0aD0iNiIgc3Ryb2tlLWxpbmVjYXA9InJvdW5kIiBzdHJva2UtbGluZWpvaW49InJvdW5kIi8+PC9zdmc+";

const MAX_RATING: f32 = 5.0;

/// What an image reference currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// A `data:image/...` URI carrying the bytes inline.
    Embedded,
    /// An `http(s)://` URL that still needs fetching.
    Remote,
    /// Empty or anything else.
    Unrecognized,
}

/// An image reference: a remote URL before ingestion, embedded content after.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap a raw reference.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The placeholder sentinel.
    #[must_use]
    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_IMAGE.to_string())
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the reference.
    #[must_use]
    pub fn kind(&self) -> ImageKind {
        let reference = self.0.trim();
        if reference.starts_with("data:image/") {
            ImageKind::Embedded
        } else if reference.starts_with("https://") || reference.starts_with("http://") {
            ImageKind::Remote
        } else {
            ImageKind::Unrecognized
        }
    }

    /// Whether this reference is already self-contained.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.kind() == ImageKind::Embedded
    }

    /// Whether this is the placeholder sentinel.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_IMAGE
    }
}

impl Default for ImageRef {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl From<&str> for ImageRef {
    fn from(reference: &str) -> Self {
        Self::new(reference)
    }
}

impl From<String> for ImageRef {
    fn from(reference: String) -> Self {
        Self(reference)
    }
}

/// A product discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage off the list price, 0-100.
    Percent(u8),
    /// Absolute discounted price. Never raises the price above the list price.
    Price(Price),
}

impl Discount {
    fn validate(self) -> Result<(), ValidationError> {
        match self {
            Self::Percent(p) if p > 100 => Err(ValidationError::DiscountOutOfRange(p)),
            _ => Ok(()),
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: Vec<String>,
    /// List price in minor units.
    #[serde(default)]
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub image: ImageRef,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price after applying the discount, if any.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        match self.discount {
            Some(Discount::Percent(percent)) => apply_discount(self.price, percent),
            Some(Discount::Price(discounted)) => discounted.min(self.price),
            None => self.price,
        }
    }

    /// Whether the product can currently be bought. Unknown stock counts as available.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.stock.is_none_or(|stock| stock > 0)
    }

    /// Resolve a size/color selection against this product's options.
    ///
    /// When the product offers options, the selection must be one of them.
    /// When it offers none, the selection is normalized to the empty string.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a required option is missing or unknown.
    pub fn resolve_variant(
        &self,
        size: &str,
        color: &str,
    ) -> Result<(String, String), ValidationError> {
        let size = pick_option(
            &self.sizes,
            size,
            ValidationError::SizeRequired,
            ValidationError::UnknownSize,
        )?;
        let color = pick_option(
            &self.colors,
            color,
            ValidationError::ColorRequired,
            ValidationError::UnknownColor,
        )?;
        Ok((size, color))
    }
}

fn pick_option(
    options: &[String],
    selected: &str,
    required: fn(Vec<String>) -> ValidationError,
    unknown: fn(String) -> ValidationError,
) -> Result<String, ValidationError> {
    if options.is_empty() {
        return Ok(String::new());
    }
    let selected = selected.trim();
    if selected.is_empty() {
        return Err(required(options.to_vec()));
    }
    options
        .iter()
        .find(|option| option.as_str() == selected)
        .cloned()
        .ok_or_else(|| unknown(selected.to_string()))
}

/// Input for creating a product.
///
/// Prices may be formatted strings or numbers; the image may be a URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub price: PriceInput,
    #[serde(default)]
    pub discount: Option<Discount>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub reviews: Option<u32>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub stock: Option<u32>,
}

impl ProductDraft {
    /// Check the draft before it touches any state.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for an empty name, a rating outside
    /// 0.0-5.0 or a discount percentage above 100.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        if let Some(discount) = self.discount {
            discount.validate()?;
        }
        Ok(())
    }

    /// Build the product record.
    ///
    /// `image` is the already-materialized image; rating and review count
    /// default to zero.
    #[must_use]
    pub fn into_product(self, id: ProductId, image: ImageRef, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description,
            details: self.details,
            price: parse_price(&self.price),
            discount: self.discount,
            image,
            rating: self.rating.unwrap_or(0.0),
            reviews: self.reviews.unwrap_or(0),
            sizes: self.sizes,
            colors: self.colors,
            stock: self.stock,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub details: Option<Vec<String>>,
    pub price: Option<PriceInput>,
    /// `Some(None)` clears the discount.
    pub discount: Option<Option<Discount>>,
    pub image: Option<String>,
    pub rating: Option<f32>,
    pub reviews: Option<u32>,
    pub sizes: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    /// `Some(None)` marks stock as untracked.
    pub stock: Option<Option<u32>>,
}

impl ProductPatch {
    /// Check the patch before it touches any state.
    ///
    /// # Errors
    ///
    /// Same rules as [`ProductDraft::validate`], applied to present fields only.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.as_ref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ValidationError::EmptyName);
        }
        if let Some(rating) = self.rating {
            validate_rating(rating)?;
        }
        if let Some(Some(discount)) = self.discount {
            discount.validate()?;
        }
        Ok(())
    }

    /// Whether the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge onto `product`. `image` is the materialized replacement, if the
    /// patch carried one. The identifier and creation time never change.
    pub fn apply_to(self, product: &mut Product, image: Option<ImageRef>, now: DateTime<Utc>) {
        if let Some(name) = self.name {
            product.name = name.trim().to_string();
        }
        if let Some(category) = self.category {
            product.category = category.trim().to_string();
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(details) = self.details {
            product.details = details;
        }
        if let Some(price) = self.price {
            product.price = parse_price(&price);
        }
        if let Some(discount) = self.discount {
            product.discount = discount;
        }
        if let Some(image) = image {
            product.image = image;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(reviews) = self.reviews {
            product.reviews = reviews;
        }
        if let Some(sizes) = self.sizes {
            product.sizes = sizes;
        }
        if let Some(colors) = self.colors {
            product.colors = colors;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        product.updated_at = now;
    }
}

fn validate_rating(rating: f32) -> Result<(), ValidationError> {
    if rating.is_finite() && (0.0..=MAX_RATING).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::RatingOutOfRange(rating))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Saia Longa Godê".to_string(),
            category: "Saias".to_string(),
            price: "R$ 219,90".into(),
            image: "https://example.com/saia.jpg".to_string(),
            sizes: vec!["P".to_string(), "M".to_string()],
            colors: vec!["Terracota".to_string()],
            ..ProductDraft::default()
        }
    }

    fn product() -> Product {
        draft().into_product(ProductId::new("3"), ImageRef::placeholder(), Utc::now())
    }

    #[test]
    fn test_image_kind() {
        assert_eq!(ImageRef::placeholder().kind(), ImageKind::Embedded);
        assert_eq!(
            ImageRef::new("data:image/png;base64,AAAA").kind(),
            ImageKind::Embedded
        );
        assert_eq!(
            ImageRef::new("https://example.com/a.jpg").kind(),
            ImageKind::Remote
        );
        assert_eq!(ImageRef::new("").kind(), ImageKind::Unrecognized);
        assert_eq!(ImageRef::new("/placeholder.jpg").kind(), ImageKind::Unrecognized);
        assert_eq!(ImageRef::new("ftp://host/a.jpg").kind(), ImageKind::Unrecognized);
    }

    #[test]
    fn test_into_product_normalizes_and_defaults() {
        let p = product();
        assert_eq!(p.price.minor_units(), 21_990);
        assert!(p.rating.abs() < f32::EPSILON);
        assert_eq!(p.reviews, 0);
        assert_eq!(p.created_at, p.updated_at);
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft().validate().is_ok());

        let mut d = draft();
        d.name = "   ".to_string();
        assert_eq!(d.validate(), Err(ValidationError::EmptyName));

        let mut d = draft();
        d.rating = Some(5.5);
        assert!(matches!(d.validate(), Err(ValidationError::RatingOutOfRange(_))));

        let mut d = draft();
        d.discount = Some(Discount::Percent(120));
        assert_eq!(d.validate(), Err(ValidationError::DiscountOutOfRange(120)));
    }

    #[test]
    fn test_effective_price() {
        let mut p = product();
        assert_eq!(p.effective_price(), p.price);

        p.discount = Some(Discount::Percent(10));
        assert_eq!(p.effective_price().minor_units(), 19_791);

        p.discount = Some(Discount::Price(Price::from_minor(15_000)));
        assert_eq!(p.effective_price().minor_units(), 15_000);

        // An absolute "discount" above list price never raises the price
        p.discount = Some(Discount::Price(Price::from_minor(99_999)));
        assert_eq!(p.effective_price(), p.price);
    }

    #[test]
    fn test_availability() {
        let mut p = product();
        assert!(p.is_available());
        p.stock = Some(0);
        assert!(!p.is_available());
        p.stock = Some(3);
        assert!(p.is_available());
    }

    #[test]
    fn test_resolve_variant() {
        let p = product();
        assert_eq!(
            p.resolve_variant("M", "Terracota").unwrap(),
            ("M".to_string(), "Terracota".to_string())
        );
        assert!(matches!(
            p.resolve_variant("", "Terracota"),
            Err(ValidationError::SizeRequired(_))
        ));
        assert_eq!(
            p.resolve_variant("XG", "Terracota"),
            Err(ValidationError::UnknownSize("XG".to_string()))
        );

        let mut plain = product();
        plain.sizes.clear();
        plain.colors.clear();
        assert_eq!(
            plain.resolve_variant("M", "Red").unwrap(),
            (String::new(), String::new())
        );
    }

    #[test]
    fn test_patch_apply() {
        let mut p = product();
        let created = p.created_at;
        let patch = ProductPatch {
            price: Some("R$ 199,90".into()),
            discount: Some(Some(Discount::Percent(5))),
            stock: Some(Some(4)),
            ..ProductPatch::default()
        };
        assert!(patch.validate().is_ok());
        assert!(!patch.is_empty());
        assert!(ProductPatch::default().is_empty());
        patch.apply_to(&mut p, None, Utc::now());
        assert_eq!(p.price.minor_units(), 19_990);
        assert_eq!(p.discount, Some(Discount::Percent(5)));
        assert_eq!(p.stock, Some(4));
        assert_eq!(p.id.as_str(), "3");
        assert_eq!(p.created_at, created);

        ProductPatch {
            discount: Some(None),
            ..ProductPatch::default()
        }
        .apply_to(&mut p, None, Utc::now());
        assert!(p.discount.is_none());
    }

    #[test]
    fn test_persisted_record_tolerates_missing_and_unknown_fields() {
        let json = r#"{"id":"7","name":"Bolsa","price":12990,"inStock":true}"#;
        let p: Product = serde_json::from_str(json).unwrap();
        assert_eq!(p.price.minor_units(), 12_990);
        assert!(p.image.is_placeholder());
        assert!(p.sizes.is_empty());
    }
}
