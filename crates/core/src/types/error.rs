//! Validation errors for user-supplied domain input.

use thiserror::Error;

/// Input rejected before any state change.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("product name must not be empty")]
    EmptyName,
    #[error("rating {0} is outside 0.0-5.0")]
    RatingOutOfRange(f32),
    #[error("discount of {0}% is outside 0-100")]
    DiscountOutOfRange(u8),
    #[error("quantity must be at least 1")]
    ZeroQuantity,
    #[error("a size must be selected (options: {})", .0.join(", "))]
    SizeRequired(Vec<String>),
    #[error("size '{0}' is not offered for this product")]
    UnknownSize(String),
    #[error("a color must be selected (options: {})", .0.join(", "))]
    ColorRequired(Vec<String>),
    #[error("color '{0}' is not offered for this product")]
    UnknownColor(String),
}
