//! Core types for Kaline.
//!
//! This module provides type-safe wrappers for the storefront domain.

pub mod cart;
pub mod error;
pub mod id;
pub mod notice;
pub mod price;
pub mod product;

pub use cart::{CartKey, CartLine, LineSnapshot};
pub use error::ValidationError;
pub use id::ProductId;
pub use notice::{Collection, ErrorKind, NoticeLevel, Notification, Severity};
pub use price::{Price, PriceInput, apply_discount, format_price, parse_price};
pub use product::{
    Discount, ImageKind, ImageRef, PLACEHOLDER_IMAGE, Product, ProductDraft, ProductPatch,
};
