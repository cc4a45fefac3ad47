//! Cart lines keyed by product and variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;
use super::product::{ImageRef, Product};

/// Composite key identifying a cart line: product + size + color.
///
/// Size and color are empty strings for products without variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartKey {
    pub product_id: ProductId,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub color: String,
}

impl CartKey {
    /// Create a key.
    #[must_use]
    pub fn new(
        product_id: impl Into<ProductId>,
        size: impl Into<String>,
        color: impl Into<String>,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
            color: color.into(),
        }
    }
}

impl std::fmt::Display for CartKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.product_id, self.size, self.color)
    }
}

/// Product display fields frozen at add time.
///
/// Insulates the cart from later catalog edits: totals use this price, not
/// the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: ImageRef,
}

impl From<&Product> for LineSnapshot {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.effective_price(),
            image: product.image.clone(),
        }
    }
}

/// A cart line. Quantity is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(flatten)]
    pub key: CartKey,
    pub quantity: u32,
    #[serde(flatten)]
    pub snapshot: LineSnapshot,
    #[serde(default)]
    pub added_at: DateTime<Utc>,
}

impl CartLine {
    /// Snapshot price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.snapshot.price.times(self.quantity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line() -> CartLine {
        CartLine {
            key: CartKey::new("p1", "M", "Red"),
            quantity: 3,
            snapshot: LineSnapshot {
                name: "Vestido".to_string(),
                price: Price::from_minor(1_000),
                image: ImageRef::placeholder(),
            },
            added_at: Utc::now(),
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line().line_total().minor_units(), 3_000);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(CartKey::new("p1", "M", "Red").to_string(), "p1/M/Red");
    }

    #[test]
    fn test_line_serializes_flat() {
        let value = serde_json::to_value(line()).unwrap();
        assert_eq!(value["productId"], "p1");
        assert_eq!(value["size"], "M");
        assert_eq!(value["name"], "Vestido");
        assert_eq!(value["price"], 1_000);

        let back: CartLine = serde_json::from_value(value).unwrap();
        assert_eq!(back.key, CartKey::new("p1", "M", "Red"));
    }
}
