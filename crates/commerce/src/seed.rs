//! Seed product feed consumed on first run.
//!
//! Seed records look like catalog drafts with an optional fixed identifier:
//! prices are formatted strings or numbers and images are URLs. A bundled
//! feed ships with the crate; a file can replace it through configuration.

use std::path::Path;

use chrono::{DateTime, Utc};
use kaline_core::{ImageRef, Product, ProductDraft, ProductId};
use serde::Deserialize;
use thiserror::Error;

const BUNDLED_SEED: &str = include_str!("../seed/products.json");

/// Errors reading a seed feed.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid seed feed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One record of the seed feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    /// Fixed identifier. A fresh one is generated when absent.
    #[serde(default)]
    pub id: Option<ProductId>,
    #[serde(flatten)]
    pub draft: ProductDraft,
    /// Legacy availability flag, used when no stock count is given.
    #[serde(default)]
    pub in_stock: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SeedProduct {
    /// The feed bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled feed does not parse.
    pub fn bundled() -> Result<Vec<Self>, SeedError> {
        Self::parse(BUNDLED_SEED)
    }

    /// Read a feed from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Vec<Self>, SeedError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Parse a feed.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a JSON list of seed records.
    pub fn parse(raw: &str) -> Result<Vec<Self>, SeedError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The source image reference, before materialization.
    #[must_use]
    pub fn image(&self) -> ImageRef {
        ImageRef::new(self.draft.image.as_str())
    }

    /// Build the catalog record. `image` is the materialized image.
    #[must_use]
    pub fn into_product(self, image: ImageRef, now: DateTime<Utc>) -> Product {
        let id = self.id.unwrap_or_else(ProductId::generate);
        let created_at = self.created_at.unwrap_or(now);
        let updated_at = self.updated_at.unwrap_or(created_at);

        let mut draft = self.draft;
        if draft.stock.is_none() && self.in_stock == Some(false) {
            draft.stock = Some(0);
        }

        let mut product = draft.into_product(id, image, now);
        product.created_at = created_at;
        product.updated_at = updated_at;
        product
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_bundled_feed_parses() {
        let seed = SeedProduct::bundled().unwrap();
        assert_eq!(seed.len(), 8);

        let ids: HashSet<_> = seed.iter().filter_map(|s| s.id.clone()).collect();
        assert_eq!(ids.len(), 8);
        assert!(seed.iter().all(|s| s.draft.validate().is_ok()));
        assert!(seed.iter().all(|s| s.image().as_str().starts_with("http")));
    }

    #[test]
    fn test_bundled_prices_normalize() {
        let skirt = SeedProduct::bundled()
            .unwrap()
            .into_iter()
            .find(|s| s.id.as_ref().is_some_and(|id| id.as_str() == "3"))
            .unwrap();
        let product = skirt.into_product(ImageRef::placeholder(), Utc::now());
        assert_eq!(product.price.minor_units(), 21_990);
        assert_eq!(product.reviews, 145);
        assert_eq!(product.created_at.to_rfc3339(), "2025-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_in_stock_false_maps_to_zero_stock() {
        let seed = SeedProduct::parse(
            r#"[{"name": "Esgotado", "price": 99.9, "inStock": false},
                {"name": "Contado", "price": "R$ 10,00", "inStock": false, "stock": 4}]"#,
        )
        .unwrap();
        let mut products = seed
            .into_iter()
            .map(|s| s.into_product(ImageRef::placeholder(), Utc::now()));

        let sold_out = products.next().unwrap();
        assert_eq!(sold_out.stock, Some(0));
        assert_eq!(sold_out.price.minor_units(), 9_990);
        assert!(sold_out.id.as_str().starts_with("prod-"));

        assert_eq!(products.next().unwrap().stock, Some(4));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"[{"id": "1", "name": "Blusa"}]"#).unwrap();
        let seed = SeedProduct::from_path(&path).unwrap();
        assert_eq!(seed.len(), 1);

        assert!(matches!(
            SeedProduct::from_path(&dir.path().join("missing.json")),
            Err(SeedError::Io(_))
        ));
        std::fs::write(&path, "{}").unwrap();
        assert!(matches!(SeedProduct::from_path(&path), Err(SeedError::Parse(_))));
    }
}
