//! Shopping cart.
//!
//! Lines are keyed by product, size and color, and carry a snapshot of the
//! product's name, price and image taken when the line was first added. Later
//! catalog edits never change what the cart charges.
//!
//! The cart is local-only: every mutation writes the whole cart through to
//! storage. A failed write is reported as a soft warning and the in-memory
//! cart is kept.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use kaline_core::{
    CartKey, CartLine, Collection, ErrorKind, LineSnapshot, Notification, Price, Product,
    ProductId, ValidationError,
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::events::EventBus;
use crate::lock;
use crate::storage::PersistentStore;

/// Read access to the catalog, as far as the cart needs it.
pub trait ProductLookup: Send + Sync {
    /// The product with identifier `id`, if any.
    fn product(&self, id: &ProductId) -> Option<Product>;
}

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("cart line not found: {0}")]
    LineNotFound(CartKey),

    #[error("cart is empty")]
    EmptyCart,
}

impl CartError {
    /// Taxonomy classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::EmptyCart => ErrorKind::Validation,
            Self::ProductNotFound(_) | Self::LineNotFound(_) => ErrorKind::NotFound,
        }
    }
}

/// Totals shown on the cart and checkout pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub subtotal: Price,
    /// Zero for an empty cart
    pub shipping: Price,
    pub total: Price,
    /// Sum of quantities
    pub item_count: u32,
}

/// The shopping cart.
pub struct CartStore {
    lines: RwLock<HashMap<CartKey, CartLine>>,
    catalog: Arc<dyn ProductLookup>,
    persistence: PersistentStore,
    events: EventBus,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("lines", &lock::read(&self.lines).len())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// Load the persisted cart.
    ///
    /// Lines with zero quantity are dropped and duplicate keys are merged.
    pub fn open(
        catalog: Arc<dyn ProductLookup>,
        persistence: PersistentStore,
        events: EventBus,
    ) -> Self {
        let mut lines: HashMap<CartKey, CartLine> = HashMap::new();
        for line in persistence.load::<CartLine>(Collection::Cart) {
            if line.quantity == 0 {
                debug!(key = %line.key, "dropping empty persisted cart line");
                continue;
            }
            match lines.entry(line.key.clone()) {
                Entry::Occupied(mut existing) => {
                    let existing = existing.get_mut();
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                    existing.added_at = existing.added_at.min(line.added_at);
                }
                Entry::Vacant(slot) => {
                    slot.insert(line);
                }
            }
        }
        info!(lines = lines.len(), "cart loaded");

        Self {
            lines: RwLock::new(lines),
            catalog,
            persistence,
            events,
        }
    }

    /// Add `quantity` units of a product variant.
    ///
    /// An existing line for the same product, size and color is incremented.
    /// A new line snapshots the product as the catalog shows it right now.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Validation`] for a zero quantity or a size/color
    /// the product does not offer, and [`CartError::ProductNotFound`] if a new
    /// line refers to an unknown product.
    #[instrument(skip(self))]
    pub fn add_item(
        &self,
        product_id: &ProductId,
        size: &str,
        color: &str,
        quantity: u32,
    ) -> Result<CartLine, CartError> {
        if quantity == 0 {
            return Err(ValidationError::ZeroQuantity.into());
        }

        let product = self.catalog.product(product_id);
        let key = match &product {
            Some(product) => {
                let (size, color) = product.resolve_variant(size, color)?;
                CartKey::new(product.id.clone(), size, color)
            }
            None => CartKey::new(product_id.clone(), size.trim(), color.trim()),
        };

        let line = {
            let mut lines = lock::write(&self.lines);
            let line = match lines.entry(key) {
                Entry::Occupied(mut existing) => {
                    let line = existing.get_mut();
                    line.quantity = line.quantity.saturating_add(quantity);
                    line.clone()
                }
                Entry::Vacant(slot) => {
                    let Some(product) = &product else {
                        return Err(CartError::ProductNotFound(product_id.clone()));
                    };
                    let key = slot.key().clone();
                    slot.insert(CartLine {
                        key,
                        quantity,
                        snapshot: LineSnapshot::from(product),
                        added_at: Utc::now(),
                    })
                    .clone()
                }
            };
            self.persist(&lines);
            line
        };

        debug!(key = %line.key, quantity = line.quantity, "cart line added");
        self.events.changed(Collection::Cart);
        self.events.notify(Notification::success(
            "Adicionado ao carrinho",
            format!("{} foi adicionado ao carrinho.", line.snapshot.name),
        ));
        Ok(line)
    }

    /// Replace a line's quantity. Zero or less removes the line, exactly like
    /// [`remove_item`](Self::remove_item), so it is a no-op when absent.
    ///
    /// Returns the updated line, or `None` if it was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::LineNotFound`] for a positive quantity on a line
    /// the cart does not have.
    #[instrument(skip(self), fields(key = %key))]
    pub fn set_quantity(&self, key: &CartKey, quantity: i64) -> Result<Option<CartLine>, CartError> {
        if quantity <= 0 {
            self.remove_item(key);
            return Ok(None);
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let updated = {
            let mut lines = lock::write(&self.lines);
            let Some(line) = lines.get_mut(key) else {
                return Err(CartError::LineNotFound(key.clone()));
            };
            line.quantity = quantity;
            let updated = line.clone();
            self.persist(&lines);
            updated
        };

        self.events.changed(Collection::Cart);
        Ok(Some(updated))
    }

    /// Remove a line. Returns whether anything was removed.
    #[instrument(skip(self), fields(key = %key))]
    pub fn remove_item(&self, key: &CartKey) -> bool {
        let removed = {
            let mut lines = lock::write(&self.lines);
            let removed = lines.remove(key).is_some();
            if removed {
                self.persist(&lines);
            }
            removed
        };
        if removed {
            self.events.changed(Collection::Cart);
        }
        removed
    }

    /// Empty the cart.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        {
            let mut lines = lock::write(&self.lines);
            lines.clear();
            self.persist(&lines);
        }
        self.events.changed(Collection::Cart);
    }

    /// Sum of snapshot price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        lock::read(&self.lines).values().map(CartLine::line_total).sum()
    }

    /// Lines in the order they were first added.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        sorted(&lock::read(&self.lines))
    }

    /// The line for `key`, if any.
    #[must_use]
    pub fn line(&self, key: &CartKey) -> Option<CartLine> {
        lock::read(&self.lines).get(key).cloned()
    }

    /// Total number of units, for the cart badge.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        lock::read(&self.lines)
            .values()
            .fold(0, |count: u32, line| count.saturating_add(line.quantity))
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock::read(&self.lines).is_empty()
    }

    /// Totals with a flat shipping fee. Shipping is free for an empty cart.
    #[must_use]
    pub fn summary(&self, shipping: Price) -> CheckoutSummary {
        let lines = lock::read(&self.lines);
        summarize(&lines, shipping)
    }

    /// Complete the order: return the final totals and empty the cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::EmptyCart`] if there is nothing to check out.
    #[instrument(skip(self))]
    pub fn checkout(&self, shipping: Price) -> Result<CheckoutSummary, CartError> {
        let summary = {
            let mut lines = lock::write(&self.lines);
            if lines.is_empty() {
                return Err(CartError::EmptyCart);
            }
            let summary = summarize(&lines, shipping);
            lines.clear();
            self.persist(&lines);
            summary
        };

        info!(
            items = summary.item_count,
            total = summary.total.minor_units(),
            "order placed"
        );
        self.events.changed(Collection::Cart);
        self.events.notify(Notification::success(
            "Pedido realizado",
            format!("Pedido de {} confirmado.", summary.total),
        ));
        Ok(summary)
    }

    /// Called with the write lock held so saves land in mutation order.
    fn persist(&self, lines: &HashMap<CartKey, CartLine>) {
        if let Err(e) = self.persistence.save(Collection::Cart, &sorted(lines)) {
            warn!(error = %e, "failed to persist cart");
            self.events.notify(Notification::error(
                e.kind(),
                "Armazenamento indisponível",
                format!("O carrinho não pôde ser salvo localmente: {e}"),
            ));
        }
    }
}

fn sorted(lines: &HashMap<CartKey, CartLine>) -> Vec<CartLine> {
    let mut lines: Vec<CartLine> = lines.values().cloned().collect();
    lines.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.key.cmp(&b.key)));
    lines
}

fn summarize(lines: &HashMap<CartKey, CartLine>, shipping: Price) -> CheckoutSummary {
    let subtotal: Price = lines.values().map(CartLine::line_total).sum();
    let item_count = lines
        .values()
        .fold(0, |count: u32, line| count.saturating_add(line.quantity));
    let shipping = if lines.is_empty() { Price::ZERO } else { shipping };
    CheckoutSummary {
        subtotal,
        shipping,
        total: subtotal + shipping,
        item_count,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use kaline_core::{Discount, Severity};

    use super::*;
    use crate::events::{StoreEvent, drain};
    use crate::storage::MemoryStorage;
    use crate::testing::{memory_store, product};

    /// Mutable catalog stand-in.
    #[derive(Default)]
    struct Products(RwLock<HashMap<ProductId, Product>>);

    impl Products {
        fn with(products: Vec<Product>) -> Arc<Self> {
            let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
            Arc::new(Self(RwLock::new(map)))
        }

        fn set_price(&self, id: &str, minor: u64) {
            let mut products = self.0.write().unwrap();
            products.get_mut(&ProductId::new(id)).unwrap().price = Price::from_minor(minor);
        }
    }

    impl ProductLookup for Products {
        fn product(&self, id: &ProductId) -> Option<Product> {
            self.0.read().unwrap().get(id).cloned()
        }
    }

    fn catalog() -> Arc<Products> {
        Products::with(vec![
            product("p1", "Vestido", 1_000, &["P", "M"], &["Red", "Blue"]),
            product("bag", "Bolsa", 5_000, &[], &[]),
        ])
    }

    fn cart(catalog: Arc<Products>) -> (Arc<MemoryStorage>, CartStore) {
        let (storage, persistence) = memory_store();
        let cart = CartStore::open(catalog, persistence, EventBus::default());
        (storage, cart)
    }

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[test]
    fn test_same_variant_merges() {
        let (_, cart) = cart(catalog());
        cart.add_item(&id("p1"), "M", "Red", 1).unwrap();
        cart.add_item(&id("p1"), "M", "Red", 2).unwrap();

        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_different_variants_are_separate_lines() {
        let (_, cart) = cart(catalog());
        cart.add_item(&id("p1"), "M", "Red", 1).unwrap();
        cart.add_item(&id("p1"), "P", "Red", 1).unwrap();
        cart.add_item(&id("p1"), "M", "Blue", 1).unwrap();
        assert_eq!(cart.lines().len(), 3);
    }

    #[test]
    fn test_set_quantity_zero_empties_cart() {
        let (storage, cart) = cart(catalog());
        let line = cart.add_item(&id("p1"), "M", "Red", 1).unwrap();

        assert!(cart.set_quantity(&line.key, 0).unwrap().is_none());
        assert!(cart.is_empty());
        assert_eq!(storage.get_raw("cart").unwrap().trim(), "[]");

        let line = cart.add_item(&id("p1"), "M", "Red", 1).unwrap();
        assert!(cart.set_quantity(&line.key, -4).unwrap().is_none());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_zero_on_absent_line_is_noop() {
        let (storage, cart) = cart(catalog());
        let mut rx = cart.events.subscribe();
        let key = CartKey::new("p1", "M", "Red");

        assert!(cart.set_quantity(&key, 0).unwrap().is_none());
        assert!(cart.set_quantity(&key, -1).unwrap().is_none());
        assert!(cart.is_empty());
        assert!(storage.get_raw("cart").is_none());
        assert!(crate::events::drain(&mut rx).is_empty());
    }

    #[test]
    fn test_set_quantity_replaces() {
        let (_, cart) = cart(catalog());
        let line = cart.add_item(&id("p1"), "M", "Red", 1).unwrap();
        let updated = cart.set_quantity(&line.key, 5).unwrap().unwrap();
        assert_eq!(updated.quantity, 5);

        let missing = CartKey::new("p1", "G", "Red");
        assert!(matches!(
            cart.set_quantity(&missing, 1),
            Err(CartError::LineNotFound(_))
        ));
    }

    #[test]
    fn test_subtotal_uses_snapshot_price() {
        let catalog = catalog();
        let (_, cart) = cart(catalog.clone());
        cart.add_item(&id("p1"), "M", "Red", 2).unwrap();
        catalog.set_price("p1", 2_000);

        assert_eq!(cart.subtotal().minor_units(), 2_000);
        // New units of an existing line keep the original snapshot
        cart.add_item(&id("p1"), "M", "Red", 1).unwrap();
        assert_eq!(cart.subtotal().minor_units(), 3_000);
    }

    #[test]
    fn test_snapshot_captures_discounted_price() {
        let mut discounted = product("sale", "Promo", 10_000, &[], &[]);
        discounted.discount = Some(Discount::Percent(20));
        let (_, cart) = cart(Products::with(vec![discounted]));
        cart.add_item(&id("sale"), "", "", 1).unwrap();
        assert_eq!(cart.subtotal().minor_units(), 8_000);
    }

    #[test]
    fn test_variant_validation() {
        let (_, cart) = cart(catalog());
        assert!(matches!(
            cart.add_item(&id("p1"), "", "Red", 1),
            Err(CartError::Validation(ValidationError::SizeRequired(_)))
        ));
        assert!(matches!(
            cart.add_item(&id("p1"), "M", "Green", 1),
            Err(CartError::Validation(ValidationError::UnknownColor(_)))
        ));
        assert!(matches!(
            cart.add_item(&id("p1"), "M", "Red", 0),
            Err(CartError::Validation(ValidationError::ZeroQuantity))
        ));

        // Products without options ignore the selection
        let line = cart.add_item(&id("bag"), "M", "Red", 1).unwrap();
        assert_eq!(line.key, CartKey::new("bag", "", ""));
        assert!(cart.lines().iter().all(|l| l.key.product_id != id("p1")));
    }

    #[test]
    fn test_unknown_product() {
        let (_, cart) = cart(catalog());
        let err = cart.add_item(&id("ghost"), "", "", 1).unwrap_err();
        assert!(matches!(err, CartError::ProductNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_existing_line_survives_product_removal() {
        let catalog = catalog();
        let (_, cart) = cart(catalog.clone());
        cart.add_item(&id("bag"), "", "", 1).unwrap();
        catalog.0.write().unwrap().clear();

        let line = cart.add_item(&id("bag"), "", "", 1).unwrap();
        assert_eq!(line.quantity, 2);
    }

    #[test]
    fn test_remove_item_is_noop_when_absent() {
        let (_, cart) = cart(catalog());
        let line = cart.add_item(&id("bag"), "", "", 1).unwrap();
        assert!(!cart.remove_item(&CartKey::new("ghost", "", "")));
        assert!(cart.remove_item(&line.key));
        assert!(!cart.remove_item(&line.key));
    }

    #[test]
    fn test_summary_and_checkout() {
        let (storage, cart) = cart(catalog());
        let shipping = Price::from_minor(1_500);

        let empty = cart.summary(shipping);
        assert_eq!(empty.total, Price::ZERO);
        assert_eq!(empty.shipping, Price::ZERO);
        assert!(matches!(cart.checkout(shipping), Err(CartError::EmptyCart)));

        cart.add_item(&id("p1"), "M", "Red", 2).unwrap();
        cart.add_item(&id("bag"), "", "", 1).unwrap();
        let summary = cart.checkout(shipping).unwrap();
        assert_eq!(summary.subtotal.minor_units(), 7_000);
        assert_eq!(summary.shipping.minor_units(), 1_500);
        assert_eq!(summary.total.minor_units(), 8_500);
        assert_eq!(summary.item_count, 3);

        assert!(cart.is_empty());
        assert_eq!(storage.get_raw("cart").unwrap().trim(), "[]");
    }

    #[test]
    fn test_lines_keep_insertion_order() {
        let (_, cart) = cart(catalog());
        cart.add_item(&id("bag"), "", "", 1).unwrap();
        cart.add_item(&id("p1"), "M", "Red", 1).unwrap();
        cart.add_item(&id("bag"), "", "", 1).unwrap();
        let names: Vec<_> = cart.lines().into_iter().map(|l| l.snapshot.name).collect();
        assert_eq!(names, vec!["Bolsa", "Vestido"]);
    }

    #[test]
    fn test_persisted_cart_is_reloaded_and_repaired() {
        let (storage, persistence) = memory_store();
        storage.insert_raw(
            "cart",
            r#"[
                {"productId": "p1", "size": "M", "color": "Red", "quantity": 1, "name": "Vestido", "price": 1000},
                {"productId": "p1", "size": "M", "color": "Red", "quantity": 2, "name": "Vestido", "price": 1000},
                {"productId": "bag", "quantity": 0, "name": "Bolsa", "price": 5000},
                {"garbage": true}
            ]"#,
        );
        let cart = CartStore::open(catalog(), persistence, EventBus::default());
        let lines = cart.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 3);
        assert!(lines[0].snapshot.image.is_placeholder());
    }

    #[test]
    fn test_storage_failure_keeps_cart_and_warns_softly() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = PersistentStore::with_quota(storage, 16);
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let cart = CartStore::open(catalog(), persistence, events);

        cart.add_item(&id("bag"), "", "", 1).unwrap();
        assert_eq!(cart.item_count(), 1);

        let warning = drain(&mut rx)
            .into_iter()
            .find_map(|e| match e {
                StoreEvent::Notice(n) if n.cause == Some(ErrorKind::Storage) => Some(n),
                _ => None,
            })
            .unwrap();
        assert_eq!(warning.severity, Some(Severity::Soft));
    }
}
