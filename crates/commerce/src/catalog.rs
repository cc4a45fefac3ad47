//! Product catalog with optimistic remote sync.
//!
//! # Write path
//!
//! Every `add` and `update` is applied to memory first, then propagated to the
//! remote catalog service. Each record carries a version that is bumped on
//! every optimistic write; when the remote call resolves, the outcome is only
//! applied if the record still exists and no newer write has superseded it:
//!
//! ```text
//! Idle ──write──> OptimisticallyApplied ──ok──> Confirmed
//!                                      └─err──> RolledBack
//! ```
//!
//! Only remote-confirmed state is persisted. Removals are the exception: they
//! are committed locally right away and never restored, even if the remote
//! call fails.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use kaline_core::{
    Collection, ErrorKind, ImageRef, Notification, Product, ProductDraft, ProductId, ProductPatch,
    Severity, ValidationError,
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::cart::ProductLookup;
use crate::events::EventBus;
use crate::image::ImageMaterializer;
use crate::lock;
use crate::remote::{CatalogRemote, HttpCatalogRemote, RemoteError, SyncRequest};
use crate::seed::SeedProduct;
use crate::storage::{PersistentStore, StorageError};

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("product not found: {0}")]
    NotFound(String),

    #[error("remote sync failed: {0}")]
    RemoteSync(#[from] RemoteError),
}

impl CatalogError {
    /// Taxonomy classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RemoteSync(_) => ErrorKind::RemoteSync,
        }
    }
}

/// Remote reconciliation state of a record's latest write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Loaded from storage or seed, no write in flight.
    Idle,
    /// Visible locally, remote call pending.
    OptimisticallyApplied,
    /// The remote accepted the latest write.
    Confirmed,
    /// The remote refused the latest write and it was undone.
    RolledBack,
}

/// Result of [`CatalogStore::remove`].
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveOutcome {
    /// The record that was removed.
    pub product: Product,
    /// Whether the remote acknowledged the removal.
    pub remote_confirmed: bool,
}

#[derive(Debug)]
struct Entry {
    product: Product,
    version: u64,
    state: SyncState,
    /// Latest remote-confirmed (or loaded) state and the version it belongs to.
    committed: Option<(u64, Product)>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<Entry>,
    next_version: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Exact identifier match first, then a legacy-form match.
    fn position(&self, query: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.product.id.as_str() == query)
            .or_else(|| {
                self.entries
                    .iter()
                    .position(|e| e.product.id.matches_legacy(query))
            })
    }

    fn exact_mut(&mut self, id: &ProductId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| &e.product.id == id)
    }

    fn committed(&self) -> Vec<&Product> {
        self.entries
            .iter()
            .filter_map(|e| e.committed.as_ref().map(|(_, p)| p))
            .collect()
    }
}

/// The product catalog.
pub struct CatalogStore<R = HttpCatalogRemote> {
    inner: RwLock<Inner>,
    remote: R,
    images: Arc<ImageMaterializer>,
    persistence: PersistentStore,
    events: EventBus,
}

impl<R> std::fmt::Debug for CatalogStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("products", &lock::read(&self.inner).entries.len())
            .finish_non_exhaustive()
    }
}

impl<R: CatalogRemote> CatalogStore<R> {
    /// Load the persisted catalog. Nothing is fetched or seeded here.
    pub fn load(
        remote: R,
        images: Arc<ImageMaterializer>,
        persistence: PersistentStore,
        events: EventBus,
    ) -> Self {
        let mut inner = Inner::default();
        let mut seen = HashSet::new();
        for product in persistence.load::<Product>(Collection::Products) {
            if !seen.insert(product.id.clone()) {
                warn!(product_id = %product.id, "skipping duplicate persisted product");
                continue;
            }
            let version = inner.bump();
            inner.entries.push(Entry {
                committed: Some((version, product.clone())),
                product,
                version,
                state: SyncState::Idle,
            });
        }
        info!(products = inner.entries.len(), "catalog loaded");

        Self {
            inner: RwLock::new(inner),
            remote,
            images,
            persistence,
            events,
        }
    }

    /// Ingest a seed feed into an empty catalog.
    ///
    /// Images are materialized and prices normalized. Records that fail
    /// validation or repeat an identifier are skipped. Seeded records are
    /// local-only and committed immediately. Returns the number ingested;
    /// zero if the catalog already has products.
    #[instrument(skip(self, seed), fields(records = seed.len()))]
    pub async fn ingest_seed(&self, seed: Vec<SeedProduct>) -> usize {
        if !self.is_empty() {
            debug!("catalog not empty, skipping seed");
            return 0;
        }

        let mut seen = HashSet::new();
        let mut products = Vec::with_capacity(seed.len());
        for record in seed {
            if let Err(e) = record.draft.validate() {
                warn!(name = %record.draft.name, error = %e, "skipping invalid seed record");
                continue;
            }
            if let Some(id) = &record.id
                && !seen.insert(id.clone())
            {
                warn!(product_id = %id, "skipping duplicate seed record");
                continue;
            }
            let image = self.images.materialize(&record.image()).await;
            products.push(record.into_product(image, Utc::now()));
        }

        let count = {
            let mut inner = lock::write(&self.inner);
            if !inner.entries.is_empty() {
                return 0;
            }
            for product in products {
                let version = inner.bump();
                inner.entries.push(Entry {
                    committed: Some((version, product.clone())),
                    product,
                    version,
                    state: SyncState::Idle,
                });
            }
            self.persist(&inner);
            inner.entries.len()
        };

        self.events.changed(Collection::Products);
        info!(count, "seed ingested");
        count
    }

    /// Re-materialize any persisted image that is not embedded content yet.
    ///
    /// Returns the number of records repaired.
    #[instrument(skip(self))]
    pub async fn repair_images(&self) -> usize {
        let pending: Vec<(ProductId, ImageRef)> = lock::read(&self.inner)
            .entries
            .iter()
            .filter(|e| !e.product.image.is_embedded())
            .map(|e| (e.product.id.clone(), e.product.image.clone()))
            .collect();
        if pending.is_empty() {
            return 0;
        }

        let mut resolved = Vec::with_capacity(pending.len());
        for (id, original) in pending {
            let image = self.images.materialize(&original).await;
            resolved.push((id, original, image));
        }

        let mut repaired = 0;
        {
            let mut inner = lock::write(&self.inner);
            for (id, original, image) in resolved {
                // Skip records removed or rewritten while we were fetching
                let Some(entry) = inner.exact_mut(&id) else {
                    continue;
                };
                if entry.product.image != original {
                    continue;
                }
                entry.product.image = image.clone();
                if let Some((_, committed)) = entry.committed.as_mut()
                    && committed.image == original
                {
                    committed.image = image;
                }
                repaired += 1;
            }
            if repaired > 0 {
                self.persist(&inner);
            }
        }

        if repaired > 0 {
            self.events.changed(Collection::Products);
            info!(repaired, "repaired product images");
        }
        repaired
    }

    /// Create a product.
    ///
    /// The product is visible immediately. If the remote refuses it, it is
    /// removed again, a single error notification is emitted and the failure
    /// is returned.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for an invalid draft (no state
    /// change) or [`CatalogError::RemoteSync`] if the remote refused it.
    #[instrument(skip(self, draft), fields(product_id = tracing::field::Empty, version = tracing::field::Empty))]
    pub async fn add(&self, draft: ProductDraft) -> Result<Product, CatalogError> {
        draft.validate()?;

        let id = ProductId::generate();
        let image = self.images.materialize_str(&draft.image).await;
        let product = draft.into_product(id, image, Utc::now());

        let version = {
            let mut inner = lock::write(&self.inner);
            let version = inner.bump();
            inner.entries.push(Entry {
                product: product.clone(),
                version,
                state: SyncState::OptimisticallyApplied,
                committed: None,
            });
            version
        };
        let span = tracing::Span::current();
        span.record("product_id", product.id.as_str());
        span.record("version", version);
        self.events.changed(Collection::Products);
        debug!("optimistically added");

        match self.remote.sync(SyncRequest::add(&product)).await {
            Ok(()) => {
                self.confirm(&product, version);
                info!("product added");
                self.events.notify(Notification::success(
                    "Produto adicionado",
                    format!("{} foi adicionado ao catálogo.", product.name),
                ));
                Ok(product)
            }
            Err(e) => {
                error!(error = %e, "add failed to sync, rolling back");
                let rolled_back = {
                    let mut inner = lock::write(&self.inner);
                    let current = inner
                        .entries
                        .iter()
                        .position(|entry| entry.product.id == product.id && entry.version == version);
                    current.map(|index| inner.entries.remove(index)).is_some()
                };
                if rolled_back {
                    self.events.changed(Collection::Products);
                }
                self.events.notify(
                    Notification::error(
                        ErrorKind::RemoteSync,
                        "Erro ao adicionar produto",
                        format!("{} não foi salvo: {e}", product.name),
                    )
                    .with_severity(Severity::Destructive),
                );
                Err(CatalogError::RemoteSync(e))
            }
        }
    }

    /// Apply a partial update.
    ///
    /// If the remote refuses it, the record is restored to its pre-update
    /// state, unless a newer write has superseded it in the meantime.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] for an invalid patch,
    /// [`CatalogError::NotFound`] if no product matches `id`, or
    /// [`CatalogError::RemoteSync`] if the remote refused it.
    #[instrument(skip(self, patch), fields(version = tracing::field::Empty))]
    pub async fn update(&self, id: &str, patch: ProductPatch) -> Result<Product, CatalogError> {
        patch.validate()?;
        if self.get_by_id(id).is_none() {
            return Err(CatalogError::NotFound(id.to_string()));
        }

        let image = match &patch.image {
            Some(reference) => Some(self.images.materialize_str(reference).await),
            None => None,
        };

        let (previous, updated, version) = {
            let mut inner = lock::write(&self.inner);
            let version = inner.bump();
            // Removed while the image was resolving
            let index = inner
                .position(id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
            let Some(entry) = inner.entries.get_mut(index) else {
                return Err(CatalogError::NotFound(id.to_string()));
            };
            let previous = entry.product.clone();
            patch.apply_to(&mut entry.product, image, Utc::now());
            entry.version = version;
            entry.state = SyncState::OptimisticallyApplied;
            (previous, entry.product.clone(), version)
        };
        tracing::Span::current().record("version", version);
        self.events.changed(Collection::Products);
        debug!(product_id = %updated.id, "optimistically updated");

        match self.remote.sync(SyncRequest::update(&updated)).await {
            Ok(()) => {
                self.confirm(&updated, version);
                info!(product_id = %updated.id, "product updated");
                self.events.notify(Notification::success(
                    "Produto atualizado",
                    format!("{} foi atualizado.", updated.name),
                ));
                Ok(updated)
            }
            Err(e) => {
                error!(product_id = %updated.id, error = %e, "update failed to sync, rolling back");
                let rolled_back = {
                    let mut inner = lock::write(&self.inner);
                    match inner.exact_mut(&updated.id) {
                        Some(entry) if entry.version == version => {
                            entry.product = previous;
                            entry.state = SyncState::RolledBack;
                            true
                        }
                        _ => false,
                    }
                };
                if rolled_back {
                    self.events.changed(Collection::Products);
                } else {
                    debug!(product_id = %updated.id, "superseded, not rolling back");
                }
                self.events.notify(
                    Notification::error(
                        ErrorKind::RemoteSync,
                        "Erro ao atualizar produto",
                        format!("As alterações em {} foram desfeitas: {e}", updated.name),
                    )
                    .with_severity(Severity::Destructive),
                );
                Err(CatalogError::RemoteSync(e))
            }
        }
    }

    /// Remove a product.
    ///
    /// The removal is committed locally before the remote is contacted and is
    /// kept even if the remote call fails; that failure is reported through a
    /// warning notification and [`RemoveOutcome::remote_confirmed`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no product matches `id`.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<RemoveOutcome, CatalogError> {
        let product = {
            let mut inner = lock::write(&self.inner);
            let index = inner
                .position(id)
                .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
            let entry = inner.entries.remove(index);
            self.persist(&inner);
            entry.product
        };
        self.events.changed(Collection::Products);
        info!(product_id = %product.id, "product removed locally");

        let remote_confirmed = match self.remote.sync(SyncRequest::remove(&product.id)).await {
            Ok(()) => {
                self.events.notify(Notification::success(
                    "Produto removido",
                    format!("{} foi removido do catálogo.", product.name),
                ));
                true
            }
            Err(e) => {
                warn!(product_id = %product.id, error = %e, "remove failed to sync, keeping local removal");
                self.events.notify(Notification::error(
                    ErrorKind::RemoteSync,
                    "Remoção não sincronizada",
                    format!(
                        "{} foi removido localmente, mas o servidor não confirmou: {e}",
                        product.name
                    ),
                ));
                false
            }
        };

        Ok(RemoveOutcome {
            product,
            remote_confirmed,
        })
    }

    /// Forget every product and delete the stored catalog, so the next
    /// session starts from the seed feed again. Nothing is sent to the remote.
    /// Returns the number of products dropped.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the stored catalog cannot be deleted; the
    /// in-memory catalog is left untouched in that case.
    #[instrument(skip(self))]
    pub fn reset(&self) -> Result<usize, StorageError> {
        let count = {
            let mut inner = lock::write(&self.inner);
            self.persistence.clear(Collection::Products)?;
            let count = inner.entries.len();
            inner.entries.clear();
            count
        };
        self.events.changed(Collection::Products);
        info!(count, "catalog reset");
        Ok(count)
    }

    fn confirm(&self, product: &Product, version: u64) {
        let mut inner = lock::write(&self.inner);
        let Some(entry) = inner.exact_mut(&product.id) else {
            debug!(product_id = %product.id, "confirmed record no longer exists");
            return;
        };
        if entry
            .committed
            .as_ref()
            .is_none_or(|(committed, _)| *committed < version)
        {
            entry.committed = Some((version, product.clone()));
        }
        if entry.version == version {
            entry.state = SyncState::Confirmed;
        }
        self.persist(&inner);
    }

    /// Write committed state. Called with the write lock held so saves land in
    /// the same order as the changes they capture.
    fn persist(&self, inner: &Inner) {
        if let Err(e) = self.persistence.save(Collection::Products, &inner.committed()) {
            warn!(error = %e, "failed to persist catalog");
            self.events.notify(Notification::error(
                e.kind(),
                "Armazenamento indisponível",
                format!("O catálogo não pôde ser salvo localmente: {e}"),
            ));
        }
    }
}

impl<R> CatalogStore<R> {
    /// Look a product up by identifier, accepting legacy identifier forms.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Product> {
        let inner = lock::read(&self.inner);
        inner
            .position(id)
            .and_then(|index| inner.entries.get(index))
            .map(|e| e.product.clone())
    }

    /// Products whose category matches `name`, ignoring case.
    #[must_use]
    pub fn get_by_category(&self, name: &str) -> Vec<Product> {
        let name = name.to_lowercase();
        self.collect(|p| p.category.to_lowercase() == name)
    }

    /// Every product, in insertion order.
    #[must_use]
    pub fn products(&self) -> Vec<Product> {
        self.collect(|_| true)
    }

    /// Products whose name or category contains `term`, ignoring case.
    /// An empty term matches everything.
    #[must_use]
    pub fn search(&self, term: &str) -> Vec<Product> {
        let term = term.trim().to_lowercase();
        self.collect(|p| {
            term.is_empty()
                || p.name.to_lowercase().contains(&term)
                || p.category.to_lowercase().contains(&term)
        })
    }

    /// Products offering any of `sizes` and any of `colors`.
    /// An empty selection does not constrain.
    #[must_use]
    pub fn filter(&self, sizes: &[String], colors: &[String]) -> Vec<Product> {
        self.collect(|p| {
            (sizes.is_empty() || p.sizes.iter().any(|s| sizes.contains(s)))
                && (colors.is_empty() || p.colors.iter().any(|c| colors.contains(c)))
        })
    }

    /// Distinct sizes across the catalog, in first-seen order.
    #[must_use]
    pub fn available_sizes(&self) -> Vec<String> {
        self.distinct(|p| p.sizes.as_slice())
    }

    /// Distinct colors across the catalog, in first-seen order.
    #[must_use]
    pub fn available_colors(&self) -> Vec<String> {
        self.distinct(|p| p.colors.as_slice())
    }

    /// Up to `limit` other products in the same category as `id`.
    #[must_use]
    pub fn related(&self, id: &str, limit: usize) -> Vec<Product> {
        let Some(product) = self.get_by_id(id) else {
            return Vec::new();
        };
        let category = product.category.to_lowercase();
        lock::read(&self.inner)
            .entries
            .iter()
            .map(|e| &e.product)
            .filter(|p| p.id != product.id && p.category.to_lowercase() == category)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Reconciliation state of the record matching `id`.
    #[must_use]
    pub fn sync_state(&self, id: &str) -> Option<SyncState> {
        let inner = lock::read(&self.inner);
        inner
            .position(id)
            .and_then(|index| inner.entries.get(index))
            .map(|e| e.state)
    }

    /// Number of products.
    #[must_use]
    pub fn len(&self) -> usize {
        lock::read(&self.inner).entries.len()
    }

    /// Whether the catalog has no products.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect(&self, predicate: impl Fn(&Product) -> bool) -> Vec<Product> {
        lock::read(&self.inner)
            .entries
            .iter()
            .map(|e| &e.product)
            .filter(|p| predicate(p))
            .cloned()
            .collect()
    }

    fn distinct(&self, options: impl Fn(&Product) -> &[String]) -> Vec<String> {
        let inner = lock::read(&self.inner);
        let mut seen = HashSet::new();
        inner
            .entries
            .iter()
            .flat_map(|e| options(&e.product).iter())
            .filter(|option| seen.insert(option.as_str()))
            .cloned()
            .collect()
    }
}

impl<R: Send + Sync> ProductLookup for CatalogStore<R> {
    fn product(&self, id: &ProductId) -> Option<Product> {
        self.get_by_id(id.as_str())
    }
}
