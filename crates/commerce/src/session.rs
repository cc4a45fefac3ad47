//! Commerce session: one explicitly constructed owner for every store.
//!
//! A [`Commerce`] is built once per session and handed to whatever drives it.
//! The catalog is shared with the cart through [`ProductLookup`], so the cart
//! can snapshot products without owning the catalog.

use std::path::PathBuf;
use std::sync::Arc;

use kaline_core::{Collection, Price, Product};
use tracing::info;

use crate::cart::{CartError, CartStore, CheckoutSummary, ProductLookup};
use crate::catalog::CatalogStore;
use crate::config::{CommerceConfig, DEFAULT_SHIPPING, ImageConfig};
use crate::error::CommerceError;
use crate::events::{EventBus, StoreEvent};
use crate::favorites::FavoritesStore;
use crate::image::ImageMaterializer;
use crate::remote::{CatalogRemote, HttpCatalogRemote};
use crate::seed::SeedProduct;
use crate::storage::{DEFAULT_QUOTA_BYTES, FileStorage, MemoryStorage, PersistentStore, Storage};

/// Where first-run catalog contents come from.
#[derive(Debug, Clone, Default)]
pub enum SeedSource {
    /// Start with an empty catalog.
    #[default]
    None,
    /// The feed bundled with the crate.
    Bundled,
    /// A feed file.
    Path(PathBuf),
    /// Records supplied directly.
    Records(Vec<SeedProduct>),
}

impl SeedSource {
    fn records(self) -> Result<Vec<SeedProduct>, CommerceError> {
        Ok(match self {
            Self::None => Vec::new(),
            Self::Bundled => SeedProduct::bundled()?,
            Self::Path(path) => SeedProduct::from_path(&path)?,
            Self::Records(records) => records,
        })
    }
}

/// A commerce session.
pub struct Commerce<R = HttpCatalogRemote> {
    events: EventBus,
    catalog: Arc<CatalogStore<R>>,
    cart: CartStore,
    favorites: FavoritesStore,
    shipping: Price,
}

impl<R> std::fmt::Debug for Commerce<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Commerce")
            .field("catalog", &self.catalog)
            .field("cart", &self.cart)
            .field("favorites", &self.favorites)
            .field("shipping", &self.shipping)
            .finish_non_exhaustive()
    }
}

impl Commerce<HttpCatalogRemote> {
    /// Open the default stack: HTTP remote, file storage in the data directory,
    /// and the configured (or bundled) seed feed on first run.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the seed feed
    /// cannot be read.
    pub async fn open(config: &CommerceConfig) -> Result<Self, CommerceError> {
        let remote = HttpCatalogRemote::new(&config.remote)?;
        let seed = config
            .seed_path
            .clone()
            .map_or(SeedSource::Bundled, SeedSource::Path);

        CommerceBuilder::new(remote)
            .storage(Arc::new(FileStorage::new(&config.data_dir)))
            .images(ImageMaterializer::new(&config.images)?)
            .quota_bytes(config.storage_quota_bytes)
            .shipping(config.shipping)
            .seed(seed)
            .build()
            .await
    }
}

impl<R: CatalogRemote> Commerce<R> {
    /// Start building a session around `remote`.
    #[must_use]
    pub fn builder(remote: R) -> CommerceBuilder<R> {
        CommerceBuilder::new(remote)
    }

    /// Open a session over explicit parts with default limits and no seed.
    ///
    /// # Errors
    ///
    /// See [`CommerceBuilder::build`].
    pub async fn with_parts(
        remote: R,
        storage: Arc<dyn Storage>,
        images: ImageMaterializer,
    ) -> Result<Self, CommerceError> {
        CommerceBuilder::new(remote)
            .storage(storage)
            .images(images)
            .build()
            .await
    }

    /// The product catalog.
    #[must_use]
    pub fn catalog(&self) -> &CatalogStore<R> {
        &self.catalog
    }

    /// The shopping cart.
    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    /// The favorites set.
    #[must_use]
    pub const fn favorites(&self) -> &FavoritesStore {
        &self.favorites
    }

    /// Subscribe to notifications and change signals.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// The flat shipping fee.
    #[must_use]
    pub const fn shipping(&self) -> Price {
        self.shipping
    }

    /// Cart totals with this session's shipping fee.
    #[must_use]
    pub fn summary(&self) -> CheckoutSummary {
        self.cart.summary(self.shipping)
    }

    /// Check the cart out with this session's shipping fee.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::EmptyCart`] if the cart is empty.
    pub fn checkout(&self) -> Result<CheckoutSummary, CartError> {
        self.cart.checkout(self.shipping)
    }

    /// Favorited products that still exist in the catalog, sorted by id.
    #[must_use]
    pub fn favorite_products(&self) -> Vec<Product> {
        self.favorites
            .ids()
            .iter()
            .filter_map(|id| self.catalog.product(id))
            .collect()
    }

    /// End the session. State is already durable; this only logs.
    pub fn close(self) {
        info!(
            products = self.catalog.len(),
            cart_lines = self.cart.lines().len(),
            favorites = self.favorites.len(),
            "commerce session closed"
        );
    }
}

/// Builder for [`Commerce`].
pub struct CommerceBuilder<R> {
    remote: R,
    storage: Option<Arc<dyn Storage>>,
    images: Option<ImageMaterializer>,
    seed: SeedSource,
    shipping: Price,
    quota_bytes: usize,
}

impl<R: CatalogRemote> CommerceBuilder<R> {
    /// Defaults: in-memory storage, default image limits, no seed, R$ 15,00 shipping.
    #[must_use]
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            storage: None,
            images: None,
            seed: SeedSource::None,
            shipping: DEFAULT_SHIPPING,
            quota_bytes: DEFAULT_QUOTA_BYTES,
        }
    }

    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn images(mut self, images: ImageMaterializer) -> Self {
        self.images = Some(images);
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: SeedSource) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn shipping(mut self, shipping: Price) -> Self {
        self.shipping = shipping;
        self
    }

    #[must_use]
    pub fn quota_bytes(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    /// Load persisted state, seeding the catalog on first run.
    ///
    /// First run means nothing was ever stored under the products key. A
    /// persisted empty list is a catalog whose products were all removed,
    /// and stays empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the default image client cannot be built or the
    /// seed feed cannot be read. Unreadable persisted state is not an error.
    pub async fn build(self) -> Result<Commerce<R>, CommerceError> {
        let events = EventBus::default();
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));
        let persistence = PersistentStore::with_quota(storage, self.quota_bytes);
        let images = match self.images {
            Some(images) => images,
            None => ImageMaterializer::new(&ImageConfig::default())?,
        };

        let first_run = !persistence.exists(Collection::Products);
        let catalog = Arc::new(CatalogStore::load(
            self.remote,
            Arc::new(images),
            persistence.clone(),
            events.clone(),
        ));
        if first_run {
            catalog.ingest_seed(self.seed.records()?).await;
        } else {
            catalog.repair_images().await;
        }

        let lookup: Arc<dyn ProductLookup> = catalog.clone();
        let cart = CartStore::open(lookup, persistence.clone(), events.clone());
        let favorites = FavoritesStore::open(persistence, events.clone());

        info!(
            products = catalog.len(),
            cart_lines = cart.lines().len(),
            favorites = favorites.len(),
            "commerce session opened"
        );

        Ok(Commerce {
            events,
            catalog,
            cart,
            favorites,
            shipping: self.shipping,
        })
    }
}
