//! Test doubles shared by the unit tests.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use kaline_core::{ImageRef, Product, ProductDraft, ProductId};
use tokio::sync::oneshot;

use crate::catalog::CatalogStore;
use crate::config::ImageConfig;
use crate::events::EventBus;
use crate::image::ImageMaterializer;
use crate::remote::{CatalogRemote, RemoteError, SyncRequest};
use crate::storage::{MemoryStorage, PersistentStore};

/// In-process remote that records requests.
///
/// Calls succeed unless [`FakeRemote::set_failing`] is on. A pushed gate makes
/// the next call wait until the test resolves it: `true` accepts, `false` or a
/// dropped sender rejects.
#[derive(Debug, Default)]
pub struct FakeRemote {
    failing: AtomicBool,
    requests: Mutex<Vec<SyncRequest>>,
    gates: Mutex<VecDeque<oneshot::Receiver<bool>>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold the next call until the returned sender resolves it.
    #[allow(clippy::unwrap_used)]
    pub fn gate_next(&self) -> oneshot::Sender<bool> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().push_back(rx);
        tx
    }

    #[allow(clippy::unwrap_used)]
    pub fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().unwrap().clone()
    }

    #[allow(clippy::unwrap_used)]
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Yield until at least `n` calls have been made.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

impl CatalogRemote for FakeRemote {
    #[allow(clippy::unwrap_used)]
    async fn sync(&self, request: SyncRequest) -> Result<(), RemoteError> {
        let gate = self.gates.lock().unwrap().pop_front();
        self.requests.lock().unwrap().push(request);

        let accepted = match gate {
            Some(gate) => gate.await.unwrap_or(false),
            None => !self.failing.load(Ordering::SeqCst),
        };
        if accepted {
            Ok(())
        } else {
            Err(RemoteError::Rejected(Some("offline".to_string())))
        }
    }
}

#[allow(clippy::unwrap_used)]
pub fn images() -> Arc<ImageMaterializer> {
    Arc::new(ImageMaterializer::new(&ImageConfig::default()).unwrap())
}

pub fn memory_store() -> (Arc<MemoryStorage>, PersistentStore) {
    let storage = Arc::new(MemoryStorage::new());
    let store = PersistentStore::new(storage.clone());
    (storage, store)
}

/// Catalog over a fresh memory store, pre-filled with `products`.
#[allow(clippy::unwrap_used)]
pub fn catalog_with(
    remote: Arc<FakeRemote>,
    events: EventBus,
    products: &[Product],
) -> (Arc<MemoryStorage>, Arc<CatalogStore<Arc<FakeRemote>>>) {
    let (storage, persistence) = memory_store();
    persistence.save(kaline_core::Collection::Products, products).unwrap();
    let catalog = CatalogStore::load(remote, images(), persistence, events);
    (storage, Arc::new(catalog))
}

/// A product with an embedded image and the given options.
pub fn product(id: &str, name: &str, price: u64, sizes: &[&str], colors: &[&str]) -> Product {
    let mut product = ProductDraft {
        name: name.to_string(),
        category: "Vestidos".to_string(),
        sizes: sizes.iter().map(ToString::to_string).collect(),
        colors: colors.iter().map(ToString::to_string).collect(),
        ..ProductDraft::default()
    }
    .into_product(ProductId::new(id), ImageRef::placeholder(), Utc::now());
    product.price = kaline_core::Price::from_minor(price);
    product
}
