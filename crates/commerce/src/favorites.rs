//! Favorited products.

use std::collections::HashSet;
use std::sync::RwLock;

use kaline_core::{Collection, Notification, ProductId};
use tracing::{debug, instrument, warn};

use crate::events::EventBus;
use crate::lock;
use crate::storage::PersistentStore;

/// The set of favorited product identifiers.
pub struct FavoritesStore {
    ids: RwLock<HashSet<ProductId>>,
    persistence: PersistentStore,
    events: EventBus,
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore")
            .field("ids", &lock::read(&self.ids).len())
            .finish_non_exhaustive()
    }
}

impl FavoritesStore {
    /// Load the persisted favorites.
    pub fn open(persistence: PersistentStore, events: EventBus) -> Self {
        let ids: HashSet<ProductId> = persistence
            .load::<ProductId>(Collection::Favorites)
            .into_iter()
            .collect();
        debug!(count = ids.len(), "favorites loaded");
        Self {
            ids: RwLock::new(ids),
            persistence,
            events,
        }
    }

    /// Add `id` if absent, remove it if present. Returns the new membership.
    #[instrument(skip(self, id), fields(product_id = %id))]
    pub fn toggle(&self, id: &ProductId) -> bool {
        let favorite = {
            let mut ids = lock::write(&self.ids);
            let favorite = if ids.remove(id) {
                false
            } else {
                ids.insert(id.clone());
                true
            };
            self.persist(&ids);
            favorite
        };

        debug!(favorite, "favorite toggled");
        self.events.changed(Collection::Favorites);
        self.events.notify(if favorite {
            Notification::success("Favoritado", "Produto adicionado aos favoritos.")
        } else {
            Notification::info("Removido dos favoritos", "Produto removido dos favoritos.")
        });
        favorite
    }

    /// Whether `id` is favorited.
    #[must_use]
    pub fn is_favorite(&self, id: &ProductId) -> bool {
        lock::read(&self.ids).contains(id)
    }

    /// Favorited identifiers, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ProductId> {
        sorted(&lock::read(&self.ids))
    }

    /// Number of favorites.
    #[must_use]
    pub fn len(&self) -> usize {
        lock::read(&self.ids).len()
    }

    /// Whether nothing is favorited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, ids: &HashSet<ProductId>) {
        if let Err(e) = self.persistence.save(Collection::Favorites, &sorted(ids)) {
            warn!(error = %e, "failed to persist favorites");
            self.events.notify(Notification::error(
                e.kind(),
                "Armazenamento indisponível",
                format!("Os favoritos não puderam ser salvos localmente: {e}"),
            ));
        }
    }
}

fn sorted(ids: &HashSet<ProductId>) -> Vec<ProductId> {
    let mut ids: Vec<ProductId> = ids.iter().cloned().collect();
    ids.sort();
    ids
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::memory_store;

    #[test]
    fn test_toggle_twice_restores_membership() {
        let (_, persistence) = memory_store();
        let favorites = FavoritesStore::open(persistence, EventBus::default());
        let id = ProductId::new("3");

        assert!(!favorites.is_favorite(&id));
        assert!(favorites.toggle(&id));
        assert!(favorites.is_favorite(&id));
        assert!(!favorites.toggle(&id));
        assert!(!favorites.is_favorite(&id));
        assert!(favorites.is_empty());
    }

    #[test]
    fn test_favorites_persist_sorted() {
        let (storage, persistence) = memory_store();
        let favorites = FavoritesStore::open(persistence.clone(), EventBus::default());
        favorites.toggle(&ProductId::new("9"));
        favorites.toggle(&ProductId::new("3"));

        let stored: Vec<String> = serde_json::from_str(&storage.get_raw("favorites").unwrap()).unwrap();
        assert_eq!(stored, vec!["3", "9"]);

        let reopened = FavoritesStore::open(persistence, EventBus::default());
        assert_eq!(reopened.ids(), vec![ProductId::new("3"), ProductId::new("9")]);
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_corrupted_favorites_load_empty() {
        let (storage, persistence) = memory_store();
        storage.insert_raw("favorites", "\"3\",\"9\"");
        let favorites = FavoritesStore::open(persistence, EventBus::default());
        assert!(favorites.is_empty());
    }
}
