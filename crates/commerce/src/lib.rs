//! Kaline commerce engine.
//!
//! Owns the product catalog, the shopping cart and the favorites set, keeps
//! them durable across restarts, and reconciles optimistic local writes with
//! the remote catalog service.
//!
//! # Architecture
//!
//! - [`Commerce`] is constructed once per session and owns every store
//! - [`CatalogStore`] applies writes optimistically and confirms or rolls them
//!   back when the remote call resolves
//! - [`CartStore`] and [`FavoritesStore`] are local-only and write through to
//!   the [`PersistentStore`] on every mutation
//! - [`ImageMaterializer`] turns remote image URLs into embedded `data:` URIs
//! - Everything user-visible goes out on the [`EventBus`]
//!
//! # Example
//!
//! ```rust,ignore
//! use kaline_commerce::{Commerce, CommerceConfig};
//!
//! let commerce = Commerce::open(&CommerceConfig::from_env()?).await?;
//!
//! let product = commerce.catalog().get_by_id("3").expect("seeded");
//! commerce.cart().add_item(&product.id, "M", "Terracota", 1)?;
//! println!("{}", commerce.cart().subtotal());
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod events;
pub mod favorites;
pub mod image;
pub mod remote;
pub mod seed;
pub mod session;
pub mod storage;

mod lock;
#[cfg(test)]
mod testing;

pub use cart::{CartError, CartStore, CheckoutSummary, ProductLookup};
pub use catalog::{CatalogError, CatalogStore, RemoveOutcome, SyncState};
pub use config::{CommerceConfig, ConfigError, ImageConfig, LogFormat, RemoteConfig};
pub use error::CommerceError;
pub use events::{EventBus, StoreEvent, drain};
pub use favorites::FavoritesStore;
pub use image::ImageMaterializer;
pub use remote::{CatalogRemote, HttpCatalogRemote, RemoteError, SyncAction, SyncRequest};
pub use seed::{SeedError, SeedProduct};
pub use session::{Commerce, CommerceBuilder, SeedSource};
pub use storage::{FileStorage, MemoryStorage, PersistentStore, Storage, StorageError};
