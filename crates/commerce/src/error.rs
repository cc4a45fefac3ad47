//! Umbrella error for the commerce engine.
//!
//! Each store returns its own error type; `CommerceError` unifies them for
//! callers that drive several stores, such as the CLI.

use kaline_core::{ErrorKind, ValidationError};
use thiserror::Error;

use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::seed::SeedError;
use crate::storage::StorageError;

/// Any error the commerce engine can return.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// Catalog operation failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Cart operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Durable storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Remote catalog service failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration is missing or invalid.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Seed feed could not be read.
    #[error("Seed error: {0}")]
    Seed(#[from] SeedError),

    /// Input rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl CommerceError {
    /// Taxonomy classification, where one applies.
    ///
    /// Configuration, seed and client construction errors are startup
    /// failures outside the runtime taxonomy.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Catalog(e) => Some(e.kind()),
            Self::Cart(e) => Some(e.kind()),
            Self::Storage(e) => Some(e.kind()),
            Self::Remote(e) => Some(e.kind()),
            Self::Validation(_) => Some(ErrorKind::Validation),
            Self::Config(_) | Self::Seed(_) | Self::Client(_) => None,
        }
    }
}
