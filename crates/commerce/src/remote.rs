//! Remote catalog service client.
//!
//! The service accepts `POST {"action": "add" | "update" | "remove", "payload": ...}`
//! and answers `{"success": bool, "message"?: string}`. Anything other than a
//! 2xx response with `success: true` counts as a failed sync.

use std::future::Future;

use kaline_core::{ErrorKind, Product, ProductId};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};
use url::Url;

use crate::config::RemoteConfig;

/// Errors from the remote catalog service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {0}: {1}")]
    Status(u16, String),

    /// The service answered `success: false`.
    #[error("sync rejected: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),

    /// The response body was not the expected JSON.
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl RemoteError {
    /// Taxonomy classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::RemoteSync
    }
}

/// A catalog write to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Add,
    Update,
    Remove,
}

impl std::fmt::Display for SyncAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Wire body of a sync call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub action: SyncAction,
    pub payload: serde_json::Value,
}

impl SyncRequest {
    /// Propagate a new product.
    #[must_use]
    pub fn add(product: &Product) -> Self {
        Self::with_product(SyncAction::Add, product)
    }

    /// Propagate an updated product.
    #[must_use]
    pub fn update(product: &Product) -> Self {
        Self::with_product(SyncAction::Update, product)
    }

    /// Propagate a deletion.
    #[must_use]
    pub fn remove(id: &ProductId) -> Self {
        Self {
            action: SyncAction::Remove,
            payload: serde_json::json!({ "id": id }),
        }
    }

    fn with_product(action: SyncAction, product: &Product) -> Self {
        Self {
            action,
            payload: serde_json::to_value(product).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Something that can propagate catalog writes.
pub trait CatalogRemote: Send + Sync + 'static {
    /// Propagate one write. Resolves once the remote has accepted or refused it.
    fn sync(&self, request: SyncRequest) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

impl<T: CatalogRemote> CatalogRemote for std::sync::Arc<T> {
    fn sync(&self, request: SyncRequest) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).sync(request)
    }
}

/// HTTP client for the remote catalog service.
#[derive(Clone)]
pub struct HttpCatalogRemote {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl std::fmt::Debug for HttpCatalogRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalogRemote")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpCatalogRemote {
    /// Create a client for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            token: config.token.clone(),
        })
    }
}

impl CatalogRemote for HttpCatalogRemote {
    #[instrument(skip(self, request), fields(action = %request.action))]
    async fn sync(&self, request: SyncRequest) -> Result<(), RemoteError> {
        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();

        // Body as text first for better error diagnostics
        let response_text = response.text().await?;

        if !status.is_success() {
            error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "catalog service returned non-success status"
            );
            return Err(RemoteError::Status(
                status.as_u16(),
                response_text.chars().take(200).collect(),
            ));
        }

        let response: SyncResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                error!(
                    error = %e,
                    body = %response_text.chars().take(500).collect::<String>(),
                    "failed to parse catalog service response"
                );
                return Err(RemoteError::Malformed(e));
            }
        };

        if !response.success {
            return Err(RemoteError::Rejected(response.message));
        }

        debug!(message = ?response.message, "sync accepted");
        Ok(())
    }
}
