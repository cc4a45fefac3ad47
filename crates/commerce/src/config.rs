//! Commerce configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KALINE_CATALOG_ENDPOINT` - URL of the remote catalog sync endpoint
//!
//! ## Optional
//! - `KALINE_DATA_DIR` - Directory for persisted state (default: .kaline)
//! - `KALINE_CATALOG_TOKEN` - Bearer token sent to the catalog endpoint
//! - `KALINE_SYNC_TIMEOUT_SECS` - Remote sync timeout (default: 10)
//! - `KALINE_IMAGE_TIMEOUT_SECS` - Image fetch timeout (default: 8)
//! - `KALINE_IMAGE_MAX_BYTES` - Largest image body accepted (default: 5 MiB)
//! - `KALINE_STORAGE_QUOTA_BYTES` - Per-collection storage quota (default: 5 MiB)
//! - `KALINE_SHIPPING` - Flat shipping fee (default: R$ 15,00)
//! - `KALINE_SEED_PATH` - Seed product feed used on first run (default: bundled)
//! - `KALINE_LOG_FORMAT` - `pretty` or `json` (default: pretty)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use kaline_core::{Price, PriceInput, parse_price};
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::storage::DEFAULT_QUOTA_BYTES;

const DEFAULT_DATA_DIR: &str = ".kaline";
const DEFAULT_SYNC_TIMEOUT_SECS: u64 = 10;
const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 8;
const DEFAULT_IMAGE_MAX_BYTES: usize = 5 * 1024 * 1024;
/// Flat shipping fee when none is configured, R$ 15,00.
pub const DEFAULT_SHIPPING: Price = Price::from_minor(1_500);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Log output format for binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'pretty' or 'json', got '{other}'")),
        }
    }
}

/// Commerce engine configuration.
#[derive(Debug, Clone)]
pub struct CommerceConfig {
    /// Directory holding `products.json`, `cart.json` and `favorites.json`
    pub data_dir: PathBuf,
    /// Remote catalog service
    pub remote: RemoteConfig,
    /// Image materialization limits
    pub images: ImageConfig,
    /// Per-collection storage quota in bytes
    pub storage_quota_bytes: usize,
    /// Flat shipping fee applied to non-empty carts
    pub shipping: Price,
    /// Seed feed override
    pub seed_path: Option<PathBuf>,
    /// Log output format
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Remote catalog service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Sync endpoint receiving `{action, payload}` POSTs
    pub endpoint: Url,
    /// Optional bearer token
    pub token: Option<SecretString>,
    /// Request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RemoteConfig {
    /// Remote config for `endpoint` with no token and the default timeout.
    #[must_use]
    pub const fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            token: None,
            timeout: Duration::from_secs(DEFAULT_SYNC_TIMEOUT_SECS),
        }
    }
}

/// Image fetch limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageConfig {
    /// Total time allowed for one fetch
    pub timeout: Duration,
    /// Largest body accepted, in bytes
    pub max_bytes: usize,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_IMAGE_TIMEOUT_SECS),
            max_bytes: DEFAULT_IMAGE_MAX_BYTES,
        }
    }
}

impl CommerceConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads a `.env` file from the working directory first, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(lookup);

        let endpoint = env.required("KALINE_CATALOG_ENDPOINT")?;
        let endpoint = Url::parse(&endpoint)
            .map_err(|e| ConfigError::InvalidEnvVar("KALINE_CATALOG_ENDPOINT".into(), e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "KALINE_CATALOG_ENDPOINT".into(),
                format!("unsupported scheme '{}'", endpoint.scheme()),
            ));
        }

        let remote = RemoteConfig {
            endpoint,
            token: env.optional("KALINE_CATALOG_TOKEN").map(SecretString::from),
            timeout: env.seconds("KALINE_SYNC_TIMEOUT_SECS", DEFAULT_SYNC_TIMEOUT_SECS)?,
        };

        let images = ImageConfig {
            timeout: env.seconds("KALINE_IMAGE_TIMEOUT_SECS", DEFAULT_IMAGE_TIMEOUT_SECS)?,
            max_bytes: env.bytes("KALINE_IMAGE_MAX_BYTES", DEFAULT_IMAGE_MAX_BYTES)?,
        };

        let shipping = match env.optional("KALINE_SHIPPING") {
            Some(raw) if raw.chars().any(|c| c.is_ascii_digit()) => {
                parse_price(&PriceInput::from(raw))
            }
            Some(raw) => {
                return Err(ConfigError::InvalidEnvVar(
                    "KALINE_SHIPPING".into(),
                    format!("'{raw}' is not a price"),
                ));
            }
            None => DEFAULT_SHIPPING,
        };

        let log_format = match env.optional("KALINE_LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("KALINE_LOG_FORMAT".into(), e))?,
            None => LogFormat::default(),
        };

        Ok(Self {
            data_dir: env
                .optional("KALINE_DATA_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from),
            remote,
            images,
            storage_quota_bytes: env.bytes("KALINE_STORAGE_QUOTA_BYTES", DEFAULT_QUOTA_BYTES)?,
            shipping,
            seed_path: env.optional("KALINE_SEED_PATH").map(PathBuf::from),
            log_format,
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Non-empty value, trimmed.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    fn positive(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        match raw.parse::<u64>() {
            Ok(0) => Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be greater than zero".to_string(),
            )),
            Ok(value) => Ok(value),
            Err(e) => Err(ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        }
    }

    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        self.positive(key, default).map(Duration::from_secs)
    }

    fn bytes(&self, key: &str, default: usize) -> Result<usize, ConfigError> {
        let value = self.positive(key, u64::try_from(default).unwrap_or(u64::MAX))?;
        usize::try_from(value)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}
