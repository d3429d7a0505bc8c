//! Sync layer configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FARMLINK_BACKEND_URL` - Base URL of the hosted backend
//! - `FARMLINK_BACKEND_API_KEY` - API key sent with every backend request
//!
//! ## Optional
//! - `FARMLINK_STORAGE_DIR` - Local shadow-store directory (default: .farmlink)
//! - `FARMLINK_CACHE_TTL_SECS` - Read-cache TTL (default: 300)
//! - `FARMLINK_CACHE_CAPACITY` - Read-cache entry capacity (default: 1000)
//! - `FARMLINK_HTTP_TIMEOUT_SECS` - Per-request HTTP timeout (default: 10)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Top-level sync layer configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hosted backend connection settings.
    pub backend: BackendConfig,
    /// Directory for the durable local shadow store.
    pub storage_dir: PathBuf,
    /// Read-cache tuning.
    pub cache: CacheConfig,
}

/// Hosted backend connection settings.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct BackendConfig {
    /// Base URL, normalized without a trailing slash.
    pub base_url: String,
    /// API key sent as the `apikey` header on every request.
    pub api_key: SecretString,
    /// Per-request timeout; on expiry the request surfaces as
    /// unreachable, it never hangs the coordinator.
    pub http_timeout: Duration,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

/// Read-cache tuning shared by both domains.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a cached read stays fresh.
    pub ttl: Duration,
    /// Maximum number of cached owners per domain.
    pub capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            capacity: 1000,
        }
    }
}

impl SyncConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first missing or invalid
    /// variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = require(&lookup, "FARMLINK_BACKEND_URL")?;
        let parsed = Url::parse(&base_url).map_err(|err| {
            ConfigError::InvalidEnvVar("FARMLINK_BACKEND_URL".to_owned(), err.to_string())
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "FARMLINK_BACKEND_URL".to_owned(),
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        let api_key = require(&lookup, "FARMLINK_BACKEND_API_KEY")?;
        if api_key.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "FARMLINK_BACKEND_API_KEY".to_owned(),
                "must not be empty".to_owned(),
            ));
        }

        let storage_dir = lookup("FARMLINK_STORAGE_DIR").unwrap_or_else(|| ".farmlink".to_owned());

        Ok(Self {
            backend: BackendConfig {
                base_url: base_url.trim_end_matches('/').to_owned(),
                api_key: api_key.into(),
                http_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    "FARMLINK_HTTP_TIMEOUT_SECS",
                    10,
                )?),
            },
            storage_dir: PathBuf::from(storage_dir),
            cache: CacheConfig {
                ttl: Duration::from_secs(parse_or(&lookup, "FARMLINK_CACHE_TTL_SECS", 300)?),
                capacity: parse_or(&lookup, "FARMLINK_CACHE_CAPACITY", 1000)?,
            },
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, ConfigError> {
    lookup(name).ok_or_else(|| ConfigError::MissingEnvVar(name.to_owned()))
}

fn parse_or(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    lookup(name).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|_| ConfigError::InvalidEnvVar(name.to_owned(), format!("'{raw}' is not a number")))
    })
}
