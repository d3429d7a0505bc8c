//! Wiring for the two synchronized domains.
//!
//! [`SyncStack`] is what an embedding application holds: it builds the
//! shared HTTP clients and storage medium from a [`SyncConfig`] and hands
//! out the cart and session services. Cheaply cloneable via `Arc`.

use std::sync::Arc;

use thiserror::Error;

use crate::cart::CartService;
use crate::config::{ConfigError, SyncConfig};
use crate::notify::Notifier;
use crate::remote::{AuthClient, CartRemote, ProfileRemote, RestClient};
use crate::session::SessionService;
use crate::store::{FileMedium, StorageError, StorageMedium};

/// Error building a [`SyncStack`].
#[derive(Debug, Error)]
pub enum StackError {
    /// Configuration loading or validation failed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The local storage medium could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// The wired sync layer.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// cart and session services sharing one backend connection and one
/// storage medium.
#[derive(Clone)]
pub struct SyncStack {
    inner: Arc<SyncStackInner>,
}

struct SyncStackInner {
    config: SyncConfig,
    cart: CartService<CartRemote>,
    session: SessionService<ProfileRemote, AuthClient>,
}

impl SyncStack {
    /// Build the stack with a durable file medium at the configured
    /// storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created or
    /// the HTTP clients cannot be built.
    pub fn new(config: SyncConfig, notifier: Arc<dyn Notifier>) -> Result<Self, StackError> {
        let medium: Arc<dyn StorageMedium> = Arc::new(FileMedium::new(&config.storage_dir)?);
        Self::with_medium(config, medium, notifier)
    }

    /// Build the stack over a caller-supplied storage medium.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built.
    pub fn with_medium(
        config: SyncConfig,
        medium: Arc<dyn StorageMedium>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, StackError> {
        let rest = RestClient::new(&config.backend)?;
        let auth = AuthClient::new(&config.backend)?;

        let cart = CartService::new(
            CartRemote::new(rest.clone()),
            Arc::clone(&medium),
            Arc::clone(&notifier),
            &config.cache,
        );
        let session = SessionService::new(
            auth,
            rest.clone(),
            ProfileRemote::new(rest),
            medium,
            notifier,
            &config.cache,
        );

        Ok(Self {
            inner: Arc::new(SyncStackInner {
                config,
                cart,
                session,
            }),
        })
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService<CartRemote> {
        &self.inner.cart
    }

    /// Get a reference to the session service.
    #[must_use]
    pub fn session(&self) -> &SessionService<ProfileRemote, AuthClient> {
        &self.inner.session
    }
}
