//! Integration test support for the FarmLink sync layer.
//!
//! # Test Categories
//!
//! - `cart_sync` - cart mutations across remote/local failover
//! - `session_profile` - session lifecycle and profile synchronization
//!
//! The harnesses here script the two external collaborators the layer
//! depends on: the row-level remote store ([`MockRemote`]) and the auth
//! surface ([`MockAuth`]). Both follow the crate's client convention of
//! a cheaply cloneable handle over shared state, so a test can keep a
//! handle while the service under test owns the adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use secrecy::SecretString;

use farmlink_core::{
    CurrencyCode, Email, Price, ProductSnapshot, ProfileRecord, SessionRecord, UserId,
};
use farmlink_sync::cart::CartService;
use farmlink_sync::config::{BackendConfig, CacheConfig};
use farmlink_sync::coordinator::SyncRecord;
use farmlink_sync::error::SyncError;
use farmlink_sync::notify::MemoryNotifier;
use farmlink_sync::remote::{AuthGateway, AuthTokens, RemoteAdapter, RestClient};
use farmlink_sync::session::SessionService;
use farmlink_sync::store::{MemoryMedium, StorageMedium};

/// Install a test tracing subscriber once per process.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// MockRemote
// ============================================================================

/// Scripted single-owner remote store.
///
/// Serves rows from memory until told to fail, and counts calls so tests
/// can assert the latch and fetch-guard properties.
pub struct MockRemote<R> {
    inner: Arc<RemoteState<R>>,
}

impl<R> Clone for MockRemote<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RemoteState<R> {
    rows: Mutex<Vec<R>>,
    failure: Mutex<Option<SyncError>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetch_calls: AtomicUsize,
    mutate_calls: AtomicUsize,
}

impl<R: SyncRecord> MockRemote<R> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RemoteState {
                rows: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                fetch_delay: Mutex::new(None),
                fetch_calls: AtomicUsize::new(0),
                mutate_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Pre-populate the store.
    pub fn seed(&self, rows: Vec<R>) {
        *self.inner.rows.lock() = rows;
    }

    /// Make every subsequent call fail with `err`.
    pub fn fail_with(&self, err: SyncError) {
        *self.inner.failure.lock() = Some(err);
    }

    /// Stop failing.
    pub fn heal(&self) {
        *self.inner.failure.lock() = None;
    }

    /// Stretch fetches out so tests can overlap them.
    pub fn delay_fetches(&self, delay: Duration) {
        *self.inner.fetch_delay.lock() = Some(delay);
    }

    /// Rows currently in the store.
    #[must_use]
    pub fn rows(&self) -> Vec<R> {
        self.inner.rows.lock().clone()
    }

    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.inner.fetch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn mutate_calls(&self) -> usize {
        self.inner.mutate_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SyncError> {
        self.inner.failure.lock().clone().map_or(Ok(()), Err)
    }
}

impl<R: SyncRecord> Default for MockRemote<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncRecord> RemoteAdapter<R> for MockRemote<R> {
    async fn fetch_all(&self, _owner: &UserId) -> Result<Vec<R>, SyncError> {
        self.inner.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.inner.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check()?;
        Ok(self.inner.rows.lock().clone())
    }

    async fn upsert(&self, record: &R) -> Result<(), SyncError> {
        self.inner.mutate_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut rows = self.inner.rows.lock();
        match rows
            .iter_mut()
            .find(|row| row.record_id() == record.record_id())
        {
            Some(slot) => *slot = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(())
    }

    async fn remove_by_id(&self, id: &str) -> Result<(), SyncError> {
        self.inner.mutate_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.rows.lock().retain(|row| row.record_id() != id);
        Ok(())
    }

    async fn remove_all_by_owner(&self, _owner: &UserId) -> Result<(), SyncError> {
        self.inner.mutate_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.rows.lock().clear();
        Ok(())
    }
}

// ============================================================================
// MockAuth
// ============================================================================

/// Scripted auth surface with in-memory accounts.
///
/// User IDs are derived from the email's local part, so re-registering
/// across harnesses yields stable identities.
#[derive(Clone)]
pub struct MockAuth {
    inner: Arc<AuthState>,
}

struct AuthState {
    /// email -> password
    accounts: Mutex<HashMap<String, String>>,
    /// refresh token -> email
    refresh_tokens: Mutex<HashMap<String, String>>,
    failure: Mutex<Option<SyncError>>,
    counter: AtomicUsize,
}

impl MockAuth {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(AuthState {
                accounts: Mutex::new(HashMap::new()),
                refresh_tokens: Mutex::new(HashMap::new()),
                failure: Mutex::new(None),
                counter: AtomicUsize::new(0),
            }),
        }
    }

    /// Pre-seed an account.
    pub fn register(&self, email: &str, password: &str) {
        self.inner
            .accounts
            .lock()
            .insert(email.to_owned(), password.to_owned());
    }

    /// Make every subsequent call fail with `err`.
    pub fn fail_with(&self, err: SyncError) {
        *self.inner.failure.lock() = Some(err);
    }

    /// Stop failing.
    pub fn heal(&self) {
        *self.inner.failure.lock() = None;
    }

    fn check(&self) -> Result<(), SyncError> {
        self.inner.failure.lock().clone().map_or(Ok(()), Err)
    }

    fn mint(&self, email: &Email) -> AuthTokens {
        let n = self.inner.counter.fetch_add(1, Ordering::SeqCst);
        let refresh_token = format!("rt-{n}");
        self.inner
            .refresh_tokens
            .lock()
            .insert(refresh_token.clone(), email.as_str().to_owned());

        let issued_at = Utc::now();
        AuthTokens {
            session: SessionRecord {
                user_id: user_id_for(email),
                email: email.clone(),
                issued_at,
                expires_at: issued_at + chrono::Duration::hours(1),
                refresh_token,
            },
            access_token: SecretString::from(format!("jwt-{n}")),
        }
    }
}

impl Default for MockAuth {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable user ID for a test account.
#[must_use]
pub fn user_id_for(email: &Email) -> UserId {
    UserId::new(format!("user-{}", email.local_part()))
}

impl AuthGateway for MockAuth {
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthTokens, SyncError> {
        self.check()?;
        let known = self.inner.accounts.lock().get(email.as_str()).cloned();
        match known {
            Some(stored) if stored == password => Ok(self.mint(email)),
            _ => Err(SyncError::Unauthorized(
                "invalid login credentials".to_owned(),
            )),
        }
    }

    async fn sign_up(&self, email: &Email, password: &str) -> Result<AuthTokens, SyncError> {
        self.check()?;
        let mut accounts = self.inner.accounts.lock();
        if accounts.contains_key(email.as_str()) {
            return Err(SyncError::Conflict("already registered".to_owned()));
        }
        accounts.insert(email.as_str().to_owned(), password.to_owned());
        drop(accounts);
        Ok(self.mint(email))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, SyncError> {
        self.check()?;
        let email = self.inner.refresh_tokens.lock().get(refresh_token).cloned();
        match email {
            Some(email) => {
                let email = Email::parse(&email)
                    .map_err(|err| SyncError::Unknown(err.to_string()))?;
                Ok(self.mint(&email))
            }
            None => Err(SyncError::Unauthorized("refresh token revoked".to_owned())),
        }
    }

    async fn sign_out(&self, _access_token: &SecretString) -> Result<(), SyncError> {
        self.check()
    }
}

// ============================================================================
// Harnesses
// ============================================================================

/// A REST client pointing nowhere; only its token cell is exercised.
#[must_use]
pub fn dummy_rest() -> RestClient {
    let config = BackendConfig {
        base_url: "http://127.0.0.1:1".to_owned(),
        api_key: SecretString::from("test-key".to_owned()),
        http_timeout: Duration::from_secs(1),
    };
    RestClient::new(&config).expect("client for dummy backend")
}

/// Denormalized product for cart tests, priced in whole cents.
#[must_use]
pub fn snapshot(id: &str, name: &str, cents: i64) -> ProductSnapshot {
    ProductSnapshot {
        id: id.into(),
        name: name.to_owned(),
        price: Price::new(Decimal::new(cents, 2), CurrencyCode::USD),
        image_url: None,
        unit: "kg".to_owned(),
    }
}

pub struct CartHarness {
    pub cart: CartService<MockRemote<farmlink_core::CartLine>>,
    pub remote: MockRemote<farmlink_core::CartLine>,
    pub notifier: Arc<MemoryNotifier>,
}

/// Cart service over a scripted remote and a fresh in-memory medium.
#[must_use]
pub fn cart_harness() -> CartHarness {
    init_tracing();
    let remote = MockRemote::new();
    let notifier = MemoryNotifier::new();
    let cart = CartService::new(
        remote.clone(),
        Arc::new(MemoryMedium::new()),
        notifier.clone(),
        &CacheConfig::default(),
    );
    CartHarness {
        cart,
        remote,
        notifier,
    }
}

pub struct SessionHarness {
    pub session: SessionService<MockRemote<ProfileRecord>, MockAuth>,
    pub remote: MockRemote<ProfileRecord>,
    pub auth: MockAuth,
    pub notifier: Arc<MemoryNotifier>,
}

/// Session service over scripted auth/remote and a fresh medium.
#[must_use]
pub fn session_harness() -> SessionHarness {
    session_harness_on(Arc::new(MemoryMedium::new()), MockAuth::new())
}

/// Session harness over a shared medium and auth, for restart scenarios.
#[must_use]
pub fn session_harness_on(medium: Arc<dyn StorageMedium>, auth: MockAuth) -> SessionHarness {
    init_tracing();
    let remote = MockRemote::new();
    let notifier = MemoryNotifier::new();
    let session = SessionService::new(
        auth.clone(),
        dummy_rest(),
        remote.clone(),
        medium,
        notifier.clone(),
        &CacheConfig::default(),
    );
    SessionHarness {
        session,
        remote,
        auth,
        notifier,
    }
}
