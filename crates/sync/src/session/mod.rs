//! The session/profile domain.
//!
//! Owns the authenticated session lifecycle and the profile record keyed
//! by it. Sign-in and sign-up are the only operations that reset the
//! domain's mode latch; sign-out destroys the session and the locally
//! held profile and returns the latch to remote mode for the next
//! session. Profile reads ride the shared coordinator, so overlapping
//! session-restore and sign-in flows collapse into one profile fetch.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use secrecy::SecretString;

use farmlink_core::{Email, ProfileRecord, Role, SessionRecord, UserId};

use crate::config::CacheConfig;
use crate::coordinator::{Change, SyncCoordinator, SyncRecord};
use crate::error::SyncError;
use crate::latch::ModeLatch;
use crate::notify::Notifier;
use crate::remote::{AuthGateway, AuthTokens, RemoteAdapter, RestClient};
use crate::store::{KeyedRecordStore, StorageMedium};

impl SyncRecord for ProfileRecord {
    fn record_id(&self) -> &str {
        self.user_id.as_str()
    }
}

/// Storage key for the (single) persisted session.
const SESSION_KEY: &str = "current";

/// The authenticated-session surface consumers hold.
pub struct SessionService<A, G> {
    auth: G,
    rest: RestClient,
    profiles: SyncCoordinator<ProfileRecord, A>,
    sessions: KeyedRecordStore<SessionRecord>,
    current: RwLock<Option<SessionRecord>>,
    access: RwLock<Option<SecretString>>,
}

impl<A, G> SessionService<A, G>
where
    A: RemoteAdapter<ProfileRecord>,
    G: AuthGateway,
{
    #[must_use]
    pub fn new(
        auth: G,
        rest: RestClient,
        remote: A,
        medium: Arc<dyn StorageMedium>,
        notifier: Arc<dyn Notifier>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            auth,
            rest,
            profiles: SyncCoordinator::new("session", remote, Arc::clone(&medium), notifier, cache),
            sessions: KeyedRecordStore::new(medium, "auth"),
            current: RwLock::new(None),
            access: RwLock::new(None),
        }
    }

    /// The session domain's mode latch.
    #[must_use]
    pub const fn latch(&self) -> &ModeLatch {
        self.profiles.latch()
    }

    /// The in-memory session, if signed in.
    #[must_use]
    pub fn current(&self) -> Option<SessionRecord> {
        self.current.read().clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Exchange credentials for a session.
    ///
    /// On success the session is persisted, the bearer token installed,
    /// the domain latch reset to remote, and the profile created lazily
    /// if this is the account's first sign-in.
    ///
    /// # Errors
    ///
    /// [`SyncError::Unauthorized`] for rejected credentials (or a
    /// malformed address), [`SyncError::Unreachable`]/[`SyncError::Unknown`]
    /// when the auth surface itself is down - establishing a session
    /// cannot fall back locally.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionRecord, SyncError> {
        let email = Email::parse(email).map_err(|err| SyncError::Unauthorized(err.to_string()))?;

        let tokens = self.auth.sign_in(&email, password).await?;
        self.install(&tokens);
        self.profiles.reinitialize(&tokens.session.user_id).await;
        self.ensure_profile(&tokens.session).await?;

        Ok(tokens.session)
    }

    /// Register a new account and establish its first session.
    ///
    /// # Errors
    ///
    /// As for [`sign_in`](Self::sign_in), plus [`SyncError::Conflict`]
    /// when the address is already registered.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<SessionRecord, SyncError> {
        let email = Email::parse(email).map_err(|err| SyncError::Unauthorized(err.to_string()))?;

        let tokens = self.auth.sign_up(&email, password).await?;
        self.install(&tokens);
        self.profiles.reinitialize(&tokens.session.user_id).await;

        let profile = ProfileRecord {
            user_id: tokens.session.user_id.clone(),
            display_name: display_name.to_owned(),
            role,
            address: None,
        };
        self.profiles
            .apply(&tokens.session.user_id, Change::Upsert(profile))
            .await?;

        Ok(tokens.session)
    }

    /// Destroy the session: best-effort remote revoke, then drop the
    /// persisted session, the locally held profile, and the bearer
    /// token, and return the latch to remote mode for the next session.
    ///
    /// Never fails - a sign-out must always leave the client signed out.
    pub async fn sign_out(&self) {
        let session = self.current.write().take();
        let access = self.access.write().take();

        if let Some(token) = access
            && let Err(err) = self.auth.sign_out(&token).await
        {
            tracing::debug!(error = %err, "remote sign-out failed; clearing local session anyway");
        }

        if let Some(session) = session {
            self.profiles.purge_local(&session.user_id).await;
        }

        self.rest.clear_access_token();
        self.sessions.clear(SESSION_KEY);
        self.profiles.latch().reset();
    }

    /// Reload a persisted session at startup.
    ///
    /// Exchanges the stored refresh token for fresh tokens. If the auth
    /// surface is unreachable, an unexpired persisted session is kept
    /// (without a bearer token - the first remote call will latch the
    /// affected domain local); a rejected or expired session is
    /// discarded.
    pub async fn restore(&self) -> Option<SessionRecord> {
        let persisted = self.sessions.read(SESSION_KEY).into_iter().next()?;

        match self.auth.refresh(&persisted.refresh_token).await {
            Ok(tokens) => {
                self.install(&tokens);
                Some(tokens.session)
            }
            Err(err) if err.triggers_fallback() => {
                if persisted.is_expired(Utc::now()) {
                    tracing::warn!("persisted session expired and backend unreachable; discarding");
                    self.sessions.clear(SESSION_KEY);
                    return None;
                }
                *self.current.write() = Some(persisted.clone());
                Some(persisted)
            }
            Err(err) => {
                tracing::warn!(error = %err, "persisted session rejected; discarding");
                self.sessions.clear(SESSION_KEY);
                None
            }
        }
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// The owner's profile, if one exists.
    ///
    /// # Errors
    ///
    /// Auth and conflict failures only; infrastructure failures are
    /// served from the shadow store (possibly as a stale profile, which
    /// beats none).
    pub async fn profile(&self, owner: &UserId) -> Result<Option<ProfileRecord>, SyncError> {
        Ok(self.profiles.read_all(owner).await?.into_iter().next())
    }

    /// Fetch the session's profile, creating a default one on first
    /// sign-in.
    ///
    /// # Errors
    ///
    /// As for [`profile`](Self::profile).
    pub async fn ensure_profile(
        &self,
        session: &SessionRecord,
    ) -> Result<ProfileRecord, SyncError> {
        if let Some(existing) = self.profile(&session.user_id).await? {
            return Ok(existing);
        }

        let profile = ProfileRecord {
            user_id: session.user_id.clone(),
            display_name: session.email.local_part().to_owned(),
            role: Role::default(),
            address: None,
        };
        self.profiles
            .apply(&session.user_id, Change::Upsert(profile.clone()))
            .await?;

        Ok(profile)
    }

    /// Upsert the owner's profile.
    ///
    /// # Errors
    ///
    /// As for [`profile`](Self::profile).
    pub async fn update_profile(&self, profile: ProfileRecord) -> Result<(), SyncError> {
        let owner = profile.user_id.clone();
        self.profiles.apply(&owner, Change::Upsert(profile)).await
    }

    fn install(&self, tokens: &AuthTokens) {
        self.rest.set_access_token(tokens.access_token.clone());
        *self.access.write() = Some(tokens.access_token.clone());
        *self.current.write() = Some(tokens.session.clone());
        self.sessions
            .write(SESSION_KEY, std::slice::from_ref(&tokens.session));
    }
}
