//! Remote backend bindings.
//!
//! # Architecture
//!
//! - The hosted backend exposes row-level CRUD over HTTPS, partitioned by
//!   the authenticated owner, plus a token-based auth surface.
//! - [`RestClient`] owns the HTTP plumbing once: headers, timeout, and
//!   the status-to-[`SyncError`] classification every binding shares.
//! - [`CartRemote`] / [`ProfileRemote`] bind one table each and implement
//!   [`RemoteAdapter`], the four-operation seam the coordinator consumes.
//! - [`AuthClient`] implements [`AuthGateway`] against the token
//!   endpoints.
//!
//! Every operation either succeeds with data or fails with a classified
//! [`SyncError`]; nothing below the coordinator retries or falls back.

mod auth;
mod rest;

pub use auth::AuthClient;
pub use rest::{CartRemote, ProfileRemote, RestClient};

use secrecy::SecretString;

use farmlink_core::{Email, SessionRecord, UserId};

use crate::error::SyncError;

/// One domain's remote operations.
///
/// Implementations classify every failure; they never panic and never
/// hang past the HTTP layer's timeout.
pub trait RemoteAdapter<R>: Send + Sync {
    /// Fetch every record belonging to `owner`.
    fn fetch_all(&self, owner: &UserId)
    -> impl Future<Output = Result<Vec<R>, SyncError>> + Send;

    /// Insert or replace one record, keyed by its identifier.
    fn upsert(&self, record: &R) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Delete one record by identifier. Deleting an absent record is not
    /// an error.
    fn remove_by_id(&self, id: &str) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Delete every record belonging to `owner`.
    fn remove_all_by_owner(
        &self,
        owner: &UserId,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

/// Tokens returned by a successful auth exchange.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    /// The established session.
    pub session: SessionRecord,
    /// Bearer token for subsequent row-level requests.
    pub access_token: SecretString,
}

/// The backend's auth surface.
pub trait AuthGateway: Send + Sync {
    /// Exchange credentials for a session.
    fn sign_in(
        &self,
        email: &Email,
        password: &str,
    ) -> impl Future<Output = Result<AuthTokens, SyncError>> + Send;

    /// Register a new account and establish its first session.
    fn sign_up(
        &self,
        email: &Email,
        password: &str,
    ) -> impl Future<Output = Result<AuthTokens, SyncError>> + Send;

    /// Exchange a refresh token for a fresh session.
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<AuthTokens, SyncError>> + Send;

    /// Revoke the session behind `access_token`.
    fn sign_out(
        &self,
        access_token: &SecretString,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}
