//! Row-level REST client and the per-table adapter bindings.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

use farmlink_core::{CartLine, ProfileRecord, UserId};

use super::RemoteAdapter;
use crate::config::BackendConfig;
use crate::error::SyncError;

// =============================================================================
// RestClient
// =============================================================================

/// Client for the backend's row-level REST surface.
///
/// Owns the HTTP plumbing shared by every table binding: the `apikey`
/// header, the per-session bearer token, the request timeout, and the
/// classification of failures into [`SyncError`] kinds.
#[derive(Clone)]
pub struct RestClient {
    inner: Arc<RestClientInner>,
}

struct RestClientInner {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    access_token: RwLock<Option<SecretString>>,
}

impl RestClient {
    /// Create a new client for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &BackendConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(RestClientInner {
                http,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                access_token: RwLock::new(None),
            }),
        })
    }

    /// Install the bearer token of a freshly established session.
    pub fn set_access_token(&self, token: SecretString) {
        *self.inner.access_token.write() = Some(token);
    }

    /// Drop the bearer token (sign-out).
    pub fn clear_access_token(&self) {
        *self.inner.access_token.write() = None;
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.inner.base_url, table)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("apikey", self.inner.api_key.expose_secret());
        match self.inner.access_token.read().as_ref() {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    async fn send_checked(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, SyncError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = response.text().await.unwrap_or_default();
        Err(classify_status(status, &detail))
    }

    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<Vec<T>, SyncError> {
        let request = self
            .inner
            .http
            .get(self.table_url(table))
            .query(&[(column, format!("eq.{value}").as_str()), ("select", "*")]);

        let response = self.send_checked(request).await?;
        response
            .json()
            .await
            .map_err(|err| SyncError::Unknown(format!("malformed rows from {table}: {err}")))
    }

    #[instrument(skip(self, row), level = "debug")]
    pub(crate) async fn upsert_row<T: Serialize + Sync>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<(), SyncError> {
        let request = self
            .inner
            .http
            .post(self.table_url(table))
            // Same-key rows merge instead of erroring, which is what makes
            // the coordinator's upserts idempotent.
            .header("Prefer", "resolution=merge-duplicates")
            .json(std::slice::from_ref(row));

        self.send_checked(request).await.map(drop)
    }

    #[instrument(skip(self), level = "debug")]
    pub(crate) async fn delete_rows(
        &self,
        table: &str,
        column: &str,
        value: &str,
    ) -> Result<(), SyncError> {
        let request = self
            .inner
            .http
            .delete(self.table_url(table))
            .query(&[(column, format!("eq.{value}"))]);

        self.send_checked(request).await.map(drop)
    }
}

// =============================================================================
// Error classification
// =============================================================================

pub(crate) fn classify_transport(err: &reqwest::Error) -> SyncError {
    if err.is_timeout() || err.is_connect() {
        SyncError::Unreachable(err.to_string())
    } else {
        SyncError::Unknown(err.to_string())
    }
}

pub(crate) fn classify_status(status: StatusCode, detail: &str) -> SyncError {
    let detail = if detail.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", detail.chars().take(200).collect::<String>())
    };

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::Unauthorized(detail),
        StatusCode::CONFLICT => SyncError::Conflict(detail),
        StatusCode::REQUEST_TIMEOUT => SyncError::Unreachable(detail),
        status if status.is_server_error() => SyncError::Unreachable(detail),
        _ => SyncError::Unknown(detail),
    }
}

// =============================================================================
// Table bindings
// =============================================================================

/// Cart rows, partitioned by `owner_id`.
#[derive(Clone)]
pub struct CartRemote {
    rest: RestClient,
}

impl CartRemote {
    const TABLE: &'static str = "cart_lines";

    #[must_use]
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

impl RemoteAdapter<CartLine> for CartRemote {
    async fn fetch_all(&self, owner: &UserId) -> Result<Vec<CartLine>, SyncError> {
        self.rest
            .select(Self::TABLE, "owner_id", owner.as_str())
            .await
    }

    async fn upsert(&self, record: &CartLine) -> Result<(), SyncError> {
        self.rest.upsert_row(Self::TABLE, record).await
    }

    async fn remove_by_id(&self, id: &str) -> Result<(), SyncError> {
        self.rest.delete_rows(Self::TABLE, "id", id).await
    }

    async fn remove_all_by_owner(&self, owner: &UserId) -> Result<(), SyncError> {
        self.rest
            .delete_rows(Self::TABLE, "owner_id", owner.as_str())
            .await
    }
}

/// Profile rows, keyed 1:1 by `user_id`.
#[derive(Clone)]
pub struct ProfileRemote {
    rest: RestClient,
}

impl ProfileRemote {
    const TABLE: &'static str = "profiles";

    #[must_use]
    pub const fn new(rest: RestClient) -> Self {
        Self { rest }
    }
}

impl RemoteAdapter<ProfileRecord> for ProfileRemote {
    async fn fetch_all(&self, owner: &UserId) -> Result<Vec<ProfileRecord>, SyncError> {
        self.rest
            .select(Self::TABLE, "user_id", owner.as_str())
            .await
    }

    async fn upsert(&self, record: &ProfileRecord) -> Result<(), SyncError> {
        self.rest.upsert_row(Self::TABLE, record).await
    }

    async fn remove_by_id(&self, id: &str) -> Result<(), SyncError> {
        self.rest.delete_rows(Self::TABLE, "user_id", id).await
    }

    async fn remove_all_by_owner(&self, owner: &UserId) -> Result<(), SyncError> {
        self.rest
            .delete_rows(Self::TABLE, "user_id", owner.as_str())
            .await
    }
}
