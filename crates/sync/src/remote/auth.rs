//! Token-based auth client for the hosted backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use farmlink_core::{Email, SessionRecord, UserId};

use super::{AuthGateway, AuthTokens};
use crate::config::BackendConfig;
use crate::error::SyncError;

/// Client for the backend's token endpoints.
///
/// Verifies nothing itself - credentials are exchanged with the hosted
/// backend, which owns password storage and verification.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

struct AuthClientInner {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: TokenUser,
}

#[derive(Deserialize)]
struct TokenUser {
    id: String,
    email: String,
}

impl AuthClient {
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
            inner: Arc::new(AuthClientInner {
                http,
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.inner.base_url, path)
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<AuthTokens, SyncError> {
        let response = request
            .header("apikey", self.inner.api_key.expose_secret())
            .send()
            .await
            .map_err(|err| super::rest::classify_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_auth_status(status, &detail));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| SyncError::Unknown(format!("malformed token response: {err}")))?;

        tokens_from(token)
    }
}

impl AuthGateway for AuthClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthTokens, SyncError> {
        let request = self
            .inner
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant {
                email: email.as_str(),
                password,
            });
        self.exchange(request).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(&self, email: &Email, password: &str) -> Result<AuthTokens, SyncError> {
        let request = self
            .inner
            .http
            .post(self.auth_url("signup"))
            .json(&PasswordGrant {
                email: email.as_str(),
                password,
            });
        self.exchange(request).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens, SyncError> {
        let request = self
            .inner
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshGrant { refresh_token });
        self.exchange(request).await
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), SyncError> {
        let response = self
            .inner
            .http
            .post(self.auth_url("logout"))
            .header("apikey", self.inner.api_key.expose_secret())
            .bearer_auth(access_token.expose_secret())
            .send()
            .await
            .map_err(|err| super::rest::classify_transport(&err))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(classify_auth_status(status, &detail))
        }
    }
}

/// Build the session and bearer token from a token response.
fn tokens_from(token: TokenResponse) -> Result<AuthTokens, SyncError> {
    let email = Email::parse(&token.user.email)
        .map_err(|err| SyncError::Unknown(format!("malformed token response: {err}")))?;

    let issued_at = Utc::now();
    let session = SessionRecord {
        user_id: UserId::new(token.user.id),
        email,
        issued_at,
        expires_at: issued_at + Duration::seconds(token.expires_in),
        refresh_token: token.refresh_token,
    };

    Ok(AuthTokens {
        session,
        access_token: token.access_token.into(),
    })
}

/// Auth endpoints report a rejected credential as 400, unlike the row
/// surface where 400 is a malformed request.
fn classify_auth_status(status: StatusCode, detail: &str) -> SyncError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SyncError::Unauthorized(format!(
                "{status}: {}",
                detail.chars().take(200).collect::<String>()
            ))
        }
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::Conflict(format!("{status}"))
        }
        _ => super::rest::classify_status(status, detail),
    }
}
