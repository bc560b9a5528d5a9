// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the authentication endpoints.
//!
//! - `POST /token`: `{username, password}` → `{access, refresh}`
//! - `POST /token/refresh`: `{refresh}` → `{access}`
//! - `GET /user` with bearer access → profile object

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::credential::CredentialPair;
use crate::error::{IdentityError, LoginError, RenewalError};
use crate::identity::{IdentityFetch, UserProfile};

/// The two credential endpoints the session consumes.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Exchange username/password for a new pair. Never retried.
    async fn issue(&self, username: &str, password: &str) -> Result<CredentialPair, LoginError>;

    /// Exchange the refresh secret for a new access token.
    async fn renew(&self, refresh: &str) -> Result<String, RenewalError>;
}

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times; only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Build the shared HTTP client used for both auth and business calls.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    ensure_crypto();
    reqwest::Client::builder().timeout(timeout).build()
}

/// Paths of the auth endpoints relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub token: String,
    pub refresh: String,
    pub user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self { token: "/token".into(), refresh: "/token/refresh".into(), user: "/user".into() }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access: String,
    #[serde(default)]
    refresh: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// The server does not rotate the refresh secret; a `refresh` field in the
/// response, if any, is ignored.
#[derive(Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: String,
}

/// `reqwest`-backed implementation of [`AuthBackend`] and [`IdentityFetch`].
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
    endpoints: Endpoints,
}

impl HttpBackend {
    pub fn new(http: reqwest::Client, base_url: &str, endpoints: Endpoints) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_owned(), endpoints }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn issue(&self, username: &str, password: &str) -> Result<CredentialPair, LoginError> {
        let resp = self
            .http
            .post(self.url(&self.endpoints.token))
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LoginError::InvalidCredentials { status: status.as_u16() });
        }

        let body: LoginResponse = resp.json().await.map_err(|e| {
            if e.is_decode() {
                LoginError::Protocol(e.to_string())
            } else {
                LoginError::Network(e)
            }
        })?;
        CredentialPair::new(body.access, body.refresh)
            .ok_or_else(|| LoginError::Protocol("token response missing access or refresh".into()))
    }

    async fn renew(&self, refresh: &str) -> Result<String, RenewalError> {
        let resp = self
            .http
            .post(self.url(&self.endpoints.refresh))
            .json(&RefreshRequest { refresh })
            .send()
            .await
            .map_err(|e| RenewalError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            debug!(status = status.as_u16(), "renewal endpoint rejected refresh secret");
            return Err(RenewalError::Denied { status: status.as_u16() });
        }

        let body: RefreshResponse = resp.json().await.map_err(|e| {
            if e.is_decode() {
                RenewalError::Protocol(e.to_string())
            } else {
                RenewalError::Network(e.to_string())
            }
        })?;
        if body.access.is_empty() {
            return Err(RenewalError::Protocol("refresh response missing access".into()));
        }
        Ok(body.access)
    }
}

#[async_trait]
impl IdentityFetch for HttpBackend {
    async fn fetch_identity(&self, access: &str) -> Result<UserProfile, IdentityError> {
        let resp = self.http.get(self.url(&self.endpoints.user)).bearer_auth(access).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(IdentityError::Rejected { status: status.as_u16() });
        }

        resp.json().await.map_err(|e| {
            if e.is_decode() {
                IdentityError::Protocol(e.to_string())
            } else {
                IdentityError::Network(e)
            }
        })
    }
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
