// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request gate: the one path every business API call takes.
//!
//! Before sending, a locally expired (or undecodable) access token is
//! renewed through the coordinator. After sending, a 401 is taken as the
//! server's word that the credential is dead: one forced renewal, one
//! verbatim replay, and a second 401 is final.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use crate::error::GateError;
use crate::expiry::{self, Clock};
use crate::refresh::RefreshCoordinator;
use crate::store::SessionStore;

/// What to do when the server answers 401.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AuthRetry {
    /// Renew once and replay the request once.
    #[default]
    Once,
    /// Hand the 401 response back untouched.
    Never,
}

pub struct RequestGate {
    http: reqwest::Client,
    base_url: String,
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    clock: Arc<dyn Clock>,
    leeway_ms: u64,
    retry: AuthRetry,
}

impl RequestGate {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        store: Arc<SessionStore>,
        coordinator: Arc<RefreshCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            store,
            coordinator,
            clock,
            leeway_ms: 0,
            retry: AuthRetry::default(),
        }
    }

    /// Treat access tokens as expired this long before their `exp`.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_ms = leeway.as_millis() as u64;
        self
    }

    pub fn with_auth_retry(mut self, retry: AuthRetry) -> Self {
        self.retry = retry;
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_owned();
        }
        format!("{}{}", self.base_url, path)
    }

    /// Start a request against the API base URL. Send it with [`send`](Self::send).
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub async fn get(&self, path: &str) -> Result<Response, GateError> {
        self.send(self.request(Method::GET, path)).await
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, GateError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, GateError> {
        let request = builder.build().map_err(GateError::InvalidRequest)?;
        self.execute(request).await
    }

    /// Send `request` with the current credential attached.
    ///
    /// Non-401 responses come back as-is, whatever their status.
    pub async fn execute(&self, mut request: Request) -> Result<Response, GateError> {
        let bearer = self.bearer().await?;
        // Cloned before the first attempt so the replay is verbatim.
        let replay = match self.retry {
            AuthRetry::Once => request.try_clone(),
            AuthRetry::Never => None,
        };
        if let Some(ref token) = bearer {
            set_bearer(&mut request, token)?;
        }

        let resp = self.http.execute(request).await?;
        if resp.status() != StatusCode::UNAUTHORIZED || self.retry == AuthRetry::Never {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let Some(mut replay) = replay else {
            warn!(url = %resp.url(), "401 on a request whose body cannot be replayed");
            return Err(GateError::AuthorizationDenied { status });
        };
        drop(resp);

        debug!(url = %replay.url(), "server rejected credential, forcing renewal");
        let token = self.coordinator.renew_from(bearer.as_deref()).await?;
        set_bearer(&mut replay, &token)?;

        let resp = self.http.execute(replay).await?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %resp.url(), "renewed credential rejected, giving up");
            return Err(GateError::AuthorizationDenied { status: resp.status().as_u16() });
        }
        Ok(resp)
    }

    /// The access token to send, renewing first when it is locally stale.
    /// `None` when logged out.
    async fn bearer(&self) -> Result<Option<String>, GateError> {
        let Some(pair) = self.store.get() else {
            return Ok(None);
        };
        let freshness =
            expiry::check_with_leeway(pair.access(), self.clock.now_ms(), self.leeway_ms);
        if freshness.is_fresh() {
            return Ok(Some(pair.access().to_owned()));
        }
        debug!(?freshness, "access token stale, renewing before send");
        let token = self.coordinator.renew_from(Some(pair.access())).await?;
        Ok(Some(token))
    }
}

fn set_bearer(request: &mut Request, token: &str) -> Result<(), GateError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| GateError::MalformedCredential)?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
