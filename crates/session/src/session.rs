// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session wiring: one store, one coordinator, one gate per API.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::api::{build_http_client, AuthBackend, Endpoints, HttpBackend};
use crate::config::SessionConfig;
use crate::error::{IdentityError, LoginError};
use crate::events::{self, SessionEvent};
use crate::expiry::{Clock, SystemClock};
use crate::gate::{AuthRetry, RequestGate};
use crate::identity::{IdentityFetch, UserProfile};
use crate::refresh::RefreshCoordinator;
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::store::SessionStore;

/// Result of a successful login. The pair is installed either way.
#[derive(Debug)]
pub enum LoginOutcome {
    Identified(UserProfile),
    /// Credentials were issued but the profile could not be fetched.
    Unidentified(IdentityError),
}

impl LoginOutcome {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            Self::Identified(profile) => Some(profile),
            Self::Unidentified(_) => None,
        }
    }
}

pub struct Session {
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
    gate: RequestGate,
    backend: Arc<dyn AuthBackend>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Wire a session from configuration, restoring any persisted state.
    pub fn open(config: &SessionConfig) -> Result<Self, reqwest::Error> {
        let http = build_http_client(config.request_timeout())?;
        let storage: Arc<dyn KeyValueStore> = if config.ephemeral {
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(FileStore::new(config.resolved_state_dir()))
        };
        Ok(SessionBuilder::new(http, &config.api_url)
            .endpoints(config.endpoints())
            .storage(storage)
            .expiry_leeway(config.expiry_leeway())
            .build())
    }

    pub fn builder(http: reqwest::Client, api_url: &str) -> SessionBuilder {
        SessionBuilder::new(http, api_url)
    }

    /// Exchange username/password for a credential pair and install it.
    ///
    /// On failure the current session is left as it was.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, LoginError> {
        let pair = self.backend.issue(username, password).await?;
        let outcome = match self.store.replace(pair).await {
            Ok(profile) => LoginOutcome::Identified(profile),
            Err(e) => LoginOutcome::Unidentified(e),
        };
        let username = outcome.profile().and_then(|p| p.username()).map(str::to_owned);
        info!(user = username.as_deref().unwrap_or("<unknown>"), "logged in");
        events::emit(&self.event_tx, SessionEvent::LoggedIn { username });
        Ok(outcome)
    }

    /// Forget the session. Safe to call when already logged out.
    pub fn logout(&self) {
        let was_logged_in = self.store.get().is_some();
        self.store.clear();
        if was_logged_in {
            events::emit(&self.event_tx, SessionEvent::LoggedOut);
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.get().is_some()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store.user()
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }
}

/// Assembles a [`Session`]. Anything not set falls back to the HTTP backend
/// on `api_url`, in-memory storage and the system clock.
pub struct SessionBuilder {
    http: reqwest::Client,
    api_url: String,
    endpoints: Endpoints,
    backend: Option<Arc<dyn AuthBackend>>,
    identity: Option<Arc<dyn IdentityFetch>>,
    storage: Option<Arc<dyn KeyValueStore>>,
    clock: Option<Arc<dyn Clock>>,
    leeway: Duration,
    retry: AuthRetry,
}

impl SessionBuilder {
    pub fn new(http: reqwest::Client, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.to_owned(),
            endpoints: Endpoints::default(),
            backend: None,
            identity: None,
            storage: None,
            clock: None,
            leeway: Duration::ZERO,
            retry: AuthRetry::default(),
        }
    }

    pub fn endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn AuthBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityFetch>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn KeyValueStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn expiry_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    pub fn auth_retry(mut self, retry: AuthRetry) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Session {
        let http_backend =
            Arc::new(HttpBackend::new(self.http.clone(), &self.api_url, self.endpoints));
        let backend = self.backend.unwrap_or_else(|| Arc::clone(&http_backend) as _);
        let identity = self.identity.unwrap_or_else(|| http_backend as _);
        let storage = self.storage.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let event_tx = events::channel();
        let store = Arc::new(SessionStore::open(storage, identity, event_tx.clone()));
        let coordinator =
            RefreshCoordinator::new(Arc::clone(&store), Arc::clone(&backend), event_tx.clone());
        let gate = RequestGate::new(
            self.http,
            &self.api_url,
            Arc::clone(&store),
            Arc::clone(&coordinator),
            clock,
        )
        .with_leeway(self.leeway)
        .with_auth_retry(self.retry);

        Session { store, coordinator, gate, backend, event_tx }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
