// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session store: sole owner and writer of the current credential pair.
//!
//! The pair and the cached profile live in one `watch` value. Every write
//! swaps the whole snapshot, so readers see either the old pair or the new
//! one, never a mix. UI layers subscribe to the same channel and only ever
//! read from it.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::credential::CredentialPair;
use crate::error::IdentityError;
use crate::events::{self, SessionEvent};
use crate::identity::{IdentityFetch, UserProfile};
use crate::storage::{KeyValueStore, CREDENTIALS_KEY, USER_KEY};

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub pair: Option<CredentialPair>,
    pub user: Option<UserProfile>,
}

impl SessionSnapshot {
    pub fn is_logged_in(&self) -> bool {
        self.pair.is_some()
    }
}

pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
    storage: Arc<dyn KeyValueStore>,
    identity: Arc<dyn IdentityFetch>,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Serializes writes of the two persisted entries.
    persist_lock: Mutex<()>,
}

impl SessionStore {
    /// Hydrate from `storage`. Anything unreadable is treated as logged out.
    pub fn open(
        storage: Arc<dyn KeyValueStore>,
        identity: Arc<dyn IdentityFetch>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let snapshot = hydrate(storage.as_ref());
        if snapshot.is_logged_in() {
            info!(has_profile = snapshot.user.is_some(), "restored persisted session");
        }
        let (state, _) = watch::channel(snapshot);
        Self { state, storage, identity, event_tx, persist_lock: Mutex::new(()) }
    }

    pub fn get(&self) -> Option<CredentialPair> {
        self.state.borrow().pair.clone()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().user.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Install a freshly issued pair.
    ///
    /// The swap is visible to `get()` and on disk before this awaits
    /// anything. The cached profile is dropped (it may belong to another
    /// user) and refetched; an identity failure leaves the pair in place.
    pub async fn replace(&self, pair: CredentialPair) -> Result<UserProfile, IdentityError> {
        self.state.send_modify(|s| {
            s.pair = Some(pair.clone());
            s.user = None;
        });
        self.persist();
        self.revalidate(&pair).await
    }

    /// Swap in a renewed access token, carrying the refresh secret over.
    ///
    /// Compare-and-swap on the refresh secret the renewal was made with: if
    /// the session was cleared or replaced by a new login meanwhile, nothing
    /// is written and `None` is returned. A renewed pair is persisted before
    /// this returns.
    pub(crate) fn apply_renewal(
        &self,
        renewed_from: &str,
        access: String,
    ) -> Option<CredentialPair> {
        let mut renewed = None;
        self.state.send_if_modified(|s| {
            let Some(current) = s.pair.as_ref() else {
                return false;
            };
            if current.refresh() != renewed_from {
                return false;
            }
            match current.with_access(access) {
                Some(next) => {
                    s.pair = Some(next.clone());
                    renewed = Some(next);
                    true
                }
                None => false,
            }
        });
        if renewed.is_some() {
            self.persist();
        }
        renewed
    }

    /// Fetch the profile for `pair` and persist both entries.
    ///
    /// A profile is only cached if `pair` is still current when it arrives.
    pub(crate) async fn revalidate(
        &self,
        pair: &CredentialPair,
    ) -> Result<UserProfile, IdentityError> {
        let result = self.identity.fetch_identity(pair.access()).await;
        match &result {
            Ok(profile) => {
                let applied = self.state.send_if_modified(|s| {
                    let current = s.pair.as_ref().is_some_and(|p| p.access() == pair.access());
                    if current {
                        s.user = Some(profile.clone());
                    }
                    current
                });
                if !applied {
                    debug!("discarding profile fetched for a superseded credential");
                }
            }
            Err(e) => {
                warn!(err = %e, "identity fetch failed");
                events::emit(&self.event_tx, SessionEvent::IdentityFailed { error: e.to_string() });
            }
        }
        self.persist();
        result
    }

    /// Forget the session, in memory and on disk. Idempotent.
    pub fn clear(&self) {
        let was_logged_in = self.state.send_if_modified(|s| {
            let had = s.pair.is_some() || s.user.is_some();
            *s = SessionSnapshot::default();
            had
        });
        self.persist();
        if was_logged_in {
            info!("session cleared");
        }
    }

    /// Write the current snapshot: both entries, or neither.
    fn persist(&self) {
        let _guard = self.persist_lock.lock();
        let snapshot = self.snapshot();
        let result = match snapshot.pair {
            Some(ref pair) => write_entries(self.storage.as_ref(), pair, snapshot.user.as_ref()),
            None => remove_entries(self.storage.as_ref()),
        };
        if let Err(e) = result {
            warn!(err = %e, "failed to persist session");
            // A half-written pair of entries must not outlive this call.
            if snapshot.pair.is_some() {
                if let Err(e) = remove_entries(self.storage.as_ref()) {
                    warn!(err = %e, "failed to remove partially persisted session");
                }
            }
        }
    }
}

fn write_entries(
    storage: &dyn KeyValueStore,
    pair: &CredentialPair,
    user: Option<&UserProfile>,
) -> Result<(), crate::error::StorageError> {
    let creds = serde_json::to_string(pair)?;
    let user = serde_json::to_string(&user)?;
    storage.set(CREDENTIALS_KEY, &creds)?;
    storage.set(USER_KEY, &user)?;
    Ok(())
}

fn remove_entries(storage: &dyn KeyValueStore) -> Result<(), crate::error::StorageError> {
    let creds = storage.remove(CREDENTIALS_KEY);
    let user = storage.remove(USER_KEY);
    creds.and(user)
}

fn hydrate(storage: &dyn KeyValueStore) -> SessionSnapshot {
    let pair = match storage.get(CREDENTIALS_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<CredentialPair>(&raw) {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!(err = %e, "discarding unreadable persisted credentials");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(err = %e, "failed to read persisted credentials");
            None
        }
    };

    let Some(pair) = pair else {
        // Leftover or corrupt entries must not resurface later.
        if let Err(e) = remove_entries(storage) {
            debug!(err = %e, "failed to remove stale session entries");
        }
        return SessionSnapshot::default();
    };

    let user = match storage.get(USER_KEY) {
        Ok(Some(raw)) => serde_json::from_str::<Option<UserProfile>>(&raw).unwrap_or_else(|e| {
            debug!(err = %e, "ignoring unreadable persisted profile");
            None
        }),
        Ok(None) => None,
        Err(e) => {
            debug!(err = %e, "failed to read persisted profile");
            None
        }
    };

    SessionSnapshot { pair: Some(pair), user }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
