// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight access token renewal.
//!
//! At most one renewal call is in flight per session. Callers that need a
//! renewal while one is running park on a oneshot in FIFO order and all get
//! the outcome of that same cycle. The cycle runs on its own task, so a
//! caller dropping its future cannot strand the others.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::api::AuthBackend;
use crate::error::RenewalError;
use crate::events::{self, SessionEvent};
use crate::store::SessionStore;

/// New access token, or why there is none.
pub type RenewalResult = Result<String, RenewalError>;

/// Coordination state. `waiters` is empty whenever no renewal is in flight.
#[derive(Default)]
struct Cycle {
    renewal_in_flight: bool,
    waiters: VecDeque<oneshot::Sender<RenewalResult>>,
}

pub struct RefreshCoordinator {
    cycle: Mutex<Cycle>,
    store: Arc<SessionStore>,
    backend: Arc<dyn AuthBackend>,
    event_tx: broadcast::Sender<SessionEvent>,
    renewals: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn AuthBackend>,
        event_tx: broadcast::Sender<SessionEvent>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cycle: Mutex::new(Cycle::default()),
            store,
            backend,
            event_tx,
            renewals: AtomicU64::new(0),
        })
    }

    /// Renew the access token, joining the in-flight cycle if there is one.
    ///
    /// Without a stored pair this fails with [`RenewalError::NoCredential`]
    /// immediately, with no network call.
    pub async fn renew(self: &Arc<Self>) -> RenewalResult {
        self.enter(Staleness::Forced).await
    }

    /// Renew because `seen_access` turned out stale (locally expired, or
    /// rejected by the server).
    ///
    /// If no cycle is running and the store already holds a different access
    /// token, someone renewed (or logged in) since `seen_access` was read:
    /// that token is returned without a network call. `None` means the
    /// caller saw no credential at all.
    pub async fn renew_from(self: &Arc<Self>, seen_access: Option<&str>) -> RenewalResult {
        self.enter(Staleness::Seen(seen_access)).await
    }

    /// Whether a renewal cycle is currently running.
    pub fn is_renewing(&self) -> bool {
        self.cycle.lock().renewal_in_flight
    }

    /// Callers currently parked on the running cycle.
    pub fn pending_waiters(&self) -> usize {
        self.cycle.lock().waiters.len()
    }

    /// Renewal network calls started since creation.
    pub fn renewals_started(&self) -> u64 {
        self.renewals.load(Ordering::Relaxed)
    }

    async fn enter(self: &Arc<Self>, staleness: Staleness<'_>) -> RenewalResult {
        let rx = {
            let mut cycle = self.cycle.lock();
            let (tx, rx) = oneshot::channel();
            if cycle.renewal_in_flight {
                cycle.waiters.push_back(tx);
                debug!(waiters = cycle.waiters.len(), "joined in-flight renewal");
            } else {
                let Some(pair) = self.store.get() else {
                    return Err(RenewalError::NoCredential);
                };
                if let Staleness::Seen(seen) = staleness {
                    if seen != Some(pair.access()) {
                        debug!("credential already replaced, skipping renewal");
                        return Ok(pair.access().to_owned());
                    }
                }
                // Check and set happen under one lock acquisition.
                cycle.renewal_in_flight = true;
                cycle.waiters.push_back(tx);
                self.spawn_cycle(pair.refresh().to_owned());
            }
            rx
        };
        rx.await.unwrap_or(Err(RenewalError::Abandoned))
    }

    fn spawn_cycle(self: &Arc<Self>, refresh: String) {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut guard = ResolveOnDrop(Some(Arc::clone(&coordinator)));
            let outcome = coordinator.run_cycle(&refresh).await;
            guard.0 = None;
            coordinator.resolve(outcome);
        });
    }

    async fn run_cycle(&self, refresh: &str) -> RenewalResult {
        let n = self.renewals.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(renewal = n, "renewing access token");

        let access = match self.backend.renew(refresh).await {
            Ok(access) => access,
            Err(e) => {
                warn!(renewal = n, kind = %e.kind(), err = %e, "access token renewal failed");
                events::emit(
                    &self.event_tx,
                    SessionEvent::RenewalFailed { kind: e.kind(), error: e.to_string() },
                );
                return Err(e);
            }
        };

        let Some(pair) = self.store.apply_renewal(refresh, access) else {
            // Logged out or logged in again while the call was in flight.
            debug!(renewal = n, "session changed during renewal, discarding result");
            return self
                .store
                .get()
                .map(|p| p.access().to_owned())
                .ok_or(RenewalError::NoCredential);
        };

        // Identity failures are logged and broadcast by the store; the
        // renewed pair stands regardless.
        let _ = self.store.revalidate(&pair).await;

        let expires_at_ms = pair.access_expires_at_ms();
        info!(renewal = n, expires_at_ms, "access token renewed");
        events::emit(&self.event_tx, SessionEvent::Renewed { expires_at_ms });
        Ok(pair.access().to_owned())
    }

    /// End the cycle: reset the flag and drain waiters in one critical
    /// section, then wake them in arrival order.
    fn resolve(&self, outcome: RenewalResult) {
        let waiters = {
            let mut cycle = self.cycle.lock();
            cycle.renewal_in_flight = false;
            std::mem::take(&mut cycle.waiters)
        };
        debug!(waiters = waiters.len(), ok = outcome.is_ok(), "renewal cycle resolved");
        for tx in waiters {
            // A waiter whose caller went away is simply skipped.
            let _ = tx.send(outcome.clone());
        }
    }
}

#[derive(Clone, Copy)]
enum Staleness<'a> {
    Forced,
    Seen(Option<&'a str>),
}

/// Fails the cycle's waiters if the renewal task unwinds or is dropped.
struct ResolveOnDrop(Option<Arc<RefreshCoordinator>>);

impl Drop for ResolveOnDrop {
    fn drop(&mut self) {
        if let Some(coordinator) = self.0.take() {
            warn!("renewal task ended early");
            coordinator.resolve(Err(RenewalError::Abandoned));
        }
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
