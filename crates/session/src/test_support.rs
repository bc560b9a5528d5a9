// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test doubles: unsigned JWT minting, a scripted in-process backend, and a
//! mock HTTP API speaking the token/refresh/user protocol.

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};

use crate::api::AuthBackend;
use crate::credential::CredentialPair;
use crate::error::{IdentityError, LoginError, RenewalError};
use crate::identity::{IdentityFetch, UserProfile};
use crate::refresh::RenewalResult;

// -- Tokens -------------------------------------------------------------------

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

pub fn epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Build `header.payload.sig` around a raw JSON payload.
pub fn jwt_with_payload(payload: &str, padded: bool) -> String {
    let (header, body) = if padded {
        (URL_SAFE.encode(HEADER), URL_SAFE.encode(payload))
    } else {
        (URL_SAFE_NO_PAD.encode(HEADER), URL_SAFE_NO_PAD.encode(payload))
    };
    format!("{header}.{body}.c2ln")
}

pub fn jwt_expiring_at(exp_secs: i64) -> String {
    jwt_with_payload(&json!({ "exp": exp_secs }).to_string(), false)
}

/// A token whose `sub` claim names it, so tests can say "A2" instead of
/// comparing opaque strings.
pub fn labelled_jwt(label: &str, exp_secs: i64) -> String {
    jwt_with_payload(&json!({ "exp": exp_secs, "sub": label }).to_string(), false)
}

/// The `sub` label of a token minted by [`labelled_jwt`].
pub fn jwt_label(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("sub")?.as_str().map(str::to_owned)
}

pub fn fresh_token(label: &str) -> String {
    labelled_jwt(label, epoch_secs() + 3600)
}

pub fn expired_token(label: &str) -> String {
    labelled_jwt(label, epoch_secs() - 60)
}

pub fn profile(username: &str) -> UserProfile {
    let mut fields = serde_json::Map::new();
    fields.insert("id".into(), json!(1));
    fields.insert("username".into(), json!(username));
    UserProfile::new(fields)
}

// -- Scripted backend ---------------------------------------------------------

/// In-process [`AuthBackend`] + [`IdentityFetch`] with queued answers.
///
/// Renewals can be held open until the test releases them, which is how
/// concurrent callers are made to overlap deterministically.
pub struct ScriptedBackend {
    renewals: Mutex<VecDeque<RenewalResult>>,
    identities: Mutex<VecDeque<Result<UserProfile, IdentityError>>>,
    issues: Mutex<VecDeque<Result<CredentialPair, LoginError>>>,
    renew_calls: AtomicU32,
    identity_calls: AtomicU32,
    issue_calls: AtomicU32,
    refreshes_seen: Mutex<Vec<String>>,
    identity_tokens: Mutex<Vec<String>>,
    held: AtomicBool,
    release: Semaphore,
    started: Notify,
    identity_held: AtomicBool,
    identity_release: Semaphore,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            renewals: Mutex::new(VecDeque::new()),
            identities: Mutex::new(VecDeque::new()),
            issues: Mutex::new(VecDeque::new()),
            renew_calls: AtomicU32::new(0),
            identity_calls: AtomicU32::new(0),
            issue_calls: AtomicU32::new(0),
            refreshes_seen: Mutex::new(Vec::new()),
            identity_tokens: Mutex::new(Vec::new()),
            held: AtomicBool::new(false),
            release: Semaphore::new(0),
            started: Notify::new(),
            identity_held: AtomicBool::new(false),
            identity_release: Semaphore::new(0),
        })
    }

    pub fn push_renewal(&self, result: RenewalResult) {
        self.renewals.lock().push_back(result);
    }

    pub fn push_identity(&self, result: Result<UserProfile, IdentityError>) {
        self.identities.lock().push_back(result);
    }

    pub fn push_issue(&self, result: Result<CredentialPair, LoginError>) {
        self.issues.lock().push_back(result);
    }

    /// Make renewals block until [`release_renewals`](Self::release_renewals).
    pub fn hold_renewals(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release_renewals(&self, n: usize) {
        self.release.add_permits(n);
    }

    /// Make identity fetches block until
    /// [`release_identities`](Self::release_identities).
    pub fn hold_identities(&self) {
        self.identity_held.store(true, Ordering::SeqCst);
    }

    pub fn release_identities(&self, n: usize) {
        self.identity_release.add_permits(n);
    }

    /// Resolves once a renewal call has begun (possibly already).
    pub async fn renewal_started(&self) {
        self.started.notified().await;
    }

    pub fn renew_calls(&self) -> u32 {
        self.renew_calls.load(Ordering::SeqCst)
    }

    pub fn identity_calls(&self) -> u32 {
        self.identity_calls.load(Ordering::SeqCst)
    }

    pub fn issue_calls(&self) -> u32 {
        self.issue_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes_seen(&self) -> Vec<String> {
        self.refreshes_seen.lock().clone()
    }

    pub fn identity_tokens(&self) -> Vec<String> {
        self.identity_tokens.lock().clone()
    }
}

#[async_trait]
impl AuthBackend for ScriptedBackend {
    async fn issue(&self, _username: &str, _password: &str) -> Result<CredentialPair, LoginError> {
        self.issue_calls.fetch_add(1, Ordering::SeqCst);
        self.issues
            .lock()
            .pop_front()
            .unwrap_or(Err(LoginError::InvalidCredentials { status: 401 }))
    }

    async fn renew(&self, refresh: &str) -> RenewalResult {
        self.renew_calls.fetch_add(1, Ordering::SeqCst);
        self.refreshes_seen.lock().push(refresh.to_owned());
        self.started.notify_one();
        if self.held.load(Ordering::SeqCst) {
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
        }
        self.renewals
            .lock()
            .pop_front()
            .unwrap_or(Err(RenewalError::Protocol("no scripted renewal".into())))
    }
}

#[async_trait]
impl IdentityFetch for ScriptedBackend {
    async fn fetch_identity(&self, access: &str) -> Result<UserProfile, IdentityError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        self.identity_tokens.lock().push(access.to_owned());
        if self.identity_held.load(Ordering::SeqCst) {
            if let Ok(permit) = self.identity_release.acquire().await {
                permit.forget();
            }
        }
        self.identities.lock().pop_front().unwrap_or_else(|| Ok(profile("ada")))
    }
}

// -- Mock HTTP API ------------------------------------------------------------

pub const MOCK_USERNAME: &str = "ada";
pub const MOCK_PASSWORD: &str = "correct horse";

/// Shared state behind the mock API's routes.
pub struct MockState {
    login_access: Mutex<String>,
    refresh_secret: Mutex<String>,
    valid: Mutex<HashSet<String>>,
    next_access: Mutex<VecDeque<String>>,
    refresh_status: AtomicU16,
    refresh_delay_ms: AtomicU64,
    identity_status: AtomicU16,
    reject_business: AtomicBool,
    minted: AtomicU32,
    token_calls: AtomicU32,
    refresh_calls: AtomicU32,
    user_calls: AtomicU32,
    business_calls: AtomicU32,
    refreshes_seen: Mutex<Vec<String>>,
    bearers_seen: Mutex<Vec<Option<String>>>,
    bodies_seen: Mutex<Vec<Value>>,
}

/// An axum server on `127.0.0.1:0` implementing the auth protocol plus two
/// business routes (`GET /accounts`, `POST /transactions`).
pub struct MockApi {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockApi {
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(MockState {
            login_access: Mutex::new(fresh_token("A1")),
            refresh_secret: Mutex::new("R1".to_owned()),
            valid: Mutex::new(HashSet::new()),
            next_access: Mutex::new(VecDeque::new()),
            refresh_status: AtomicU16::new(200),
            refresh_delay_ms: AtomicU64::new(0),
            identity_status: AtomicU16::new(200),
            reject_business: AtomicBool::new(false),
            minted: AtomicU32::new(1),
            token_calls: AtomicU32::new(0),
            refresh_calls: AtomicU32::new(0),
            user_calls: AtomicU32::new(0),
            business_calls: AtomicU32::new(0),
            refreshes_seen: Mutex::new(Vec::new()),
            bearers_seen: Mutex::new(Vec::new()),
            bodies_seen: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/token", post(issue_route))
            .route("/token/refresh", post(refresh_route))
            .route("/user", get(user_route))
            .route("/accounts", get(accounts_route))
            .route("/transactions", post(transactions_route))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self { addr, state })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Access token handed out by the next login.
    pub fn set_login_access(&self, token: String) {
        *self.state.login_access.lock() = token;
    }

    /// Queue the access token the next renewal hands out.
    pub fn push_next_access(&self, token: String) {
        self.state.next_access.lock().push_back(token);
    }

    pub fn set_refresh_status(&self, status: u16) {
        self.state.refresh_status.store(status, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state.refresh_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_identity_status(&self, status: u16) {
        self.state.identity_status.store(status, Ordering::SeqCst);
    }

    /// Answer every business request with 401.
    pub fn reject_business(&self, reject: bool) {
        self.state.reject_business.store(reject, Ordering::SeqCst);
    }

    /// Accept `token` as a valid bearer without a login.
    pub fn accept(&self, token: &str) {
        self.state.valid.lock().insert(token.to_owned());
    }

    /// Server-side revocation.
    pub fn revoke(&self, token: &str) {
        self.state.valid.lock().remove(token);
    }

    pub fn token_calls(&self) -> u32 {
        self.state.token_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> u32 {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn user_calls(&self) -> u32 {
        self.state.user_calls.load(Ordering::SeqCst)
    }

    pub fn business_calls(&self) -> u32 {
        self.state.business_calls.load(Ordering::SeqCst)
    }

    pub fn refreshes_seen(&self) -> Vec<String> {
        self.state.refreshes_seen.lock().clone()
    }

    /// Bearer tokens presented to business routes, in arrival order.
    pub fn bearers_seen(&self) -> Vec<Option<String>> {
        self.state.bearers_seen.lock().clone()
    }

    /// JSON bodies posted to `/transactions`, in arrival order.
    pub fn bodies_seen(&self) -> Vec<Value> {
        self.state.bodies_seen.lock().clone()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn issue_route(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    if body["username"] != MOCK_USERNAME || body["password"] != MOCK_PASSWORD {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "no active account" })));
    }
    let access = state.login_access.lock().clone();
    let refresh = state.refresh_secret.lock().clone();
    state.valid.lock().insert(access.clone());
    (StatusCode::OK, Json(json!({ "access": access, "refresh": refresh })))
}

async fn refresh_route(
    State(state): State<Arc<MockState>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let refresh = body["refresh"].as_str().unwrap_or_default().to_owned();
    state.refreshes_seen.lock().push(refresh.clone());

    let delay = state.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    let code = state.refresh_status.load(Ordering::SeqCst);
    if code != 200 || refresh != *state.refresh_secret.lock() {
        let code = if code == 200 { 401 } else { code };
        return (status(code), Json(json!({ "detail": "token not valid" })));
    }

    let access = state.next_access.lock().pop_front().unwrap_or_else(|| {
        let n = state.minted.fetch_add(1, Ordering::SeqCst) + 1;
        fresh_token(&format!("A{n}"))
    });
    state.valid.lock().insert(access.clone());
    (StatusCode::OK, Json(json!({ "access": access })))
}

async fn user_route(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.user_calls.fetch_add(1, Ordering::SeqCst);
    let code = state.identity_status.load(Ordering::SeqCst);
    if code != 200 {
        return (status(code), Json(json!({ "detail": "unavailable" })));
    }
    let authorized = bearer(&headers).is_some_and(|t| state.valid.lock().contains(&t));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "not authenticated" })));
    }
    (StatusCode::OK, Json(json!({ "id": 1, "username": MOCK_USERNAME, "currency": "EUR" })))
}

fn authorize_business(state: &MockState, headers: &HeaderMap) -> bool {
    state.business_calls.fetch_add(1, Ordering::SeqCst);
    let token = bearer(headers);
    state.bearers_seen.lock().push(token.clone());
    if state.reject_business.load(Ordering::SeqCst) {
        return false;
    }
    token.is_some_and(|t| state.valid.lock().contains(&t))
}

async fn accounts_route(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    if !authorize_business(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "not authenticated" })));
    }
    (StatusCode::OK, Json(json!({ "accounts": [{ "id": "acc-1", "balance": "120.00" }] })))
}

async fn transactions_route(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.bodies_seen.lock().push(body.clone());
    if !authorize_business(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "not authenticated" })));
    }
    (StatusCode::CREATED, Json(json!({ "created": body })))
}
