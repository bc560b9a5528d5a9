// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error codes shared by every session error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NoCredential,
    MalformedCredential,
    InvalidCredentials,
    RenewalDenied,
    AuthorizationDenied,
    NetworkFailure,
    Identity,
    Storage,
    Protocol,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "NO_CREDENTIAL",
            Self::MalformedCredential => "MALFORMED_CREDENTIAL",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::RenewalDenied => "RENEWAL_DENIED",
            Self::AuthorizationDenied => "AUTHORIZATION_DENIED",
            Self::NetworkFailure => "NETWORK_FAILURE",
            Self::Identity => "IDENTITY",
            Self::Storage => "STORAGE",
            Self::Protocol => "PROTOCOL",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome delivered to every waiter of a failed renewal cycle.
///
/// `Clone` because one failure fans out to all parked callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenewalError {
    /// No refresh secret to renew with. The session is logged out.
    #[error("no refresh secret available")]
    NoCredential,

    /// The renewal endpoint rejected the refresh secret.
    #[error("renewal denied by server ({status})")]
    Denied { status: u16 },

    /// Transport failure (including timeout) talking to the renewal endpoint.
    #[error("renewal transport failure: {0}")]
    Network(String),

    /// The endpoint answered with a body we could not use.
    #[error("unexpected renewal response: {0}")]
    Protocol(String),

    /// The renewal task ended without resolving its waiters.
    #[error("renewal task ended without a result")]
    Abandoned,
}

impl RenewalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCredential => ErrorKind::NoCredential,
            Self::Denied { .. } => ErrorKind::RenewalDenied,
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Abandoned => ErrorKind::Internal,
        }
    }
}

/// Errors from issuing a new credential pair.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("invalid username or password ({status})")]
    InvalidCredentials { status: u16 },

    #[error("login transport failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected login response: {0}")]
    Protocol(String),
}

impl LoginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials { .. } => ErrorKind::InvalidCredentials,
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::Protocol(_) => ErrorKind::Protocol,
        }
    }
}

/// Errors from fetching the authenticated user's profile.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity endpoint rejected the credential ({status})")]
    Rejected { status: u16 },

    #[error("identity transport failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unexpected identity response: {0}")]
    Protocol(String),
}

impl IdentityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::Rejected { .. } | Self::Protocol(_) => ErrorKind::Identity,
        }
    }
}

/// Errors from durable client storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Storage
    }
}

/// Errors surfaced by the request gate to the caller of a business request.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The server demanded a credential and no session exists.
    #[error("not logged in")]
    NoCredential,

    /// The access token cannot be placed in an `Authorization` header.
    #[error("access token is not a valid header value")]
    MalformedCredential,

    /// Renewal failed; the request was not sent (or not retried).
    #[error(transparent)]
    Renewal(RenewalError),

    /// The server rejected a credential that was just renewed.
    #[error("authorization denied after renewal ({status})")]
    AuthorizationDenied { status: u16 },

    #[error("request transport failure: {0}")]
    Network(#[from] reqwest::Error),

    /// The request builder itself failed (bad URL, unserializable body).
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] reqwest::Error),
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCredential => ErrorKind::NoCredential,
            Self::MalformedCredential => ErrorKind::MalformedCredential,
            Self::Renewal(e) => e.kind(),
            Self::AuthorizationDenied { .. } => ErrorKind::AuthorizationDenied,
            Self::Network(_) => ErrorKind::NetworkFailure,
            Self::InvalidRequest(_) => ErrorKind::Internal,
        }
    }

    /// Whether the application should treat this as an implicit logout.
    pub fn requires_logout(&self) -> bool {
        matches!(self, Self::Renewal(RenewalError::Denied { .. }))
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::NetworkFailure
    }
}

impl From<RenewalError> for GateError {
    fn from(err: RenewalError) -> Self {
        match err {
            RenewalError::NoCredential => Self::NoCredential,
            other => Self::Renewal(other),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
