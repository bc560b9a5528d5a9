// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The access/refresh credential pair.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An authenticated session's secrets.
///
/// Always complete: both fields are non-empty. There is no way to build a
/// half-present pair, so "logged out" is `Option::None` at every call site.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPair")]
pub struct CredentialPair {
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
struct RawPair {
    #[serde(default)]
    access: String,
    #[serde(default)]
    refresh: String,
}

impl TryFrom<RawPair> for CredentialPair {
    type Error = &'static str;

    fn try_from(raw: RawPair) -> Result<Self, Self::Error> {
        Self::new(raw.access, raw.refresh).ok_or("credential pair requires access and refresh")
    }
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Option<Self> {
        let access = access.into();
        let refresh = refresh.into();
        if access.is_empty() || refresh.is_empty() {
            return None;
        }
        Some(Self { access, refresh })
    }

    /// The pair produced by a renewal: new access, same refresh secret.
    pub fn with_access(&self, access: impl Into<String>) -> Option<Self> {
        Self::new(access, self.refresh.clone())
    }

    pub fn access(&self) -> &str {
        &self.access
    }

    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// Expiry embedded in the access token, in epoch millis.
    pub fn access_expires_at_ms(&self) -> Option<u64> {
        crate::expiry::expires_at_ms(&self.access)
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .field("access_expires_at_ms", &self.access_expires_at_ms())
            .finish()
    }
}
