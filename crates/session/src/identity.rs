// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Authenticated user profile lookup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Whatever the identity endpoint returns for the current user.
///
/// The schema belongs to the remote API; only a couple of common fields get
/// accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(serde_json::Map<String, serde_json::Value>);

impl UserProfile {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }

    pub fn id(&self) -> Option<String> {
        match self.0.get("id")? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.0.get("username").and_then(|v| v.as_str())
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }
}

/// Fetches the profile belonging to an access token.
#[async_trait]
pub trait IdentityFetch: Send + Sync {
    async fn fetch_identity(&self, access: &str) -> Result<UserProfile, IdentityError>;
}
