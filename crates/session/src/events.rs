// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorKind;

/// Lifecycle notifications for UI layers and logs.
///
/// Subscribers only observe; nothing here feeds back into the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    Renewed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at_ms: Option<u64>,
    },
    #[serde(rename = "renewal:failed")]
    RenewalFailed { kind: ErrorKind, error: String },
    #[serde(rename = "identity:failed")]
    IdentityFailed { error: String },
    LoggedOut,
}

pub fn channel() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(64).0
}

pub(crate) fn emit(tx: &broadcast::Sender<SessionEvent>, event: SessionEvent) {
    // No subscribers is fine.
    let _ = tx.send(event);
}
