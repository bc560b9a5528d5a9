// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tally status` and `tally whoami`: report local session state.
//!
//! Neither command touches the network; both read the session store only.

use serde::Serialize;
use tally_session::expiry::{self, Clock, SystemClock};
use tally_session::{Session, UserProfile};

/// What `tally status` prints.
#[derive(Debug, Serialize, PartialEq)]
pub struct StatusReport {
    pub logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_expires_at_ms: Option<u64>,
    /// Whether the next request will renew before sending.
    pub access_expired: bool,
}

pub fn status(session: &Session) -> StatusReport {
    status_at(session, SystemClock.now_ms())
}

pub fn status_at(session: &Session, now_ms: u64) -> StatusReport {
    let snapshot = session.store().snapshot();
    let Some(pair) = snapshot.pair else {
        return StatusReport {
            logged_in: false,
            username: None,
            access_expires_at_ms: None,
            access_expired: false,
        };
    };
    StatusReport {
        logged_in: true,
        username: snapshot.user.as_ref().and_then(UserProfile::username).map(str::to_owned),
        access_expires_at_ms: pair.access_expires_at_ms(),
        access_expired: expiry::is_expired(pair.access(), now_ms),
    }
}

/// The cached profile. `None` inside `Ok` means logged in but not yet
/// identified.
pub fn whoami(session: &Session) -> anyhow::Result<Option<UserProfile>> {
    if !session.is_logged_in() {
        anyhow::bail!("not logged in");
    }
    Ok(session.current_user())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
