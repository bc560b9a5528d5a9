// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side session token lifecycle.
//!
//! Holds the current credential pair, decides when the access token is
//! stale, runs at most one renewal at a time for every caller that needs
//! it, and replays a business request once when the server rejects its
//! credential.

pub mod api;
pub mod config;
pub mod credential;
pub mod error;
pub mod events;
pub mod expiry;
pub mod gate;
pub mod identity;
pub mod refresh;
pub mod session;
pub mod storage;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use credential::CredentialPair;
pub use error::{ErrorKind, GateError, IdentityError, LoginError, RenewalError, StorageError};
pub use events::SessionEvent;
pub use identity::UserProfile;
pub use session::{LoginOutcome, Session, SessionBuilder};
