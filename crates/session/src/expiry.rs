// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access token expiry checks.
//!
//! Access tokens are compact JWS strings (`header.payload.signature`) whose
//! payload carries an `exp` claim in Unix seconds. Nothing here verifies the
//! signature or performs I/O; the server stays the authority on validity and
//! says so with a 401, which the request gate handles separately.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;

/// base64url that accepts payloads with or without trailing `=`.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Result of inspecting an access token against a clock reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh { expires_at_ms: u64 },
    Expired { expired_at_ms: u64 },
    /// The token could not be decoded. Callers treat this as expired.
    Malformed,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh { .. })
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<serde_json::Number>,
}

/// Decode the `exp` claim of `access` and convert it to epoch millis.
///
/// Returns `None` for anything that is not a three-segment token with a
/// base64url JSON payload carrying a finite numeric `exp`.
pub fn expires_at_ms(access: &str) -> Option<u64> {
    let mut segments = access.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };
    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.exp?.as_f64()?;
    if !exp.is_finite() {
        return None;
    }
    // Negative claims saturate to 0, i.e. long expired.
    Some((exp * 1000.0) as u64)
}

/// Classify `access` at `now_ms`, treating it as expired `leeway_ms` early.
pub fn check_with_leeway(access: &str, now_ms: u64, leeway_ms: u64) -> Freshness {
    match expires_at_ms(access) {
        None => Freshness::Malformed,
        Some(exp_ms) if exp_ms < now_ms.saturating_add(leeway_ms) => {
            Freshness::Expired { expired_at_ms: exp_ms }
        }
        Some(exp_ms) => Freshness::Fresh { expires_at_ms: exp_ms },
    }
}

pub fn check(access: &str, now_ms: u64) -> Freshness {
    check_with_leeway(access, now_ms, 0)
}

/// `exp * 1000 < now`. Undecodable tokens count as expired.
pub fn is_expired(access: &str, now_ms: u64) -> bool {
    !check(access, now_ms).is_fresh()
}

pub fn is_expired_with_leeway(access: &str, now_ms: u64, leeway_ms: u64) -> bool {
    !check_with_leeway(access, now_ms, leeway_ms).is_fresh()
}

/// Source of "now" in epoch millis.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms: AtomicU64::new(now_ms) }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance_secs(&self, secs: u64) {
        self.now_ms.fetch_add(secs * 1000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "expiry_tests.rs"]
mod tests;
