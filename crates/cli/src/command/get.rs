// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tally get`: one authenticated GET through the request gate.

use anyhow::Context;
use tally_session::Session;
use tracing::{info, warn};

/// CLI arguments for `tally get`.
#[derive(Debug, clap::Args)]
pub struct GetArgs {
    /// Path relative to the API base URL (or an absolute URL).
    pub path: String,
}

/// Send the request and return the response body.
///
/// A denied renewal ends the session: the store is cleared before the
/// error is returned.
pub async fn run(session: &Session, args: &GetArgs) -> anyhow::Result<String> {
    let resp = match session.gate().get(&args.path).await {
        Ok(resp) => resp,
        Err(e) if e.requires_logout() => {
            warn!(kind = %e.kind(), "renewal denied, logging out");
            session.logout();
            return Err(anyhow::Error::new(e).context("session expired; logged out"));
        }
        Err(e) => {
            let kind = e.kind();
            return Err(anyhow::Error::new(e).context(format!("GET {} failed ({kind})", args.path)));
        }
    };

    let status = resp.status();
    let body = resp.text().await.context("reading response body")?;
    info!(path = %args.path, status = status.as_u16(), "request complete");
    if !status.is_success() {
        anyhow::bail!("GET {} returned {status}: {body}", args.path);
    }
    Ok(body)
}

#[cfg(test)]
#[path = "get_tests.rs"]
mod tests;
