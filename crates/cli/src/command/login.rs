// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `tally login`: exchange username/password for a credential pair.

use tally_session::{LoginOutcome, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

/// CLI arguments for `tally login`.
#[derive(Debug, clap::Args)]
pub struct LoginArgs {
    /// Account username.
    pub username: String,

    /// Account password. Read from the first line of stdin when absent.
    #[arg(long, env = "TALLY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Log in and describe the result as a JSON document.
pub async fn run(session: &Session, args: LoginArgs) -> anyhow::Result<serde_json::Value> {
    let password = match args.password {
        Some(password) => password,
        None => read_password().await?,
    };

    let outcome = session.login(&args.username, &password).await?;
    Ok(match outcome {
        LoginOutcome::Identified(profile) => {
            serde_json::json!({ "logged_in": true, "user": profile })
        }
        LoginOutcome::Unidentified(e) => {
            warn!(err = %e, "logged in, but the profile could not be fetched");
            serde_json::json!({ "logged_in": true, "user": null })
        }
    })
}

async fn read_password() -> anyhow::Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let password = line.trim_end_matches(['\r', '\n']).to_owned();
    if password.is_empty() {
        anyhow::bail!("no password given (use --password, TALLY_PASSWORD or stdin)");
    }
    Ok(password)
}
