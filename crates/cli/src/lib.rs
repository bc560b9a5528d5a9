// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod command;
pub mod config;

use tally_session::Session;

use crate::command::{get, login, status, Command};
use crate::config::Config;

/// Initialize the tracing subscriber. Logs go to stderr so stdout stays
/// machine-readable.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init(),
    };
    drop(result);
}

/// Run one subcommand and return what it prints on stdout.
pub async fn run(config: Config) -> anyhow::Result<String> {
    let session = Session::open(&config.session)?;
    execute(&session, config.command).await
}

pub async fn execute(session: &Session, command: Command) -> anyhow::Result<String> {
    match command {
        Command::Login(args) => Ok(login::run(session, args).await?.to_string()),
        Command::Logout => {
            session.logout();
            Ok(serde_json::json!({ "logged_in": false }).to_string())
        }
        Command::Whoami => Ok(serde_json::to_string(&status::whoami(session)?)?),
        Command::Status => Ok(serde_json::to_string(&status::status(session))?),
        Command::Get(args) => get::run(session, &args).await,
    }
}
