// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tally_session::config::SessionConfig;

use crate::command::Command;

/// Command-line client for a token-authenticated API.
#[derive(Debug, Parser)]
#[command(name = "tally", version, about)]
pub struct Config {
    #[command(flatten)]
    pub session: SessionConfig,

    /// Log format (text or json).
    #[arg(long, env = "TALLY_LOG_FORMAT", default_value = "text", global = true)]
    pub log_format: String,

    /// Log level filter.
    #[arg(long, env = "TALLY_LOG_LEVEL", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self.log_format.as_str() {
            "text" | "json" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        if self.session.request_timeout_ms == 0 {
            anyhow::bail!("--request-timeout-ms must be positive");
        }
        let url = &self.session.api_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("--api-url must be an http(s) URL: {url}");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
